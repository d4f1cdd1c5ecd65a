use regex::Regex;
use thirtyfour::error::WebDriverResult;
use thirtyfour::{By, WebDriver};

use crate::domain::extraction::{DiagnosisTrace, ExtractionResult, Strategy};
use crate::services::page_source::find_numbers_by_key;

/// Values at or above this are parse noise (timestamps, ids), never a
/// real review or photo count.
pub const COUNT_SANITY_CEILING: u64 = 5_000_000;

pub const REVIEW_COUNT_KEYS: &[&str] = &[
    "visitorReviewsTotal",
    "visitorReviewCount",
    "reviewCount",
    "totalReviews",
];

pub const PHOTO_COUNT_KEYS: &[&str] = &["imageCount", "photoCount", "totalPhotos"];

const REVIEW_TEXT_PATTERNS: &[&str] = &[r"방문자\s*리뷰\s*([\d,]+)", r"리뷰\s*([\d,]+)"];
const PHOTO_TEXT_PATTERNS: &[&str] = &[r"사진\s*([\d,]+)", r"이미지\s*([\d,]+)"];

/// Empirically tuned guard against the photo count picking up an adjacent
/// tab-index number. These are heuristics calibrated against the live
/// site, not derived rules; keep them adjustable.
#[derive(Debug, Clone, Copy)]
pub struct PhotoGuard {
    pub discard_min: u32,
    pub discard_max: u32,
    pub tab_collision_value: u32,
    pub tab_collision_review_floor: u32,
}

impl Default for PhotoGuard {
    fn default() -> Self {
        PhotoGuard {
            discard_min: 1,
            discard_max: 4,
            tab_collision_value: 5,
            tab_collision_review_floor: 200,
        }
    }
}

/// Max-of-candidates: a missed key under-counts far more often than a
/// single match is wildly wrong.
fn max_candidate(candidates: impl IntoIterator<Item = u64>) -> Option<u32> {
    candidates
        .into_iter()
        .filter(|&v| v < COUNT_SANITY_CEILING)
        .max()
        .map(|v| v as u32)
}

fn collect_candidates(keys: &[&str], patterns: &[&str], sources: &[&str]) -> Vec<u64> {
    let mut candidates: Vec<u64> = vec![];
    for source in sources {
        for key in keys {
            candidates.extend(find_numbers_by_key(source, key));
        }
        for pattern in patterns {
            let re = Regex::new(pattern).expect("count pattern must compile");
            for cap in re.captures_iter(source) {
                if let Ok(v) = cap[1].replace(',', "").parse::<u64>() {
                    candidates.push(v);
                }
            }
        }
    }
    candidates
}

pub fn resolve_review_count(sources: &[&str]) -> Option<u32> {
    max_candidate(collect_candidates(
        REVIEW_COUNT_KEYS,
        REVIEW_TEXT_PATTERNS,
        sources,
    ))
}

/// Applies the anti-false-positive rules on top of max-of-candidates.
pub fn apply_photo_guard(candidate: u32, review_count: u32, guard: &PhotoGuard) -> u32 {
    if candidate >= guard.discard_min && candidate <= guard.discard_max {
        return 0;
    }
    if candidate == guard.tab_collision_value && review_count >= guard.tab_collision_review_floor {
        return 0;
    }
    candidate
}

pub fn resolve_photo_count(sources: &[&str], review_count: u32, guard: &PhotoGuard) -> u32 {
    let candidate = max_candidate(collect_candidates(
        PHOTO_COUNT_KEYS,
        PHOTO_TEXT_PATTERNS,
        sources,
    ))
    .unwrap_or(0);
    apply_photo_guard(candidate, review_count, guard)
}

/// Review and photo counts from structured keys plus rendered text, taking
/// the body text from the live handle as an extra source.
pub async fn extract_counts(
    driver: &WebDriver,
    content_source: &str,
    outer_source: &str,
    guard: &PhotoGuard,
    trace: &mut DiagnosisTrace,
) -> WebDriverResult<(ExtractionResult<u32>, ExtractionResult<u32>)> {
    let body_text = match driver.find(By::Tag("body")).await {
        Ok(body) => body.text().await.unwrap_or_default(),
        Err(_) => String::new(),
    };
    let sources: [&str; 3] = [content_source, outer_source, &body_text];

    let reviews = match resolve_review_count(&sources) {
        Some(count) => {
            trace.note("review_count", format!("max candidate {}", count));
            ExtractionResult::found(count, Strategy::StructuredContent)
        }
        None => {
            trace.note("review_count", "no numeric candidates");
            ExtractionResult::absent()
        }
    };

    let review_count = reviews.value.unwrap_or(0);
    let photos = {
        let resolved = resolve_photo_count(&sources, review_count, guard);
        trace.note("photo_count", format!("resolved {}", resolved));
        ExtractionResult::found(resolved, Strategy::StructuredContent)
    };

    Ok((reviews, photos))
}
