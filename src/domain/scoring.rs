use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::business::BusinessRecord;
use super::industry::IndustryConfig;

/// Neutral score used when a data point was never measured. Deliberately
/// different from 0, which means "confirmed empty".
pub const NEUTRAL_SCORE: f64 = 60.0;
pub const RECENCY_NEUTRAL: f64 = 60.0;

const REVIEW_VOLUME_WEIGHT: f64 = 0.7;
const REVIEW_RECENCY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: u32) -> Self {
        match score {
            95.. => Grade::S,
            85..=94 => Grade::A,
            70..=84 => Grade::B,
            55..=69 => Grade::C,
            40..=54 => Grade::D,
            _ => Grade::F,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    pub score: u32,
    pub grade: Grade,
    pub issues: Vec<String>,
    pub breakdown: BTreeMap<String, f64>,
}

impl CategoryScore {
    fn build(raw: f64, issues: Vec<String>, breakdown: BTreeMap<String, f64>) -> Self {
        let score = raw.clamp(0.0, 100.0).round() as u32;
        CategoryScore {
            score,
            grade: Grade::from_score(score),
            issues,
            breakdown,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub description: CategoryScore,
    pub directions: CategoryScore,
    pub keywords: CategoryScore,
    pub reviews: CategoryScore,
    pub photos: CategoryScore,
    pub price: CategoryScore,
    pub total: u32,
    pub grade: Grade,
}

impl ScoreResult {
    pub fn category(&self, name: &str) -> Option<&CategoryScore> {
        match name {
            "description" => Some(&self.description),
            "directions" => Some(&self.directions),
            "keywords" => Some(&self.keywords),
            "reviews" => Some(&self.reviews),
            "photos" => Some(&self.photos),
            "price" => Some(&self.price),
            _ => None,
        }
    }
}

/// Deterministic scoring of one listing against an industry profile.
/// Pure: same record + config always yields the same result.
pub fn score(record: &BusinessRecord, cfg: &IndustryConfig) -> ScoreResult {
    let description = score_description(record, cfg);
    let directions = score_directions(record, cfg);
    let keywords = score_keywords(record, cfg);
    let reviews = score_reviews(record, cfg);
    let photos = score_photos(record, cfg);
    let price = score_price(record, cfg);

    let w = &cfg.weights;
    let total = (description.score as f64 * w.description as f64
        + directions.score as f64 * w.directions as f64
        + keywords.score as f64 * w.keywords as f64
        + reviews.score as f64 * w.reviews as f64
        + photos.score as f64 * w.photos as f64
        + price.score as f64 * w.price as f64)
        / 100.0;
    let total = total.clamp(0.0, 100.0).round() as u32;

    ScoreResult {
        description,
        directions,
        keywords,
        reviews,
        photos,
        price,
        total,
        grade: Grade::from_score(total),
    }
}

/// Piecewise length curve: 0 when empty, 0.7·(len/min) below the minimum,
/// linear 0.7→1.0 between min and good, flat 1.0 past good.
fn length_ratio(len: usize, min_len: usize, good_len: usize) -> f64 {
    if len == 0 {
        return 0.0;
    }
    let len = len as f64;
    let min_len = min_len as f64;
    let good_len = (good_len as f64).max(min_len + 1.0);
    if len < min_len {
        0.7 * (len / min_len)
    } else if len >= good_len {
        1.0
    } else {
        0.7 + 0.3 * (len - min_len) / (good_len - min_len)
    }
}

/// Rewards paragraph breaks and penalizes fragment spam (very short lines).
fn structure_ratio(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let breaks = text.matches('\n').count();
    let break_component = 0.6 * (breaks.min(3) as f64 / 3.0);

    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let avg_len = if lines.is_empty() {
        text.chars().count() as f64
    } else {
        lines.iter().map(|l| l.chars().count()).sum::<usize>() as f64 / lines.len() as f64
    };
    let line_component = if avg_len >= 25.0 {
        0.4
    } else {
        0.4 * (avg_len / 25.0)
    };

    (break_component + line_component).clamp(0.0, 1.0)
}

/// Up to `max` bonus points for the share of declared keywords that
/// literally appear in the text body.
fn keyword_boost(text: &str, keywords: &[String], max: f64) -> f64 {
    if keywords.is_empty() || text.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let hits = keywords
        .iter()
        .filter(|kw| lowered.contains(&kw.to_lowercase()))
        .count();
    max * hits as f64 / keywords.len() as f64
}

fn score_description(record: &BusinessRecord, cfg: &IndustryConfig) -> CategoryScore {
    let text = record.description.trim();
    let len = text.chars().count();

    let length = length_ratio(len, cfg.desc_min_len, cfg.desc_good_len);
    let structure = structure_ratio(text);
    let boost = keyword_boost(text, &record.keywords, cfg.desc_keyword_boost_max);

    let raw = (0.6 * length + 0.25 * structure) * 100.0 + boost;

    let mut issues = vec![];
    if len == 0 {
        issues.push("소개글이 비어 있습니다".to_string());
    } else if len < cfg.desc_min_len {
        issues.push(format!(
            "소개글이 너무 짧습니다 ({}자, 최소 {}자 권장)",
            len, cfg.desc_min_len
        ));
    }
    if len > 0 && structure < 0.5 {
        issues.push("문단 구분이 부족합니다".to_string());
    }
    if !record.keywords.is_empty() && boost < cfg.desc_keyword_boost_max * 0.5 {
        issues.push("대표키워드가 소개글에 충분히 녹아있지 않습니다".to_string());
    }

    let mut breakdown = BTreeMap::new();
    breakdown.insert("length_ratio".to_string(), length);
    breakdown.insert("structure_ratio".to_string(), structure);
    breakdown.insert("keyword_boost".to_string(), boost);

    CategoryScore::build(raw, issues, breakdown)
}

/// Share of wayfinding vocabulary present, capped so an exhaustive word
/// list cannot saturate the ratio on its own.
fn signal_ratio(text: &str, vocab: &[String]) -> (f64, usize) {
    if text.is_empty() || vocab.is_empty() {
        return (0.0, 0);
    }
    let hits = vocab.iter().filter(|w| text.contains(w.as_str())).count();
    let denom = 8.min(vocab.len());
    (hits.min(8) as f64 / denom as f64, hits)
}

fn score_directions(record: &BusinessRecord, cfg: &IndustryConfig) -> CategoryScore {
    let text = record.directions.trim();
    let len = text.chars().count();

    let length = length_ratio(len, cfg.dir_min_len, cfg.dir_good_len);
    let (signal, hits) = signal_ratio(text, &cfg.wayfinding_words);
    let boost = keyword_boost(text, &record.keywords, cfg.dir_keyword_boost_max);

    let raw = (0.55 * length + 0.45 * signal) * 100.0 + boost;

    let mut issues = vec![];
    if len == 0 {
        issues.push("찾아오시는길 안내가 비어 있습니다".to_string());
    } else {
        if len < cfg.dir_min_len {
            issues.push("오시는길 설명이 너무 짧습니다".to_string());
        }
        if hits < 3 {
            issues.push("역/출구/주차 등 길안내 표현이 부족합니다".to_string());
        }
    }

    let mut breakdown = BTreeMap::new();
    breakdown.insert("length_ratio".to_string(), length);
    breakdown.insert("signal_ratio".to_string(), signal);
    breakdown.insert("signal_hits".to_string(), hits as f64);
    breakdown.insert("keyword_boost".to_string(), boost);

    CategoryScore::build(raw, issues, breakdown)
}

/// Tokens from the listing's own name and address that keywords can reuse
/// for locality credit. Short tokens are noise and dropped.
fn locality_tokens(record: &BusinessRecord) -> Vec<String> {
    let mut tokens: Vec<String> = vec![];
    for source in [&record.address, &record.name] {
        for tok in source.split_whitespace() {
            let tok = tok
                .trim_end_matches(['구', '동', '로', '길', '역'])
                .to_string();
            if tok.chars().count() >= 2 && !tokens.contains(&tok) {
                tokens.push(tok);
            }
        }
    }
    tokens
}

fn duplicate_count(keywords: &[String]) -> usize {
    let mut seen: Vec<String> = vec![];
    let mut dups = 0;
    for kw in keywords {
        let lowered = kw.trim().to_lowercase();
        if seen.contains(&lowered) {
            dups += 1;
        } else {
            seen.push(lowered);
        }
    }
    dups
}

fn score_keywords(record: &BusinessRecord, cfg: &IndustryConfig) -> CategoryScore {
    if record.keywords.is_empty() {
        let mut breakdown = BTreeMap::new();
        breakdown.insert("coverage".to_string(), 0.0);
        return CategoryScore::build(
            0.0,
            vec!["대표키워드가 등록되어 있지 않습니다".to_string()],
            breakdown,
        );
    }

    let target = cfg.keyword_target.max(1);
    let coverage = 50.0 * (record.keywords.len().min(target) as f64 / target as f64);

    let dups = duplicate_count(&record.keywords);
    let dedupe_bonus = (10.0 - 4.0 * dups as f64).max(0.0);

    let locality = locality_tokens(record);
    let locality_hits = record
        .keywords
        .iter()
        .filter(|kw| locality.iter().any(|t| kw.contains(t.as_str())))
        .count();
    let locality_bonus = (5.0 * locality_hits as f64).min(15.0);

    let intent_hits = record
        .keywords
        .iter()
        .filter(|kw| cfg.intent_words.iter().any(|w| kw.contains(w.as_str())))
        .count();
    let intent_bonus = (5.0 * intent_hits as f64).min(15.0);

    let industry_hits = record
        .keywords
        .iter()
        .filter(|kw| cfg.industry_words.iter().any(|w| kw.contains(w.as_str())))
        .count();
    let industry_bonus = (10.0 * industry_hits as f64).min(20.0);

    let stop_hits = record
        .keywords
        .iter()
        .filter(|kw| {
            cfg.stop_words
                .iter()
                .any(|w| kw.trim().eq_ignore_ascii_case(w))
        })
        .count();
    let stop_penalty = (5.0 * stop_hits as f64).min(10.0);

    let raw = coverage + dedupe_bonus + locality_bonus + intent_bonus + industry_bonus
        - stop_penalty;

    let mut issues = vec![];
    if record.keywords.len() < target {
        issues.push(format!(
            "대표키워드가 {}개뿐입니다 ({}개 권장)",
            record.keywords.len(),
            target
        ));
    }
    if dups > 0 {
        issues.push("중복된 키워드가 있습니다".to_string());
    }
    if locality_hits == 0 {
        issues.push("지역명이 들어간 키워드가 없습니다".to_string());
    }
    if industry_hits == 0 {
        issues.push("업종 특화 키워드가 없습니다".to_string());
    }
    if stop_hits > 0 {
        issues.push("검색 변별력이 없는 일반 키워드가 있습니다".to_string());
    }

    let mut breakdown = BTreeMap::new();
    breakdown.insert("coverage".to_string(), coverage);
    breakdown.insert("dedupe_bonus".to_string(), dedupe_bonus);
    breakdown.insert("locality_bonus".to_string(), locality_bonus);
    breakdown.insert("intent_bonus".to_string(), intent_bonus);
    breakdown.insert("industry_bonus".to_string(), industry_bonus);
    breakdown.insert("stop_penalty".to_string(), stop_penalty);

    CategoryScore::build(raw, issues, breakdown)
}

/// log10 saturation: hits 100 at the target count and gives diminishing
/// returns past it instead of a hard cliff.
fn log_saturation(count: u32, target: u32) -> f64 {
    let target = target.max(1);
    let ratio = ((count as f64 + 1.0).log10() / (target as f64 + 1.0).log10()).clamp(0.0, 1.0);
    ratio * 100.0
}

fn recency_score(recent: u32, total: u32) -> f64 {
    if total == 0 {
        return 30.0;
    }
    let ratio = recent as f64 / total as f64;
    if ratio >= 0.5 {
        95.0
    } else if ratio >= 0.3 {
        80.0
    } else if ratio >= 0.1 {
        50.0
    } else {
        30.0
    }
}

fn score_reviews(record: &BusinessRecord, cfg: &IndustryConfig) -> CategoryScore {
    let mut breakdown = BTreeMap::new();

    if record.review_count == 0 {
        breakdown.insert("volume".to_string(), 0.0);
        return CategoryScore::build(
            0.0,
            vec!["방문자 리뷰가 없습니다".to_string()],
            breakdown,
        );
    }

    let volume = log_saturation(record.review_count, cfg.review_target);
    let (recency, recency_measured) = match record.recent_review_count {
        Some(recent) => (recency_score(recent, record.review_count), true),
        None => (RECENCY_NEUTRAL, false),
    };

    let raw = REVIEW_VOLUME_WEIGHT * volume + REVIEW_RECENCY_WEIGHT * recency;

    let mut issues = vec![];
    if record.review_count < cfg.review_target {
        issues.push(format!(
            "리뷰 수가 목표({})에 못 미칩니다",
            cfg.review_target
        ));
    }
    if recency_measured && recency <= 50.0 {
        issues.push("최근 30일 리뷰 비중이 낮습니다".to_string());
    }
    if !recency_measured {
        issues.push("최근 리뷰 데이터를 확인하지 못해 중립 처리했습니다".to_string());
    }

    breakdown.insert("volume".to_string(), volume);
    breakdown.insert("recency".to_string(), recency);

    CategoryScore::build(raw, issues, breakdown)
}

fn score_photos(record: &BusinessRecord, cfg: &IndustryConfig) -> CategoryScore {
    let raw = log_saturation(record.photo_count, cfg.photo_target);

    let mut issues = vec![];
    if record.photo_count == 0 {
        issues.push("등록된 사진이 없습니다".to_string());
    } else if record.photo_count < cfg.photo_target {
        issues.push(format!(
            "사진 수가 목표({})에 못 미칩니다",
            cfg.photo_target
        ));
    }

    let mut breakdown = BTreeMap::new();
    breakdown.insert("volume".to_string(), raw);

    CategoryScore::build(raw, issues, breakdown)
}

fn price_tier(count: u32) -> f64 {
    match count {
        30.. => 100.0,
        20..=29 => 85.0,
        10..=19 => 70.0,
        5..=9 => 55.0,
        _ => 40.0,
    }
}

fn score_price(record: &BusinessRecord, cfg: &IndustryConfig) -> CategoryScore {
    let mut breakdown = BTreeMap::new();

    let count = match record.menu_count {
        None => {
            // Never measured — neutral, not punitive.
            breakdown.insert("neutral".to_string(), NEUTRAL_SCORE);
            return CategoryScore::build(
                NEUTRAL_SCORE,
                vec!["가격 정보를 수집하지 못해 중립 처리했습니다".to_string()],
                breakdown,
            );
        }
        Some(0) => {
            breakdown.insert("tier".to_string(), 0.0);
            return CategoryScore::build(
                0.0,
                vec!["등록된 가격/메뉴 정보가 없습니다".to_string()],
                breakdown,
            );
        }
        Some(n) => n,
    };

    let mut raw = price_tier(count);
    let mut issues = vec![];
    if count < 10 {
        issues.push(format!("가격 항목이 {}개로 적습니다", count));
    }

    if !record.menu_items.is_empty() {
        let numeric = record
            .menu_items
            .iter()
            .filter(|m| m.has_numeric_price())
            .count() as f64;
        let total = record.menu_items.len() as f64;
        let numeric_ratio = numeric / total;
        let inquiry_ratio = 1.0 - numeric_ratio;

        if numeric_ratio < cfg.numeric_price_threshold {
            raw -= if cfg.strict_pricing { 30.0 } else { 20.0 };
            issues.push("숫자로 명시된 가격 비중이 낮습니다".to_string());
        }
        if inquiry_ratio > cfg.inquiry_tolerance {
            raw -= 15.0;
            issues.push("'문의' 가격 항목이 너무 많습니다".to_string());
        }

        breakdown.insert("numeric_ratio".to_string(), numeric_ratio);
        breakdown.insert("inquiry_ratio".to_string(), inquiry_ratio);
    }

    breakdown.insert("tier".to_string(), price_tier(count));

    CategoryScore::build(raw, issues, breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::business::MenuItem;
    use crate::domain::industry::industry_config;

    fn empty_record() -> BusinessRecord {
        BusinessRecord::new("1234567")
    }

    fn priced_item(name: &str, price: &str) -> MenuItem {
        MenuItem {
            name: name.to_string(),
            price_text: price.to_string(),
            description: None,
        }
    }

    #[test]
    fn scoring_is_idempotent() {
        let cfg = industry_config("salon");
        let mut record = empty_record();
        record.description = "강남역 3번 출구 앞 네일샵입니다.\n젤네일 전문.\n예약 환영.".to_string();
        record.keywords = vec!["강남네일".to_string(), "젤네일".to_string()];
        record.review_count = 120;
        record.recent_review_count = Some(40);

        let first = score(&record, cfg);
        let second = score(&record, cfg);
        assert_eq!(first.total, second.total);
        assert_eq!(first.description.score, second.description.score);
        assert_eq!(first.reviews.breakdown, second.reviews.breakdown);
    }

    #[test]
    fn review_score_is_monotone_in_count() {
        let cfg = industry_config("cafe");
        let mut prev = 0;
        for count in [1u32, 10, 50, 200, 500, 2000, 10_000] {
            let mut record = empty_record();
            record.review_count = count;
            record.recent_review_count = Some(0);
            let result = score(&record, cfg);
            assert!(
                result.reviews.score >= prev,
                "count {} scored {} below previous {}",
                count,
                result.reviews.score,
                prev
            );
            prev = result.reviews.score;
        }
    }

    #[test]
    fn length_ratio_is_monotone_toward_good_len() {
        let mut prev = 0.0;
        for len in (0..=500).step_by(20) {
            let ratio = length_ratio(len, 120, 400);
            assert!(ratio >= prev, "len {} ratio {} < {}", len, ratio, prev);
            prev = ratio;
        }
        assert_eq!(length_ratio(400, 120, 400), 1.0);
        assert_eq!(length_ratio(900, 120, 400), 1.0);
    }

    #[test]
    fn absent_recency_is_neutral_not_zero() {
        let cfg = industry_config("salon");

        let mut unmeasured = empty_record();
        unmeasured.review_count = 500;
        unmeasured.recent_review_count = None;

        let mut confirmed_stale = empty_record();
        confirmed_stale.review_count = 500;
        confirmed_stale.recent_review_count = Some(0);

        let a = score(&unmeasured, cfg);
        let b = score(&confirmed_stale, cfg);

        assert_eq!(a.reviews.breakdown["recency"], RECENCY_NEUTRAL);
        assert_eq!(b.reviews.breakdown["recency"], 30.0);
        assert!(a.reviews.score > b.reviews.score);
    }

    #[test]
    fn absent_menu_is_neutral_while_zero_menu_scores_zero() {
        let cfg = industry_config("restaurant");

        let unmeasured = empty_record();
        assert_eq!(unmeasured.menu_count, None);
        let a = score(&unmeasured, cfg);
        assert_eq!(a.price.score, NEUTRAL_SCORE as u32);

        let mut confirmed_empty = empty_record();
        confirmed_empty.menu_count = Some(0);
        let b = score(&confirmed_empty, cfg);
        assert_eq!(b.price.score, 0);
    }

    #[test]
    fn zero_keywords_short_circuits_to_zero() {
        let cfg = industry_config("cafe");
        let record = empty_record();
        let result = score(&record, cfg);
        assert_eq!(result.keywords.score, 0);
    }

    #[test]
    fn duplicate_keywords_trigger_dedupe_penalty() {
        let cfg = industry_config("salon");

        let mut clean = empty_record();
        clean.keywords = vec!["젤네일".to_string(), "속눈썹".to_string()];

        let mut duped = empty_record();
        duped.keywords = vec!["젤네일".to_string(), "젤네일".to_string()];

        let a = score(&clean, cfg);
        let b = score(&duped, cfg);

        assert_eq!(a.keywords.breakdown["dedupe_bonus"], 10.0);
        assert_eq!(b.keywords.breakdown["dedupe_bonus"], 6.0);
    }

    #[test]
    fn strict_pricing_penalizes_missing_numeric_prices_harder() {
        let restaurant = industry_config("restaurant");
        let salon = industry_config("salon");

        let mut record = empty_record();
        record.menu_count = Some(12);
        record.menu_items = vec![
            priced_item("코스A", "가격문의"),
            priced_item("코스B", "가격문의"),
            priced_item("점심특선", "12,000원"),
        ];

        let strict = score(&record, restaurant);
        let lenient = score(&record, salon);
        assert!(strict.price.score < lenient.price.score);
    }

    #[test]
    fn fully_empty_record_gets_grade_f_with_neutral_price() {
        let cfg = industry_config("salon");
        let record = empty_record();
        let result = score(&record, cfg);

        assert_eq!(result.description.score, 0);
        assert_eq!(result.directions.score, 0);
        assert_eq!(result.keywords.score, 0);
        assert_eq!(result.reviews.score, 0);
        assert_eq!(result.photos.score, 0);
        assert_eq!(result.price.score, NEUTRAL_SCORE as u32);

        // Only the neutral price category contributes: 60 * 10% = 6.
        assert_eq!(result.total, 6);
        assert_eq!(result.grade, Grade::F);
    }

    #[test]
    fn well_maintained_listing_lands_in_a_or_s_band() {
        let cfg = industry_config("salon");
        let mut record = empty_record();
        record.name = "살롱드마레 강남점".to_string();
        record.address = "서울 강남구 강남대로 123".to_string();

        // Four lines of ~100 chars each: at good length with clear structure.
        let line = "강남역 3번 출구에서 도보 2분 거리의 네일 전문샵입니다. \
                    젤네일 아트와 속눈썹 연장 시술을 전문으로 하며 일대일 맞춤 케어를 제공합니다."
            .to_string();
        record.description = format!(
            "{}\n강남네일 젤네일 속눈썹연장 왁싱 전문.\n{}\n{}",
            line, line, line
        );
        record.directions = "강남역 3번 출구에서 도보 2분, 첫번째 골목 안 2층입니다. \
                             건물 뒤편에 주차 가능하며 버스 정류장도 가깝습니다. \
                             찾기 어려우시면 전화 주세요. 간판이 크게 보입니다."
            .to_string();
        record.keywords = vec![
            "강남네일".to_string(),
            "젤네일".to_string(),
            "속눈썹연장".to_string(),
            "왁싱".to_string(),
            "네일추천".to_string(),
        ];
        record.review_count = cfg.review_target;
        record.recent_review_count = Some(cfg.review_target / 2);
        record.photo_count = cfg.photo_target;
        record.menu_count = Some(25);
        record.menu_items = (0..25)
            .map(|i| priced_item(&format!("시술 {}", i), "45,000원"))
            .collect();

        let result = score(&record, cfg);
        assert!(
            result.total >= 85,
            "expected A/S band, got {} ({:?})",
            result.total,
            result.grade
        );
        assert!(matches!(result.grade, Grade::S | Grade::A));
    }

    #[test]
    fn grade_thresholds() {
        assert_eq!(Grade::from_score(100), Grade::S);
        assert_eq!(Grade::from_score(95), Grade::S);
        assert_eq!(Grade::from_score(94), Grade::A);
        assert_eq!(Grade::from_score(85), Grade::A);
        assert_eq!(Grade::from_score(70), Grade::B);
        assert_eq!(Grade::from_score(55), Grade::C);
        assert_eq!(Grade::from_score(40), Grade::D);
        assert_eq!(Grade::from_score(39), Grade::F);
    }

    #[test]
    fn recency_steps() {
        assert_eq!(recency_score(50, 100), 95.0);
        assert_eq!(recency_score(30, 100), 80.0);
        assert_eq!(recency_score(10, 100), 50.0);
        assert_eq!(recency_score(5, 100), 30.0);
    }
}
