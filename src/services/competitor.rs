use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fake_user_agent::get_rua;
use rand::Rng;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

use crate::configuration::ScrapeSettings;
use crate::domain::business::{dedupe_keywords, CompetitorRecord, DiscoverySource};
use crate::domain::extraction::DiagnosisTrace;
use crate::services::navigator::canonical_mobile_url;
use crate::services::page_source::{find_numbers_by_key, find_string_array_by_key, find_string_values_by_key};

const RANK_ENDPOINT: &str = "https://map.naver.com/p/api/search/allSearch";
const RANK_REFERER: &str = "https://map.naver.com/";
const MOBILE_SEARCH_URL: &str = "https://m.place.naver.com/place/list?query=";

/// Extra candidates fetched beyond the limit so enrichment failures do not
/// leave the list short.
const ENRICH_MARGIN: usize = 2;
/// Bounded buffer of sniffed ids; anything past this is beyond any rank
/// the caller cares about.
const SNIFF_BUFFER_CAP: usize = 40;

const MIN_ID_DIGITS: usize = 5;
const MAX_ID_DIGITS: usize = 15;

pub const NO_REPRESENTATIVE_KEYWORD: &str = "대표키워드없음";

/// UI artifacts that leak into scraped name slots.
const NAME_DENYLIST: &[&str] = &["저장", "길찾기", "공유", "예약", "전화", "리뷰"];

/// Generic promotional tokens that tell a searcher nothing about the
/// business itself.
const KEYWORD_NOISE: &[&str] = &[
    "저장", "길찾기", "공유", "할인", "이벤트", "최고", "discount", "event", "best",
];

#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub place_id: String,
    pub name: Option<String>,
    pub source: DiscoverySource,
}

#[derive(Debug)]
pub struct DiscoveryOutcome {
    pub competitors: Vec<CompetitorRecord>,
    pub trace: DiagnosisTrace,
}

/// Discovers competing listings for a search phrase, in search-rank order,
/// under one shared deadline. Zero candidates is a valid outcome, not an
/// error.
pub async fn discover(
    scrape: &ScrapeSettings,
    phrase: &str,
    exclude_id: &str,
) -> DiscoveryOutcome {
    let mut trace = DiagnosisTrace::new();
    let deadline = Instant::now() + Duration::from_secs(scrape.discovery_deadline_secs);
    let limit = scrape.competitor_limit;

    // Rank acquisition: direct JSON endpoint first, page sniff fallback.
    let started = std::time::Instant::now();
    let mut ranked = match timeout_at(deadline, fetch_rank_api(phrase)).await {
        Ok(candidates) if !candidates.is_empty() => {
            trace.push("rank_api", format!("{} candidates", candidates.len()), started);
            candidates
        }
        Ok(_) => {
            trace.push("rank_api", "empty result", started);
            vec![]
        }
        Err(_) => {
            trace.push("rank_api", "deadline hit", started);
            vec![]
        }
    };

    if ranked.is_empty() && Instant::now() < deadline {
        let started = std::time::Instant::now();
        ranked = match timeout_at(deadline, sniff_rank_from_page(phrase)).await {
            Ok(candidates) => {
                trace.push("rank_sniff", format!("{} candidates", candidates.len()), started);
                candidates
            }
            Err(_) => {
                trace.push("rank_sniff", "deadline hit", started);
                vec![]
            }
        };
    }

    let candidates = filter_candidates(ranked, exclude_id, limit + ENRICH_MARGIN);
    if candidates.is_empty() {
        trace.note("discovery", "no candidates survived filtering");
        return DiscoveryOutcome {
            competitors: vec![],
            trace,
        };
    }

    let enriched = enrich_all(
        candidates.clone(),
        scrape.enrich_concurrency.max(1),
        deadline,
        enrich_candidate,
    )
    .await;

    // Reassemble in original rank order; enrichment completion order is
    // irrelevant by contract.
    let mut competitors: Vec<CompetitorRecord> = vec![];
    for (slot, candidate) in enriched.into_iter().zip(candidates.iter()) {
        match slot {
            Some(record) => competitors.push(record),
            None => {
                trace.note("enrich", format!("candidate {} dropped (timeout)", candidate.place_id));
            }
        }
        if competitors.len() == limit {
            break;
        }
    }
    for (i, record) in competitors.iter_mut().enumerate() {
        record.rank = (i + 1) as u32;
    }

    trace.note(
        "discovery",
        format!("{} competitors enriched for '{}'", competitors.len(), phrase),
    );
    DiscoveryOutcome { competitors, trace }
}

fn plausible_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(get_rua())
        .read_timeout(Duration::from_secs(15))
        .build()
        .unwrap_or_default()
}

async fn fetch_rank_api(phrase: &str) -> Vec<RankedCandidate> {
    let client = plausible_client();
    let response = client
        .get(RANK_ENDPOINT)
        .header("Referer", RANK_REFERER)
        .query(&[("query", phrase), ("type", "all"), ("page", "1")])
        .send()
        .await;

    let value: Value = match response {
        Ok(res) => match res.json().await {
            Ok(v) => v,
            Err(e) => {
                log::error!("Rank endpoint returned non-JSON: {:?}", e);
                return vec![];
            }
        },
        Err(e) => {
            log::error!("Rank endpoint request failed: {:?}", e);
            return vec![];
        }
    };

    parse_rank_response(&value)
}

/// The endpoint schema is reverse-engineered; pull out only what we need
/// and ignore everything else.
fn parse_rank_response(value: &Value) -> Vec<RankedCandidate> {
    let list = value
        .pointer("/result/place/list")
        .and_then(Value::as_array);
    let Some(list) = list else { return vec![] };

    list.iter()
        .filter_map(|item| {
            let id = item
                .get("id")
                .and_then(|v| v.as_str().map(str::to_string).or_else(|| v.as_u64().map(|n| n.to_string())))?;
            let name = item.get("name").and_then(Value::as_str).map(str::to_string);
            Some(RankedCandidate {
                place_id: id,
                name,
                source: DiscoverySource::ApiRank,
            })
        })
        .collect()
}

/// Fallback: render the mobile search page and scan its source for place
/// id patterns in appearance order. Appearance order is the rank.
async fn sniff_rank_from_page(phrase: &str) -> Vec<RankedCandidate> {
    let client = plausible_client();
    let url = format!("{}{}", MOBILE_SEARCH_URL, phrase);
    let body = match client.get(&url).header("Referer", RANK_REFERER).send().await {
        Ok(res) => res.text().await.unwrap_or_default(),
        Err(e) => {
            log::error!("Mobile search page fetch failed: {:?}", e);
            return vec![];
        }
    };
    sniff_ids_from_source(&body)
}

pub fn sniff_ids_from_source(source: &str) -> Vec<RankedCandidate> {
    let re = Regex::new(r"/(?:place|restaurant|hairshop|cafe|beauty)/(\d{5,15})")
        .expect("sniff pattern must compile");
    let mut out: Vec<RankedCandidate> = vec![];
    for cap in re.captures_iter(source) {
        let id = cap[1].to_string();
        if out.iter().any(|c| c.place_id == id) {
            continue;
        }
        out.push(RankedCandidate {
            place_id: id,
            name: None,
            source: DiscoverySource::PageSniff,
        });
        if out.len() == SNIFF_BUFFER_CAP {
            break;
        }
    }
    out
}

/// Drop the caller's own listing, dedupe, validate the id shape, cap.
/// Order in = order out.
pub fn filter_candidates(
    ranked: Vec<RankedCandidate>,
    exclude_id: &str,
    cap: usize,
) -> Vec<RankedCandidate> {
    let mut seen: Vec<String> = vec![];
    let mut out: Vec<RankedCandidate> = vec![];
    for candidate in ranked {
        let id = &candidate.place_id;
        if id == exclude_id || seen.contains(id) {
            continue;
        }
        if id.len() < MIN_ID_DIGITS
            || id.len() > MAX_ID_DIGITS
            || !id.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        seen.push(id.clone());
        out.push(candidate);
        if out.len() == cap {
            break;
        }
    }
    out
}

/// Bounded worker pool over the candidates. Each result lands back in its
/// original slot, so rank order survives out-of-order completion. A task
/// that misses the deadline leaves `None` in its slot.
async fn enrich_all<F, Fut>(
    candidates: Vec<RankedCandidate>,
    concurrency: usize,
    deadline: Instant,
    enrich: F,
) -> Vec<Option<CompetitorRecord>>
where
    F: Fn(RankedCandidate) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Option<CompetitorRecord>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut join_set: JoinSet<(usize, Option<CompetitorRecord>)> = JoinSet::new();

    for (index, candidate) in candidates.iter().cloned().enumerate() {
        let semaphore = semaphore.clone();
        let enrich = enrich.clone();
        join_set.spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return (index, None);
            };
            // Past the deadline no new work starts.
            if Instant::now() >= deadline {
                return (index, None);
            }
            match timeout_at(deadline, enrich(candidate)).await {
                Ok(result) => (index, result),
                Err(_) => (index, None),
            }
        });
    }

    let mut slots: Vec<Option<CompetitorRecord>> = (0..candidates.len()).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, result)) => slots[index] = result,
            Err(e) => log::error!("Enrichment task panicked: {:?}", e),
        }
    }
    slots
}

/// Visit the candidate's profile page and pull name + keywords with the
/// same structured-key / chip-scan cascade the primary extractor uses.
async fn enrich_candidate(candidate: RankedCandidate) -> Option<CompetitorRecord> {
    // Jittered start so the pool's requests don't land in lockstep.
    let jitter = rand::thread_rng().gen_range(100..400);
    tokio::time::sleep(Duration::from_millis(jitter)).await;

    let client = plausible_client();
    let url = canonical_mobile_url(&candidate.place_id);
    let body = match client.get(&url).header("Referer", RANK_REFERER).send().await {
        Ok(res) => res.text().await.unwrap_or_default(),
        Err(e) => {
            log::error!("Enrichment fetch failed for {}: {:?}", candidate.place_id, e);
            String::new()
        }
    };

    let name_from_page = find_string_values_by_key(&body, "name").into_iter().next();
    let raw_name = name_from_page.or(candidate.name.clone()).unwrap_or_default();
    let name = sanitize_name(&raw_name, &candidate.place_id);

    let mut raw_keywords: Vec<String> = vec![];
    for key in crate::services::extractors::keyword::KEYWORD_KEYS {
        raw_keywords = find_string_array_by_key(&body, key);
        if !raw_keywords.is_empty() {
            break;
        }
    }
    if raw_keywords.is_empty() {
        raw_keywords = chip_scan(&body);
    }
    let keywords = sanitize_keywords(raw_keywords);

    let address = find_string_values_by_key(&body, "roadAddress")
        .into_iter()
        .next()
        .unwrap_or_default();
    let review_count = find_numbers_by_key(&body, "visitorReviewsTotal")
        .into_iter()
        .max()
        .map(|v| v as u32);
    let photo_count = find_numbers_by_key(&body, "imageCount")
        .into_iter()
        .max()
        .map(|v| v as u32);

    Some(CompetitorRecord {
        place_id: candidate.place_id,
        name,
        address,
        keywords,
        review_count,
        photo_count,
        rank: 0, // assigned after rank-order reassembly
        source: candidate.source,
    })
}

/// Last-resort keyword source: hashtag chips rendered as plain anchors.
fn chip_scan(body: &str) -> Vec<String> {
    let document = Html::parse_document(body);
    let anchors = match Selector::parse("a") {
        Ok(sel) => sel,
        Err(_) => return vec![],
    };
    let mut chips = vec![];
    for anchor in document.select(&anchors) {
        let text = anchor.text().collect::<String>().trim().to_string();
        let href = anchor.value().attr("href").unwrap_or_default();
        let looks_like_chip = text.starts_with('#') || href.contains("/search");
        let label = text.trim_start_matches('#').to_string();
        if looks_like_chip && (2..=15).contains(&label.chars().count()) {
            chips.push(label);
        }
    }
    chips
}

/// Empty or UI-artifact names get a synthetic label so downstream display
/// never shows "저장" as a competitor.
pub fn sanitize_name(raw: &str, place_id: &str) -> String {
    let trimmed = raw.trim();
    let distance_artifact = Regex::new(r"^[\d.,]+\s*(?:km|m|분)$").unwrap();
    let banned = trimmed.is_empty()
        || NAME_DENYLIST.iter().any(|t| trimmed == *t)
        || trimmed.contains("리뷰")
        || distance_artifact.is_match(trimmed);
    if banned {
        format!("place_{}", place_id)
    } else {
        trimmed.to_string()
    }
}

/// Noise-only keyword sets degrade to a sentinel instead of an empty list,
/// so aggregation can tell "no data" from "confirmed zero".
pub fn sanitize_keywords(raw: Vec<String>) -> Vec<String> {
    let had_any = !raw.is_empty();
    let cleaned: Vec<String> = raw
        .into_iter()
        .filter(|kw| {
            let lowered = kw.to_lowercase();
            !KEYWORD_NOISE.iter().any(|noise| lowered.contains(noise))
        })
        .collect();
    let cleaned = dedupe_keywords(cleaned);
    if cleaned.is_empty() && had_any {
        vec![NO_REPRESENTATIVE_KEYWORD.to_string()]
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(ids: &[&str]) -> Vec<RankedCandidate> {
        ids.iter()
            .map(|id| RankedCandidate {
                place_id: id.to_string(),
                name: None,
                source: DiscoverySource::ApiRank,
            })
            .collect()
    }

    #[test]
    fn parses_rank_response_ids_and_names() {
        let value: Value = serde_json::from_str(
            r#"{"result":{"place":{"list":[
                {"id":"11111111","name":"모모네일","extra":true},
                {"id":22222222,"name":"살롱드힐"},
                {"name":"id 없는 항목"}
            ]}}}"#,
        )
        .unwrap();
        let candidates = parse_rank_response(&value);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].place_id, "11111111");
        assert_eq!(candidates[1].place_id, "22222222");
        assert_eq!(candidates[0].name.as_deref(), Some("모모네일"));
    }

    #[test]
    fn malformed_rank_response_yields_empty() {
        let value: Value = serde_json::from_str(r#"{"result":{}}"#).unwrap();
        assert!(parse_rank_response(&value).is_empty());
    }

    #[test]
    fn sniff_preserves_appearance_order_and_dedupes() {
        let source = r#"
            <a href="/hairshop/11111111/home">a</a>
            <a href="/place/22222222">b</a>
            <a href="/hairshop/11111111/review">a again</a>
            <a href="/cafe/33333333/menu">c</a>
        "#;
        let candidates = sniff_ids_from_source(source);
        let ids: Vec<&str> = candidates.iter().map(|c| c.place_id.as_str()).collect();
        assert_eq!(ids, vec!["11111111", "22222222", "33333333"]);
        assert_eq!(candidates[0].source, DiscoverySource::PageSniff);
    }

    #[test]
    fn filter_drops_own_id_dupes_and_bad_shapes() {
        let input = ranked(&[
            "11111111",
            "99999999", // caller's own listing
            "22222222",
            "22222222", // dupe
            "123",      // too short
            "11112222333344445",
            "33333333",
        ]);
        let out = filter_candidates(input, "99999999", 10);
        let ids: Vec<&str> = out.iter().map(|c| c.place_id.as_str()).collect();
        assert_eq!(ids, vec!["11111111", "22222222", "33333333"]);
    }

    #[test]
    fn filter_caps_candidate_count() {
        let input = ranked(&["11111111", "22222222", "33333333", "44444444"]);
        assert_eq!(filter_candidates(input, "0", 2).len(), 2);
    }

    #[test]
    fn sanitize_name_replaces_artifacts_with_synthetic_label() {
        assert_eq!(sanitize_name("저장", "123456"), "place_123456");
        assert_eq!(sanitize_name("", "123456"), "place_123456");
        assert_eq!(sanitize_name("리뷰 1,204", "123456"), "place_123456");
        assert_eq!(sanitize_name("1.2km", "123456"), "place_123456");
        assert_eq!(sanitize_name("살롱드마레", "123456"), "살롱드마레");
    }

    #[test]
    fn all_noise_keywords_degrade_to_sentinel() {
        let raw = vec!["할인".to_string(), "이벤트".to_string(), "best price".to_string()];
        assert_eq!(sanitize_keywords(raw), vec![NO_REPRESENTATIVE_KEYWORD]);
    }

    #[test]
    fn mixed_keywords_keep_only_signal() {
        let raw = vec!["젤네일".to_string(), "이벤트".to_string(), "속눈썹".to_string()];
        assert_eq!(sanitize_keywords(raw), vec!["젤네일", "속눈썹"]);

        // Nothing discovered at all stays empty: unmeasured, not noise.
        assert!(sanitize_keywords(vec![]).is_empty());
    }

    #[test]
    fn chip_scan_reads_hashtag_anchors_only() {
        let html = r##"<html><body>
            <a href="/place/123/search?query=젤네일">#젤네일</a>
            <a href="/hairshop/9/search">단골맛집</a>
            <a href="/place/123/review">리뷰 전체보기와 그 외 긴 안내 문구</a>
            <a href="/place/123/search">#a</a>
        </body></html>"##;
        let chips = chip_scan(html);
        assert_eq!(chips, vec!["젤네일", "단골맛집"]);
    }

    #[tokio::test(start_paused = true)]
    async fn enrichment_preserves_rank_order_despite_completion_order() {
        let candidates = ranked(&["11111111", "22222222", "33333333", "44444444", "55555555"]);
        let deadline = Instant::now() + Duration::from_secs(60);

        // Earlier ranks sleep longer, so completion order is reversed.
        let enrich = |candidate: RankedCandidate| async move {
            let delay = match candidate.place_id.as_str() {
                "11111111" => 50,
                "22222222" => 40,
                "33333333" => 30,
                "44444444" => 20,
                _ => 10,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Some(CompetitorRecord {
                place_id: candidate.place_id.clone(),
                name: format!("place_{}", candidate.place_id),
                address: String::new(),
                keywords: vec![],
                review_count: None,
                photo_count: None,
                rank: 0,
                source: candidate.source,
            })
        };

        let slots = enrich_all(candidates, 2, deadline, enrich).await;
        let ids: Vec<String> = slots
            .into_iter()
            .flatten()
            .map(|r| r.place_id)
            .collect();
        assert_eq!(
            ids,
            vec!["11111111", "22222222", "33333333", "44444444", "55555555"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_candidates_leave_empty_slots_without_failing_the_batch() {
        let candidates = ranked(&["11111111", "22222222", "33333333"]);
        let deadline = Instant::now() + Duration::from_millis(100);

        let enrich = |candidate: RankedCandidate| async move {
            let delay = if candidate.place_id == "22222222" { 500 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Some(CompetitorRecord {
                place_id: candidate.place_id.clone(),
                name: String::new(),
                address: String::new(),
                keywords: vec![],
                review_count: None,
                photo_count: None,
                rank: 0,
                source: candidate.source,
            })
        };

        let slots = enrich_all(candidates, 3, deadline, enrich).await;
        assert!(slots[0].is_some());
        assert!(slots[1].is_none());
        assert!(slots[2].is_some());
    }
}
