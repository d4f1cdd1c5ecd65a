use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use crate::domain::business::{BusinessRecord, CompetitorRecord};
use crate::domain::industry::IndustryConfig;
use crate::domain::scoring::{score, ScoreResult};
use crate::services::openai_client::DraftGenerator;
use crate::services::page_source::extract_first_json_object;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DESC_CLAMP_CHARS: usize = 1200;
const DIR_CLAMP_CHARS: usize = 800;
/// Similarity at or above this folds two keywords into one: the pair is
/// almost certainly two spellings of the same service term.
const NEAR_DUPLICATE_SIMILARITY: f64 = 0.92;

/// One generated improvement package: the scored fields plus auxiliary
/// guidance assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub description: String,
    pub directions: String,
    pub keywords: Vec<String>,
    pub review_request_script: String,
    pub reply_templates: Vec<String>,
    pub photo_checklist: Vec<String>,
    pub keyword_insight: String,
    pub price_guidance: String,
}

/// What the generator is asked to return; every field optional so a
/// partially valid reply still contributes.
#[derive(Debug, Deserialize)]
struct RawDraft {
    description: Option<String>,
    directions: Option<String>,
    keywords: Option<Vec<String>>,
    review_request_script: Option<String>,
    reply_templates: Option<Vec<String>>,
    photo_checklist: Option<Vec<String>>,
    keyword_insight: Option<String>,
    price_guidance: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImprovedContent {
    pub draft: Draft,
    pub simulated: ScoreResult,
    pub attempts: u32,
    pub target_met: bool,
}

/// Constraints handed to the generator, derived from the industry config
/// and the record's own name and address.
#[derive(Debug, Clone)]
pub struct DraftConstraints {
    pub desc_min_len: usize,
    pub desc_good_len: usize,
    pub dir_good_len: usize,
    pub keyword_count: usize,
    pub required_vocabulary: Vec<String>,
    pub locality_hints: Vec<String>,
}

impl DraftConstraints {
    pub fn from_config(cfg: &IndustryConfig, record: &BusinessRecord) -> Self {
        let mut required: Vec<String> = cfg.industry_words.iter().take(4).cloned().collect();
        required.extend(cfg.wayfinding_words.iter().take(3).cloned());

        let mut hints: Vec<String> = vec![];
        for source in [&record.address, &record.name] {
            for tok in source.split_whitespace() {
                if tok.chars().count() >= 2 && !hints.contains(&tok.to_string()) {
                    hints.push(tok.to_string());
                }
            }
        }

        DraftConstraints {
            desc_min_len: cfg.desc_min_len,
            desc_good_len: cfg.desc_good_len,
            dir_good_len: cfg.dir_good_len,
            keyword_count: cfg.keyword_target,
            required_vocabulary: required,
            locality_hints: hints,
        }
    }
}

/// Generate→simulate→retry until a draft clears `target` or the attempt
/// budget runs out. Always returns a draft; the best one seen so far when
/// nothing clears the bar.
pub async fn improve<G: DraftGenerator>(
    generator: &G,
    record: &BusinessRecord,
    current: &ScoreResult,
    competitors: &[CompetitorRecord],
    cfg: &IndustryConfig,
    target: u32,
    max_attempts: u32,
) -> ImprovedContent {
    let constraints = DraftConstraints::from_config(cfg, record);
    let max_attempts = max_attempts.max(1);

    let mut best: Option<(Draft, ScoreResult)> = None;
    let mut feedback: Vec<String> = vec![];

    for attempt in 1..=max_attempts {
        let prompt = build_prompt(&constraints, record, current, competitors, &feedback);

        let draft = match generator.generate(&prompt).await {
            Ok(reply) => parse_reply(&reply, &constraints, cfg),
            Err(e) => {
                log::error!("Generator call failed on attempt {}: {:?}", attempt, e);
                fallback_draft(&constraints, cfg)
            }
        };
        let draft = post_process(draft, &constraints);

        let simulated = simulate(record, &draft, cfg);
        log::info!(
            "Attempt {}: simulated total {} (target {})",
            attempt,
            simulated.total,
            target
        );

        if simulated.total >= target {
            return ImprovedContent {
                draft,
                simulated,
                attempts: attempt,
                target_met: true,
            };
        }

        feedback = shortfalls(&simulated, &draft, &constraints, target);

        let is_best = best
            .as_ref()
            .map(|(_, s)| simulated.total > s.total)
            .unwrap_or(true);
        if is_best {
            best = Some((draft, simulated));
        }
    }

    let (draft, simulated) = best.expect("at least one attempt always runs");
    ImprovedContent {
        draft,
        simulated,
        attempts: max_attempts,
        target_met: false,
    }
}

/// The simulation is the whole point: a draft is judged by the same
/// deterministic scorer the free tier uses, never by the generator's
/// confidence.
pub fn simulate(record: &BusinessRecord, draft: &Draft, cfg: &IndustryConfig) -> ScoreResult {
    let mut candidate = record.clone();
    candidate.description = draft.description.clone();
    candidate.directions = draft.directions.clone();
    candidate.keywords = draft.keywords.clone();
    score(&candidate, cfg)
}

fn build_prompt(
    constraints: &DraftConstraints,
    record: &BusinessRecord,
    current: &ScoreResult,
    competitors: &[CompetitorRecord],
    feedback: &[String],
) -> String {
    let competitor_keywords: Vec<String> = competitors
        .iter()
        .flat_map(|c| c.keywords.iter().cloned())
        .unique()
        .take(15)
        .collect();

    let mut prompt = format!(
        "당신은 플레이스 마케팅 컨설턴트입니다. 아래 업체의 소개글/오시는길/대표키워드를 개선해주세요.\n\
         업체명: {}\n주소: {}\n현재 총점: {}\n\
         제약: 소개글 {}~{}자, 오시는길 약 {}자, 키워드 정확히 {}개.\n\
         반드시 포함할 어휘: {}\n지역 힌트: {}\n경쟁업체 키워드: {}\n",
        record.name,
        record.address,
        current.total,
        constraints.desc_min_len,
        constraints.desc_good_len,
        constraints.dir_good_len,
        constraints.keyword_count,
        constraints.required_vocabulary.join(", "),
        constraints.locality_hints.join(", "),
        competitor_keywords.join(", "),
    );

    if !feedback.is_empty() {
        prompt.push_str("직전 시도에서 부족했던 점:\n");
        for item in feedback {
            prompt.push_str(&format!("- {}\n", item));
        }
    }

    prompt.push_str(
        "JSON 객체 하나로만 답하세요. 필드: description, directions, keywords(배열), \
         review_request_script, reply_templates(배열), photo_checklist(배열), \
         keyword_insight, price_guidance",
    );
    prompt
}

/// Tolerates prose around the JSON and partially filled objects. A reply
/// with no usable JSON at all falls back to the templated safe draft.
fn parse_reply(reply: &str, constraints: &DraftConstraints, cfg: &IndustryConfig) -> Draft {
    let Some(json) = extract_first_json_object(reply) else {
        log::error!("Generator reply contained no JSON object");
        return fallback_draft(constraints, cfg);
    };
    let raw: RawDraft = match serde_json::from_str(json) {
        Ok(raw) => raw,
        Err(e) => {
            log::error!("Generator JSON did not deserialize: {:?}", e);
            return fallback_draft(constraints, cfg);
        }
    };
    let fallback = fallback_draft(constraints, cfg);
    Draft {
        description: raw.description.unwrap_or(fallback.description),
        directions: raw.directions.unwrap_or(fallback.directions),
        keywords: raw.keywords.unwrap_or(fallback.keywords),
        review_request_script: raw
            .review_request_script
            .unwrap_or(fallback.review_request_script),
        reply_templates: raw.reply_templates.unwrap_or(fallback.reply_templates),
        photo_checklist: raw.photo_checklist.unwrap_or(fallback.photo_checklist),
        keyword_insight: raw.keyword_insight.unwrap_or(fallback.keyword_insight),
        price_guidance: raw.price_guidance.unwrap_or(fallback.price_guidance),
    }
}

/// Minimal safe draft seeded from the industry vocabulary and locality
/// hints. Used whenever the generator output is unusable.
fn fallback_draft(constraints: &DraftConstraints, cfg: &IndustryConfig) -> Draft {
    let locality = constraints
        .locality_hints
        .first()
        .cloned()
        .unwrap_or_default();
    let keywords: Vec<String> = cfg
        .industry_words
        .iter()
        .take(constraints.keyword_count)
        .map(|w| {
            if locality.is_empty() {
                w.clone()
            } else {
                format!("{}{}", locality, w)
            }
        })
        .collect();

    Draft {
        description: format!(
            "{} 인근의 {} 전문 업체입니다. 예약 및 상담 문의를 환영합니다.",
            locality,
            cfg.industry_words.first().cloned().unwrap_or_default()
        ),
        directions: format!("{} 인근, 자세한 위치는 전화 문의 바랍니다.", locality),
        keywords,
        review_request_script: "방문이 만족스러우셨다면 리뷰 한 줄 부탁드립니다!".to_string(),
        reply_templates: vec![
            "소중한 리뷰 감사합니다. 다음 방문도 기대해주세요!".to_string(),
            "불편을 드려 죄송합니다. 말씀주신 부분은 바로 개선하겠습니다.".to_string(),
        ],
        photo_checklist: vec![
            "매장 외관 (간판이 보이게)".to_string(),
            "내부 전경".to_string(),
            "대표 시술/메뉴 결과물".to_string(),
        ],
        keyword_insight: "경쟁업체 키워드 데이터를 수집하지 못했습니다.".to_string(),
        price_guidance: "가격표를 숫자로 명시하면 문의 전환율이 올라갑니다.".to_string(),
    }
}

fn cap_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Clamp over-length text and force the keyword list to exactly the
/// required count: fold near-duplicates first, then pad with derivatives
/// of what is already there.
fn post_process(mut draft: Draft, constraints: &DraftConstraints) -> Draft {
    draft.description = cap_chars(&draft.description, DESC_CLAMP_CHARS);
    draft.directions = cap_chars(&draft.directions, DIR_CLAMP_CHARS);
    draft.keywords = normalize_keywords(draft.keywords, constraints);
    draft
}

pub fn fold_near_duplicates(keywords: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = vec![];
    for kw in keywords {
        let kw = kw.trim().to_string();
        if kw.is_empty() {
            continue;
        }
        let duplicate = out.iter().any(|existing| {
            jaro_winkler(
                &existing.to_lowercase().replace(' ', ""),
                &kw.to_lowercase().replace(' ', ""),
            ) >= NEAR_DUPLICATE_SIMILARITY
        });
        if !duplicate {
            out.push(kw);
        }
    }
    out
}

fn normalize_keywords(raw: Vec<String>, constraints: &DraftConstraints) -> Vec<String> {
    let mut keywords = fold_near_duplicates(raw);
    keywords.truncate(constraints.keyword_count);

    // Pad with derivatives of existing keywords, then locality hints.
    let suffixes = ["추천", "잘하는곳", "예약"];
    let mut pool: Vec<String> = vec![];
    for suffix in suffixes {
        for base in &keywords {
            pool.push(format!("{}{}", base, suffix));
        }
    }
    pool.extend(constraints.locality_hints.iter().cloned());

    let mut pool = pool.into_iter();
    let mut counter = 1;
    while keywords.len() < constraints.keyword_count {
        let candidate = pool.next().unwrap_or_else(|| {
            let numbered = format!("키워드{}", counter);
            counter += 1;
            numbered
        });
        if !keywords.contains(&candidate) {
            keywords.push(candidate);
        }
    }
    keywords
}

/// Which constraints the draft missed, fed back into the next prompt.
fn shortfalls(
    simulated: &ScoreResult,
    draft: &Draft,
    constraints: &DraftConstraints,
    target: u32,
) -> Vec<String> {
    let mut items = vec![];

    let desc_len = draft.description.chars().count();
    if desc_len < constraints.desc_good_len {
        items.push(format!(
            "소개글이 {}자입니다. {}자 이상으로 늘려주세요",
            desc_len, constraints.desc_good_len
        ));
    }
    if draft.keywords.len() != constraints.keyword_count {
        items.push(format!(
            "키워드가 {}개입니다. 정확히 {}개가 필요합니다",
            draft.keywords.len(),
            constraints.keyword_count
        ));
    }
    let text = format!("{} {}", draft.description, draft.directions);
    let missing: Vec<&String> = constraints
        .required_vocabulary
        .iter()
        .filter(|w| !text.contains(w.as_str()))
        .collect();
    if !missing.is_empty() {
        items.push(format!(
            "다음 어휘가 빠져 있습니다: {}",
            missing
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    // The two weakest generated-content categories, to focus the retry.
    let mut weak: Vec<(&str, u32)> = ["description", "directions", "keywords"]
        .iter()
        .filter_map(|name| simulated.category(name).map(|c| (*name, c.score)))
        .collect();
    weak.sort_by_key(|(_, s)| *s);
    for (name, score) in weak.into_iter().take(2) {
        if score < target {
            items.push(format!("{} 점수가 {}점으로 약합니다", name, score));
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::domain::industry::industry_config;

    struct ScriptedGenerator {
        calls: AtomicU32,
        replies: Vec<String>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<String>) -> Self {
            ScriptedGenerator {
                calls: AtomicU32::new(0),
                replies,
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DraftGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            Ok(self
                .replies
                .get(n.min(self.replies.len().saturating_sub(1)))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn base_record() -> BusinessRecord {
        let mut record = BusinessRecord::new("31130096");
        record.name = "살롱드마레".to_string();
        record.address = "서울 강남구 강남대로 123".to_string();
        record.review_count = 150;
        record.recent_review_count = Some(50);
        record.photo_count = 60;
        record.menu_count = Some(12);
        record
    }

    fn weak_reply() -> String {
        r#"{"description":"짧은 글","directions":"근처","keywords":["네일"]}"#.to_string()
    }

    fn strong_reply() -> String {
        let line = "강남역 3번 출구에서 도보 2분 거리의 네일 전문샵입니다. \
                    젤네일 아트와 속눈썹 연장, 왁싱 시술을 전문으로 하는 강남네일 맛집입니다.";
        let description = format!("{}\n{}\n{}\n{}", line, line, line, line);
        let directions = "강남역 3번 출구에서 도보 2분, 골목 안 2층 건물입니다. \
                          건물 뒤 주차 가능, 버스 정류장 바로 앞입니다.";
        serde_json::json!({
            "description": description,
            "directions": directions,
            "keywords": ["강남네일", "젤네일", "속눈썹연장", "왁싱추천", "네일추천"],
            "review_request_script": "리뷰 부탁드려요",
            "reply_templates": ["감사합니다"],
            "photo_checklist": ["외관"],
            "keyword_insight": "경쟁사 대비 젤네일 강조",
            "price_guidance": "명시 가격 권장"
        })
        .to_string()
    }

    #[tokio::test]
    async fn stops_at_max_attempts_and_returns_best_draft() {
        let generator = ScriptedGenerator::new(vec![weak_reply()]);
        let record = base_record();
        let cfg = industry_config("salon");
        let current = score(&record, cfg);

        let result = improve(&generator, &record, &current, &[], cfg, 100, 3).await;

        assert_eq!(generator.call_count(), 3, "never a 4th generation call");
        assert_eq!(result.attempts, 3);
        assert!(!result.target_met);
        // A draft always comes back, keywords forced to exactly five.
        assert_eq!(result.draft.keywords.len(), 5);
    }

    #[tokio::test]
    async fn returns_early_when_target_is_met() {
        let generator = ScriptedGenerator::new(vec![strong_reply()]);
        let record = base_record();
        let cfg = industry_config("salon");
        let current = score(&record, cfg);

        let result = improve(&generator, &record, &current, &[], cfg, 60, 3).await;

        assert!(result.target_met);
        assert_eq!(result.attempts, 1);
        assert_eq!(generator.call_count(), 1);
        assert!(result.simulated.total >= 60);
    }

    #[tokio::test]
    async fn unparseable_reply_falls_back_to_safe_draft() {
        let generator =
            ScriptedGenerator::new(vec!["죄송합니다, JSON을 만들 수 없었어요.".to_string()]);
        let record = base_record();
        let cfg = industry_config("salon");
        let current = score(&record, cfg);

        let result = improve(&generator, &record, &current, &[], cfg, 100, 2).await;

        assert_eq!(result.attempts, 2);
        assert!(!result.draft.description.is_empty());
        assert_eq!(result.draft.keywords.len(), 5);
    }

    #[tokio::test]
    async fn later_better_draft_replaces_best_so_far() {
        let generator = ScriptedGenerator::new(vec![weak_reply(), strong_reply()]);
        let record = base_record();
        let cfg = industry_config("salon");
        let current = score(&record, cfg);

        // Target unreachable, so both attempts run and best-so-far wins.
        let result = improve(&generator, &record, &current, &[], cfg, 100, 2).await;

        assert!(!result.target_met);
        assert!(result.draft.description.contains("강남역"));
    }

    #[test]
    fn near_duplicate_keywords_fold_into_one() {
        let raw = vec![
            "젤네일아트".to_string(),
            "젤 네일아트".to_string(),
            "속눈썹".to_string(),
        ];
        let folded = fold_near_duplicates(raw);
        assert_eq!(folded, vec!["젤네일아트", "속눈썹"]);
    }

    #[test]
    fn keyword_padding_reaches_exact_count() {
        let cfg = industry_config("salon");
        let record = base_record();
        let constraints = DraftConstraints::from_config(cfg, &record);

        let padded = normalize_keywords(vec!["젤네일".to_string()], &constraints);
        assert_eq!(padded.len(), 5);
        assert_eq!(padded[0], "젤네일");
        assert!(padded[1].starts_with("젤네일"));

        let from_nothing = normalize_keywords(vec![], &constraints);
        assert_eq!(from_nothing.len(), 5);
    }

    #[test]
    fn simulation_uses_the_same_scorer() {
        let record = base_record();
        let cfg = industry_config("salon");
        let draft = parse_reply(
            &strong_reply(),
            &DraftConstraints::from_config(cfg, &record),
            cfg,
        );

        let simulated = simulate(&record, &draft, cfg);

        let mut overlaid = record.clone();
        overlaid.description = draft.description.clone();
        overlaid.directions = draft.directions.clone();
        overlaid.keywords = draft.keywords.clone();
        assert_eq!(simulated.total, score(&overlaid, cfg).total);
    }
}
