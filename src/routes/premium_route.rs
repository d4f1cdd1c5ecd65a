use std::collections::BTreeMap;

use actix_web::{get, web, HttpResponse};
use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::configuration::Settings;
use crate::domain::business::{BusinessRecord, CompetitorRecord};
use crate::domain::extraction::{Strategy, TraceEntry};
use crate::domain::industry::{industry_config, IndustryConfig};
use crate::domain::scoring::{score, ScoreResult};
use crate::error::DiagnoseError;
use crate::services::content_loop::{improve, ImprovedContent, DEFAULT_MAX_ATTEMPTS};
use crate::services::{competitor, run_diagnosis, Droid, OpenaiClient};

const DEFAULT_TARGET_SCORE: u32 = 85;

#[derive(Deserialize)]
pub struct PremiumQuery {
    pub url: String,
    pub industry: Option<String>,
    pub target_score: Option<u32>,
    /// Optional explicit competitor search phrase; derived from the
    /// record's locality and industry when omitted.
    pub phrase: Option<String>,
}

#[derive(Serialize)]
pub struct PremiumResponse {
    pub success: bool,
    pub request_id: String,
    pub record: Option<BusinessRecord>,
    pub scores: Option<ScoreResult>,
    pub competitors: Vec<CompetitorRecord>,
    pub improved: Option<ImprovedContent>,
    pub provenance: BTreeMap<String, Strategy>,
    pub trace: Vec<TraceEntry>,
    pub error: Option<String>,
}

/// "지역 + 업종" is how customers actually search; fall back to the
/// industry word alone when the address gave us nothing.
fn derive_search_phrase(record: &BusinessRecord, cfg: &IndustryConfig) -> String {
    let industry_word = cfg
        .stop_words
        .first()
        .or_else(|| cfg.industry_words.first())
        .cloned()
        .unwrap_or_default();
    let locality = record
        .address
        .split_whitespace()
        .nth(1)
        .or_else(|| record.address.split_whitespace().next())
        .unwrap_or_default();
    format!("{} {}", locality, industry_word).trim().to_string()
}

/// Paid tier: the free pipeline plus competitor discovery and the
/// guaranteed-quality content loop.
#[get("/premium")]
pub async fn premium_diagnose(
    droid: web::Data<Droid>,
    settings: web::Data<Settings>,
    openai_client: web::Data<OpenaiClient>,
    query: web::Query<PremiumQuery>,
) -> HttpResponse {
    let request_id = Uuid::new_v4().to_string();
    let industry = query.industry.as_deref().unwrap_or("salon");
    let cfg = industry_config(industry);
    let target = query.target_score.unwrap_or(DEFAULT_TARGET_SCORE);
    let today = Local::now().date_naive();

    log::info!(
        "[{}] Premium diagnosis for {} as {} (target {})",
        request_id,
        query.url,
        industry,
        target
    );

    let outcome = match run_diagnosis(&droid, &settings.scrape, &query.url, today).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("[{}] Premium diagnosis failed: {:?}", request_id, e);
            let mut status = match &e {
                DiagnoseError::InvalidIdentifier { .. } => HttpResponse::BadRequest(),
                _ => HttpResponse::BadGateway(),
            };
            return status.json(PremiumResponse {
                success: false,
                request_id,
                record: None,
                scores: None,
                competitors: vec![],
                improved: None,
                provenance: BTreeMap::new(),
                trace: vec![],
                error: Some(e.user_message()),
            });
        }
    };

    let scores = score(&outcome.record, cfg);

    let phrase = query
        .phrase
        .clone()
        .unwrap_or_else(|| derive_search_phrase(&outcome.record, cfg));
    let discovery = competitor::discover(&settings.scrape, &phrase, &outcome.record.place_id).await;

    let improved = improve(
        openai_client.get_ref(),
        &outcome.record,
        &scores,
        &discovery.competitors,
        cfg,
        target,
        DEFAULT_MAX_ATTEMPTS,
    )
    .await;

    let mut trace = outcome.trace;
    trace.extend(discovery.trace);

    HttpResponse::Ok().json(PremiumResponse {
        success: true,
        request_id,
        record: Some(outcome.record),
        scores: Some(scores),
        competitors: discovery.competitors,
        improved: Some(improved),
        provenance: outcome.provenance,
        trace: trace.entries,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_derives_from_district_and_industry() {
        let mut record = BusinessRecord::new("1");
        record.address = "서울 강남구 강남대로 123".to_string();
        let cfg = industry_config("salon");
        assert_eq!(derive_search_phrase(&record, cfg), "강남구 미용실");
    }

    #[test]
    fn phrase_survives_empty_address() {
        let record = BusinessRecord::new("1");
        let cfg = industry_config("cafe");
        assert_eq!(derive_search_phrase(&record, cfg), "카페");
    }
}
