use std::collections::BTreeMap;

use actix_web::{get, web, HttpResponse};
use chrono::Local;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::configuration::Settings;
use crate::domain::business::BusinessRecord;
use crate::domain::extraction::{Strategy, TraceEntry};
use crate::domain::industry::industry_config;
use crate::domain::scoring::{score, ScoreResult};
use crate::error::DiagnoseError;
use crate::services::{run_diagnosis, Droid};

#[derive(Deserialize)]
pub struct DiagnoseQuery {
    pub url: String,
    pub industry: Option<String>,
}

#[derive(Serialize)]
pub struct DiagnoseResponse {
    pub success: bool,
    pub request_id: String,
    pub record: Option<BusinessRecord>,
    pub scores: Option<ScoreResult>,
    pub provenance: BTreeMap<String, Strategy>,
    pub trace: Vec<TraceEntry>,
    pub error: Option<String>,
}

/// Free tier: resolve → extract → score. Site-structure drift never turns
/// into a 500; whatever was extractable comes back scored, with the trace
/// explaining every gap.
#[get("")]
pub async fn diagnose(
    droid: web::Data<Droid>,
    settings: web::Data<Settings>,
    query: web::Query<DiagnoseQuery>,
) -> HttpResponse {
    let request_id = Uuid::new_v4().to_string();
    let industry = query.industry.as_deref().unwrap_or("salon");
    let today = Local::now().date_naive();

    log::info!("[{}] Diagnosing {} as {}", request_id, query.url, industry);

    match run_diagnosis(&droid, &settings.scrape, &query.url, today).await {
        Ok(outcome) => {
            let scores = score(&outcome.record, industry_config(industry));
            HttpResponse::Ok().json(DiagnoseResponse {
                success: true,
                request_id,
                record: Some(outcome.record),
                scores: Some(scores),
                provenance: outcome.provenance,
                trace: outcome.trace.entries,
                error: None,
            })
        }
        Err(e) => {
            log::error!("[{}] Diagnosis failed: {:?}", request_id, e);
            let mut status = match &e {
                DiagnoseError::InvalidIdentifier { .. } => HttpResponse::BadRequest(),
                _ => HttpResponse::BadGateway(),
            };
            status.json(DiagnoseResponse {
                success: false,
                request_id,
                record: None,
                scores: None,
                provenance: BTreeMap::new(),
                trace: vec![],
                error: Some(e.user_message()),
            })
        }
    }
}
