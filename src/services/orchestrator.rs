use std::collections::BTreeMap;
use std::time::Duration;

use chrono::NaiveDate;
use thirtyfour::WebDriver;

use crate::configuration::ScrapeSettings;
use crate::domain::business::BusinessRecord;
use crate::domain::extraction::{DiagnosisTrace, Strategy};
use crate::error::DiagnoseError;
use crate::services::droid::Droid;
use crate::services::extractors::counts::{extract_counts, PhotoGuard};
use crate::services::extractors::keyword::extract_keywords;
use crate::services::extractors::menu::extract_menu;
use crate::services::extractors::recency::extract_recency;
use crate::services::extractors::text_field::{
    extract_text_field, DESCRIPTION_SPEC, DIRECTIONS_SPEC,
};
use crate::services::navigator::{self, ContentHandle};
use crate::services::page_source::find_string_values_by_key;

const NAME_KEYS: &[&str] = &["name", "placeName"];
const ADDRESS_KEYS: &[&str] = &["roadAddress", "address", "fullAddress"];

/// Full result of one extraction run: the assembled record, per-field
/// provenance, and the complete trace log.
#[derive(Debug)]
pub struct DiagnosisOutcome {
    pub record: BusinessRecord,
    pub provenance: BTreeMap<String, Strategy>,
    pub trace: DiagnosisTrace,
}

/// Runs the whole extraction pipeline for one input. Owns the browser
/// session: whatever happens inside, the session is disposed before
/// returning.
pub async fn run_diagnosis(
    droid: &Droid,
    scrape: &ScrapeSettings,
    input: &str,
    today: NaiveDate,
) -> Result<DiagnosisOutcome, DiagnoseError> {
    let driver = droid
        .new_session()
        .await
        .map_err(|e| DiagnoseError::NavigationFailure {
            url: "webdriver".to_string(),
            reason: format!("session creation failed: {:?}", e),
        })?;

    let result = diagnose_with_session(&driver, scrape, input, today).await;
    Droid::dispose(driver).await;
    result
}

async fn diagnose_with_session(
    driver: &WebDriver,
    scrape: &ScrapeSettings,
    input: &str,
    today: NaiveDate,
) -> Result<DiagnosisOutcome, DiagnoseError> {
    if let Err(e) = driver
        .set_page_load_timeout(Duration::from_secs(scrape.navigation_timeout_secs))
        .await
    {
        log::error!("Failed to set page load timeout: {:?}", e);
    }

    let frame_wait = Duration::from_secs(scrape.frame_wait_secs);
    let resolved = match navigator::resolve(driver, input, frame_wait).await {
        Ok(resolved) => resolved,
        // Exhausted cascade downgrades to an empty record, not a failure:
        // the caller still gets the trace explaining what happened.
        Err(DiagnoseError::NoContentHandle { place_id, trace }) => {
            let mut record = BusinessRecord::new(place_id);
            record.recent_review_count = None;
            record.menu_count = None;
            return Ok(DiagnosisOutcome {
                record,
                provenance: BTreeMap::new(),
                trace,
            });
        }
        Err(e) => return Err(e),
    };

    let mut trace = DiagnosisTrace::new();
    trace.extend(resolved.trace.clone());

    // Inside a frame the driver source is the frame document; otherwise
    // the outer source is all we have.
    let content_source = match resolved.handle {
        ContentHandle::Frame => driver.source().await.unwrap_or_default(),
        ContentHandle::Outer | ContentHandle::EmbeddedBlob => resolved.outer_source.clone(),
    };
    let outer_source = resolved.outer_source.as_str();

    let mut record = BusinessRecord::new(resolved.place_id.clone());
    let mut provenance: BTreeMap<String, Strategy> = BTreeMap::new();

    record.name = first_value(&content_source, outer_source, NAME_KEYS).unwrap_or_default();
    record.address = first_value(&content_source, outer_source, ADDRESS_KEYS).unwrap_or_default();

    let hard_failure = |e| DiagnoseError::NavigationFailure {
        url: navigator::canonical_mobile_url(&resolved.place_id),
        reason: format!("content handle became unusable: {:?}", e),
    };

    let keywords = extract_keywords(driver, &content_source, outer_source, &mut trace)
        .await
        .map_err(|e| hard_failure(e))?;
    provenance.insert("keywords".to_string(), promote(keywords.strategy, resolved.handle));
    record.set_keywords(keywords.value.unwrap_or_default());

    let description = extract_text_field(
        driver,
        &DESCRIPTION_SPEC,
        &content_source,
        outer_source,
        &mut trace,
    )
    .await
    .map_err(|e| hard_failure(e))?;
    provenance.insert(
        "description".to_string(),
        promote(description.strategy, resolved.handle),
    );
    record.description = description.value.unwrap_or_default();

    let directions = extract_text_field(
        driver,
        &DIRECTIONS_SPEC,
        &content_source,
        outer_source,
        &mut trace,
    )
    .await
    .map_err(|e| hard_failure(e))?;
    provenance.insert(
        "directions".to_string(),
        promote(directions.strategy, resolved.handle),
    );
    record.directions = directions.value.unwrap_or_default();

    let guard = PhotoGuard::default();
    let (reviews, photos) = extract_counts(driver, &content_source, outer_source, &guard, &mut trace)
        .await
        .map_err(|e| hard_failure(e))?;
    provenance.insert("review_count".to_string(), promote(reviews.strategy, resolved.handle));
    provenance.insert("photo_count".to_string(), promote(photos.strategy, resolved.handle));
    record.review_count = reviews.value.unwrap_or(0);
    record.photo_count = photos.value.unwrap_or(0);

    // The remaining extractors navigate away from the content handle, so
    // they run last, against fresh views.
    let recency = extract_recency(driver, &resolved.place_id, today, &mut trace)
        .await
        .map_err(|e| hard_failure(e))?;
    provenance.insert("recent_review_count".to_string(), recency.strategy);
    record.recent_review_count = recency.value;

    let menu = extract_menu(driver, &resolved.place_id, &mut trace)
        .await
        .map_err(|e| hard_failure(e))?;
    provenance.insert("menu".to_string(), menu.strategy);
    match menu.value {
        Some(items) => {
            record.menu_count = Some(items.len() as u32);
            record.menu_items = items;
        }
        None => record.menu_count = None,
    }

    Ok(DiagnosisOutcome {
        record,
        provenance,
        trace,
    })
}

fn first_value(content_source: &str, outer_source: &str, keys: &[&str]) -> Option<String> {
    for source in [content_source, outer_source] {
        for key in keys {
            if let Some(value) = find_string_values_by_key(source, key).into_iter().next() {
                return Some(value);
            }
        }
    }
    None
}

/// A structured hit found while the handle was the embedded blob is blob
/// provenance, not generic structured-content provenance.
fn promote(strategy: Strategy, handle: ContentHandle) -> Strategy {
    match (strategy, handle) {
        (Strategy::StructuredContent, ContentHandle::EmbeddedBlob) => Strategy::EmbeddedBlob,
        (s, _) => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_prefers_content_source_and_key_order() {
        let content = r#"{"placeName":"모모네일","roadAddress":"서울 강남구 역삼로 12"}"#;
        let outer = r#"{"name":"다른이름"}"#;
        assert_eq!(
            first_value(content, outer, NAME_KEYS).as_deref(),
            Some("모모네일")
        );
        assert_eq!(
            first_value(content, outer, ADDRESS_KEYS).as_deref(),
            Some("서울 강남구 역삼로 12")
        );
    }

    #[test]
    fn blob_handle_promotes_structured_provenance() {
        assert_eq!(
            promote(Strategy::StructuredContent, ContentHandle::EmbeddedBlob),
            Strategy::EmbeddedBlob
        );
        assert_eq!(
            promote(Strategy::DomScan, ContentHandle::EmbeddedBlob),
            Strategy::DomScan
        );
        assert_eq!(
            promote(Strategy::StructuredContent, ContentHandle::Frame),
            Strategy::StructuredContent
        );
    }
}
