use thirtyfour::error::WebDriverResult;
use thirtyfour::{By, WebDriver};

use crate::domain::business::{dedupe_keywords, MAX_KEYWORDS};
use crate::domain::extraction::{DiagnosisTrace, ExtractionResult, Strategy};
use crate::services::page_source::find_string_array_by_key;

/// Structured-data keys that have carried the self-declared keyword list
/// across site revisions. Order matters: first key with data wins.
pub const KEYWORD_KEYS: &[&str] = &["keywordList", "keywords", "repKeywords"];

const CHIP_MIN_CHARS: usize = 2;
const CHIP_MAX_CHARS: usize = 15;

fn keywords_from_source(source: &str) -> Vec<String> {
    for key in KEYWORD_KEYS {
        let values = find_string_array_by_key(source, key);
        if !values.is_empty() {
            return dedupe_keywords(values);
        }
    }
    vec![]
}

/// Cascade: structured keys in the content source, then the outer page
/// source, then a DOM scan for search-linked keyword chips. Strategies are
/// never merged; the first one that yields anything is the answer.
pub async fn extract_keywords(
    driver: &WebDriver,
    content_source: &str,
    outer_source: &str,
    trace: &mut DiagnosisTrace,
) -> WebDriverResult<ExtractionResult<Vec<String>>> {
    let found = keywords_from_source(content_source);
    if !found.is_empty() {
        trace.note("keywords", format!("{} from content structured data", found.len()));
        return Ok(ExtractionResult::found(found, Strategy::StructuredContent));
    }

    let found = keywords_from_source(outer_source);
    if !found.is_empty() {
        trace.note("keywords", format!("{} from outer structured data", found.len()));
        return Ok(ExtractionResult::found(found, Strategy::StructuredOuter));
    }

    // DOM fallback: short anchor texts that look like search-linked chips.
    let mut chips: Vec<String> = vec![];
    for anchor in driver.find_all(By::Tag("a")).await? {
        let text = anchor.text().await.unwrap_or_default();
        let text = text.trim();
        let href = anchor.attr("href").await.ok().flatten().unwrap_or_default();

        let looks_like_chip = text.starts_with('#')
            || (href.contains("/search") && !text.is_empty());
        if !looks_like_chip {
            continue;
        }
        let cleaned = text.trim_start_matches('#').trim().to_string();
        let char_count = cleaned.chars().count();
        if char_count >= CHIP_MIN_CHARS && char_count <= CHIP_MAX_CHARS {
            chips.push(cleaned);
        }
        if chips.len() >= MAX_KEYWORDS * 2 {
            break;
        }
    }
    let chips = dedupe_keywords(chips);
    if !chips.is_empty() {
        trace.note("keywords", format!("{} from DOM chip scan", chips.len()));
        return Ok(ExtractionResult::found(chips, Strategy::DomScan));
    }

    trace.note("keywords", "absent after full cascade");
    Ok(ExtractionResult::absent())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_keys_are_tried_in_order() {
        let source = r#"{"keywords":["왁싱"],"keywordList":["네일아트","속눈썹"]}"#;
        let found = keywords_from_source(source);
        assert_eq!(found, vec!["네일아트", "속눈썹"]);
    }

    #[test]
    fn falls_through_to_later_key_when_first_is_missing() {
        let source = r#"{"repKeywords":["브런치","라떼"]}"#;
        assert_eq!(keywords_from_source(source), vec!["브런치", "라떼"]);
    }

    #[test]
    fn caps_at_five_unique_keywords() {
        let source = r#"{"keywordList":["a1","b2","B2","c3","d4","e5","f6"]}"#;
        let found = keywords_from_source(source);
        assert_eq!(found.len(), 5);
        assert!(!found.contains(&"f6".to_string()));
    }

    #[test]
    fn empty_source_yields_nothing() {
        assert!(keywords_from_source("<html></html>").is_empty());
    }
}
