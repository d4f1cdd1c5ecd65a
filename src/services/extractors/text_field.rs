use thirtyfour::error::WebDriverResult;
use thirtyfour::{By, WebDriver};

use crate::domain::extraction::{DiagnosisTrace, ExtractionResult, Strategy};
use crate::services::page_source::find_string_values_by_key;

/// Policy for one free-text field. The key list and signal vocabulary are
/// data, not code, so the cascade order stays a swappable artifact.
pub struct TextFieldSpec {
    pub label: &'static str,
    pub keys: &'static [&'static str],
    pub signal_words: &'static [&'static str],
    pub max_chars: usize,
}

pub const DESCRIPTION_SPEC: TextFieldSpec = TextFieldSpec {
    label: "description",
    keys: &["description", "introduction", "microReview", "intro"],
    signal_words: &[
        "전문", "시술", "운영", "서비스", "예약", "상담", "경력", "메뉴", "이용", "고객",
    ],
    max_chars: 1200,
};

pub const DIRECTIONS_SPEC: TextFieldSpec = TextFieldSpec {
    label: "directions",
    keys: &["wayInfo", "roadWay", "direction", "way"],
    signal_words: &[
        "역", "출구", "도보", "주차", "층", "버스", "정류장", "골목", "사거리", "엘리베이터",
    ],
    max_chars: 800,
};

fn cap_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Longest-wins across every key match: longer matches are assumed more
/// complete, not more correct. That is the stated policy, not a guarantee.
fn longest_match(spec: &TextFieldSpec, source: &str) -> Option<String> {
    spec.keys
        .iter()
        .flat_map(|key| find_string_values_by_key(source, key))
        .max_by_key(|v| v.chars().count())
}

/// Cascade: structured keys in the content source, same search widened to
/// the outer page, then a rendered-body line scan filtered by the field's
/// signal vocabulary.
pub async fn extract_text_field(
    driver: &WebDriver,
    spec: &TextFieldSpec,
    content_source: &str,
    outer_source: &str,
    trace: &mut DiagnosisTrace,
) -> WebDriverResult<ExtractionResult<String>> {
    if let Some(text) = longest_match(spec, content_source) {
        trace.note(spec.label, format!("{} chars from content keys", text.chars().count()));
        return Ok(ExtractionResult::found(
            cap_chars(&text, spec.max_chars),
            Strategy::StructuredContent,
        ));
    }

    if let Some(text) = longest_match(spec, outer_source) {
        trace.note(spec.label, format!("{} chars from outer keys", text.chars().count()));
        return Ok(ExtractionResult::found(
            cap_chars(&text, spec.max_chars),
            Strategy::StructuredOuter,
        ));
    }

    // Rendered-body fallback: keep only lines carrying signal vocabulary.
    let body_text = match driver.find(By::Tag("body")).await {
        Ok(body) => body.text().await?,
        Err(_) => String::new(),
    };
    let joined = scan_body_lines(&body_text, spec);
    if !joined.is_empty() {
        trace.note(spec.label, format!("{} chars from body scan", joined.chars().count()));
        return Ok(ExtractionResult::found(joined, Strategy::BodyTextScan));
    }

    trace.note(spec.label, "absent after full cascade");
    Ok(ExtractionResult::absent())
}

fn scan_body_lines(body_text: &str, spec: &TextFieldSpec) -> String {
    let lines: Vec<&str> = body_text
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .filter(|l| spec.signal_words.iter().any(|w| l.contains(w)))
        .collect();
    cap_chars(&lines.join("\n"), spec.max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_wins_across_keys() {
        let source = r#"{"microReview":"아늑한 카페","description":"직접 로스팅한 원두로 내리는 핸드드립 전문 카페입니다"}"#;
        let text = longest_match(&DESCRIPTION_SPEC, source).unwrap();
        assert!(text.starts_with("직접 로스팅"));
    }

    #[test]
    fn longest_wins_within_one_key() {
        let source = r#""wayInfo":"짧음","wayInfo":"강남역 3번 출구에서 도보로 2분 거리입니다""#;
        let text = longest_match(&DIRECTIONS_SPEC, source).unwrap();
        assert!(text.contains("3번 출구"));
    }

    #[test]
    fn body_scan_keeps_only_signal_lines() {
        let body = "홈\n리뷰 1,204\n강남역 3번 출구 도보 2분\n저장\n건물 뒤 주차 가능\n공유하기";
        let result = scan_body_lines(body, &DIRECTIONS_SPEC);
        assert_eq!(result, "강남역 3번 출구 도보 2분\n건물 뒤 주차 가능");
    }

    #[test]
    fn caps_at_max_chars() {
        let long = "가".repeat(2000);
        assert_eq!(cap_chars(&long, 1200).chars().count(), 1200);
    }
}
