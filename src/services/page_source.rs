use regex::Regex;

/// Helpers for digging fields out of the structured JSON blobs the target
/// site embeds in its page sources. The schema is reverse-engineered and
/// unstable, so everything here is key-name search over raw text rather
/// than full deserialization.

/// Unescapes the subset of JSON string escapes that actually show up in
/// the embedded blobs.
pub fn decode_json_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => {}
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if let Ok(code) = u32::from_str_radix(&hex, 16) {
                    if let Some(decoded) = char::from_u32(code) {
                        out.push(decoded);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// All JSON string values found for `"key": "..."` anywhere in the source.
pub fn find_string_values_by_key(source: &str, key: &str) -> Vec<String> {
    let pattern = format!(r#""{}"\s*:\s*"((?:[^"\\]|\\.)*)""#, regex::escape(key));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(_) => return vec![],
    };
    re.captures_iter(source)
        .map(|cap| decode_json_string(&cap[1]))
        .filter(|v| !v.trim().is_empty())
        .collect()
}

/// String elements of the first few `"key": [...]` arrays in the source.
pub fn find_string_array_by_key(source: &str, key: &str) -> Vec<String> {
    let pattern = format!(r#""{}"\s*:\s*\[([^\]]*)\]"#, regex::escape(key));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(_) => return vec![],
    };
    let element_re = Regex::new(r#""((?:[^"\\]|\\.)*)""#).unwrap();

    let mut values = vec![];
    for cap in re.captures_iter(source) {
        for element in element_re.captures_iter(&cap[1]) {
            let value = decode_json_string(&element[1]);
            if !value.trim().is_empty() {
                values.push(value);
            }
        }
    }
    values
}

/// Every numeric value found for `"key": 123` or `"key": "123"`.
pub fn find_numbers_by_key(source: &str, key: &str) -> Vec<u64> {
    let pattern = format!(r#""{}"\s*:\s*"?(\d+)"#, regex::escape(key));
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(_) => return vec![],
    };
    re.captures_iter(source)
        .filter_map(|cap| cap[1].parse().ok())
        .collect()
}

/// First balanced `{...}` object in a text blob, tolerating leading and
/// trailing non-JSON noise. Used both for embedded page blobs and for
/// generative-service replies that wrap JSON in prose.
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_string_values_with_escapes() {
        let source = r#"{"description":"강남 1번 출구\n도보 2분","other":"x"}"#;
        let values = find_string_values_by_key(source, "description");
        assert_eq!(values, vec!["강남 1번 출구\n도보 2분"]);
    }

    #[test]
    fn finds_all_occurrences_of_a_key() {
        let source = r#""microReview":"first","microReview":"second longer text""#;
        let values = find_string_values_by_key(source, "microReview");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn finds_string_arrays() {
        let source = r#"{"keywordList":["네일아트","속눈썹","왁싱"],"e":1}"#;
        let values = find_string_array_by_key(source, "keywordList");
        assert_eq!(values, vec!["네일아트", "속눈썹", "왁싱"]);
    }

    #[test]
    fn finds_numbers_quoted_or_bare() {
        let source = r#""visitorReviewsTotal":1204,"imageCount":"88""#;
        assert_eq!(find_numbers_by_key(source, "visitorReviewsTotal"), vec![1204]);
        assert_eq!(find_numbers_by_key(source, "imageCount"), vec![88]);
    }

    #[test]
    fn extracts_balanced_object_from_noisy_text() {
        let noisy = "물론입니다! 아래 JSON을 확인하세요:\n{\"a\": {\"b\": \"중괄호 } 포함\"}, \"c\": 1}\n감사합니다.";
        let json = extract_first_json_object(noisy).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(parsed["c"], 1);
    }

    #[test]
    fn unbalanced_object_yields_none() {
        assert_eq!(extract_first_json_object("{\"a\": 1"), None);
        assert_eq!(extract_first_json_object("no json here"), None);
    }
}
