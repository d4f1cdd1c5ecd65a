use serde::{Deserialize, Serialize};

pub const MAX_KEYWORDS: usize = 5;

/// One menu/price line item as rendered on the pricing tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    pub price_text: String,
    pub description: Option<String>,
}

impl MenuItem {
    /// A price text that carries at least one digit is a concrete price,
    /// as opposed to "문의" / "상담" style inquiry pricing.
    pub fn has_numeric_price(&self) -> bool {
        self.price_text.chars().any(|c| c.is_ascii_digit())
    }
}

/// Everything we managed to extract for a single listing.
///
/// `Option` counts mean "unmeasured", which scoring treats as neutral.
/// `0` means we confirmed the listing really has none.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub place_id: String,
    pub name: String,
    pub address: String,
    pub description: String,
    pub directions: String,
    pub keywords: Vec<String>,
    pub review_count: u32,
    pub recent_review_count: Option<u32>,
    pub photo_count: u32,
    pub menu_items: Vec<MenuItem>,
    pub menu_count: Option<u32>,
}

impl BusinessRecord {
    pub fn new(place_id: impl Into<String>) -> Self {
        BusinessRecord {
            place_id: place_id.into(),
            ..Default::default()
        }
    }

    /// Keeps the keyword list within the cap, dropping case-insensitive
    /// duplicates while preserving first-seen order.
    pub fn set_keywords(&mut self, raw: Vec<String>) {
        self.keywords = dedupe_keywords(raw);
    }
}

pub fn dedupe_keywords(raw: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = vec![];
    let mut out: Vec<String> = vec![];
    for kw in raw {
        let kw = kw.trim().to_string();
        if kw.is_empty() {
            continue;
        }
        let lowered = kw.to_lowercase();
        if seen.contains(&lowered) {
            continue;
        }
        seen.push(lowered);
        out.push(kw);
        if out.len() == MAX_KEYWORDS {
            break;
        }
    }
    out
}

/// Which discovery stage surfaced a competitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoverySource {
    ApiRank,
    PageSniff,
}

/// Public subset of a competing listing, plus its search rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorRecord {
    pub place_id: String,
    pub name: String,
    pub address: String,
    pub keywords: Vec<String>,
    pub review_count: Option<u32>,
    pub photo_count: Option<u32>,
    pub rank: u32,
    pub source: DiscoverySource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_keywords_caps_and_dedupes_case_insensitive() {
        let raw = vec![
            "네일아트".to_string(),
            "Gel Nail".to_string(),
            "gel nail".to_string(),
            "속눈썹".to_string(),
            "왁싱".to_string(),
            "페디큐어".to_string(),
            "네일아트".to_string(),
            "두피케어".to_string(),
        ];
        let result = dedupe_keywords(raw);

        assert_eq!(result.len(), 5);
        assert_eq!(
            result,
            vec!["네일아트", "Gel Nail", "속눈썹", "왁싱", "페디큐어"]
        );
    }

    #[test]
    fn dedupe_keywords_skips_blank_entries() {
        let raw = vec!["  ".to_string(), "커트".to_string(), "".to_string()];
        assert_eq!(dedupe_keywords(raw), vec!["커트"]);
    }

    #[test]
    fn numeric_price_detection() {
        let item = MenuItem {
            name: "젤네일".to_string(),
            price_text: "45,000원".to_string(),
            description: None,
        };
        assert!(item.has_numeric_price());

        let inquiry = MenuItem {
            name: "웨딩네일".to_string(),
            price_text: "가격문의".to_string(),
            description: None,
        };
        assert!(!inquiry.has_numeric_price());
    }
}
