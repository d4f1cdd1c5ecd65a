use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Relative weight of each scoring category. Must sum to 100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub description: u32,
    pub directions: u32,
    pub keywords: u32,
    pub reviews: u32,
    pub photos: u32,
    pub price: u32,
}

impl CategoryWeights {
    pub fn total(&self) -> u32 {
        self.description + self.directions + self.keywords + self.reviews + self.photos + self.price
    }
}

/// Per-industry scoring constants. Built once at startup, read-only after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndustryConfig {
    pub tag: String,
    pub weights: CategoryWeights,

    pub desc_min_len: usize,
    pub desc_good_len: usize,
    pub desc_keyword_boost_max: f64,

    pub dir_min_len: usize,
    pub dir_good_len: usize,
    pub dir_keyword_boost_max: f64,
    pub wayfinding_words: Vec<String>,

    pub keyword_target: usize,
    pub intent_words: Vec<String>,
    pub industry_words: Vec<String>,
    pub stop_words: Vec<String>,

    pub review_target: u32,
    pub photo_target: u32,

    /// Minimum acceptable share of menu items with a concrete numeric price.
    pub numeric_price_threshold: f64,
    /// Maximum acceptable share of inquiry/variable-price items.
    pub inquiry_tolerance: f64,
    pub strict_pricing: bool,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn salon() -> IndustryConfig {
    IndustryConfig {
        tag: "salon".to_string(),
        weights: CategoryWeights {
            description: 20,
            directions: 10,
            keywords: 25,
            reviews: 20,
            photos: 15,
            price: 10,
        },
        desc_min_len: 120,
        desc_good_len: 400,
        desc_keyword_boost_max: 15.0,
        dir_min_len: 40,
        dir_good_len: 150,
        dir_keyword_boost_max: 5.0,
        wayfinding_words: words(&[
            "역", "출구", "도보", "분", "주차", "층", "골목", "버스", "사거리", "건물",
        ]),
        keyword_target: 5,
        intent_words: words(&["추천", "후기", "가격", "예약", "잘하는곳", "리뷰"]),
        industry_words: words(&[
            "네일", "속눈썹", "왁싱", "펌", "염색", "커트", "두피", "클리닉", "메이크업", "케어",
        ]),
        stop_words: words(&["미용실", "헤어", "샵", "살롱", "뷰티"]),
        review_target: 300,
        photo_target: 100,
        numeric_price_threshold: 0.5,
        inquiry_tolerance: 0.4,
        strict_pricing: false,
    }
}

fn cafe() -> IndustryConfig {
    IndustryConfig {
        tag: "cafe".to_string(),
        weights: CategoryWeights {
            description: 20,
            directions: 10,
            keywords: 20,
            reviews: 25,
            photos: 15,
            price: 10,
        },
        desc_min_len: 100,
        desc_good_len: 350,
        desc_keyword_boost_max: 15.0,
        dir_min_len: 40,
        dir_good_len: 150,
        dir_keyword_boost_max: 5.0,
        wayfinding_words: words(&[
            "역", "출구", "도보", "분", "주차", "층", "골목", "버스", "사거리", "건물",
        ]),
        keyword_target: 5,
        intent_words: words(&["추천", "후기", "가격", "예약", "맛집", "리뷰"]),
        industry_words: words(&[
            "커피", "디저트", "브런치", "케이크", "원두", "로스팅", "베이커리", "라떼", "테라스",
        ]),
        stop_words: words(&["카페", "커피숍", "까페"]),
        review_target: 500,
        photo_target: 200,
        numeric_price_threshold: 0.7,
        inquiry_tolerance: 0.2,
        strict_pricing: false,
    }
}

fn restaurant() -> IndustryConfig {
    IndustryConfig {
        tag: "restaurant".to_string(),
        weights: CategoryWeights {
            description: 15,
            directions: 10,
            keywords: 20,
            reviews: 25,
            photos: 15,
            price: 15,
        },
        desc_min_len: 100,
        desc_good_len: 350,
        desc_keyword_boost_max: 15.0,
        dir_min_len: 40,
        dir_good_len: 150,
        dir_keyword_boost_max: 5.0,
        wayfinding_words: words(&[
            "역", "출구", "도보", "분", "주차", "층", "골목", "버스", "사거리", "건물",
        ]),
        keyword_target: 5,
        intent_words: words(&["추천", "후기", "가격", "예약", "맛집", "리뷰"]),
        industry_words: words(&[
            "한식", "점심", "저녁", "회식", "단체", "코스", "메뉴", "포장", "배달", "룸",
        ]),
        stop_words: words(&["맛집", "식당", "음식점"]),
        review_target: 800,
        photo_target: 300,
        numeric_price_threshold: 0.8,
        inquiry_tolerance: 0.1,
        strict_pricing: true,
    }
}

fn registry() -> &'static HashMap<String, IndustryConfig> {
    static REGISTRY: OnceLock<HashMap<String, IndustryConfig>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        for cfg in [salon(), cafe(), restaurant()] {
            debug_assert_eq!(cfg.weights.total(), 100, "weights for {}", cfg.tag);
            map.insert(cfg.tag.clone(), cfg);
        }
        map
    })
}

/// Unknown industry tags fall back to the salon profile, which has the
/// least aggressive pricing expectations.
pub fn industry_config(tag: &str) -> &'static IndustryConfig {
    let reg = registry();
    reg.get(tag).unwrap_or_else(|| &reg["salon"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_weights_sum_to_100() {
        for tag in ["salon", "cafe", "restaurant"] {
            assert_eq!(industry_config(tag).weights.total(), 100, "{}", tag);
        }
    }

    #[test]
    fn unknown_tag_falls_back_to_salon() {
        assert_eq!(industry_config("florist").tag, "salon");
    }

    #[test]
    fn restaurant_pricing_is_stricter_than_salon() {
        let r = industry_config("restaurant");
        let s = industry_config("salon");
        assert!(r.numeric_price_threshold > s.numeric_price_threshold);
        assert!(r.inquiry_tolerance < s.inquiry_tolerance);
        assert!(r.strict_pricing);
    }
}
