use regex::Regex;
use thirtyfour::error::WebDriverResult;
use thirtyfour::{By, WebDriver};

use crate::domain::business::MenuItem;
use crate::domain::extraction::{DiagnosisTrace, ExtractionResult, Strategy};

pub const MENU_ITEM_CAP: usize = 50;
const NAME_MAX_CHARS: usize = 60;

const INQUIRY_TOKENS: &[&str] = &["가격문의", "문의", "상담", "변동", "시가"];

pub fn menu_url(place_id: &str) -> String {
    format!("https://m.place.naver.com/place/{}/menu/list", place_id)
}

fn is_price_line(line: &str) -> bool {
    let price_re = Regex::new(r"(?:[\d,]+\s*원|₩\s*[\d,]+)").unwrap();
    price_re.is_match(line) || INQUIRY_TOKENS.iter().any(|t| line.contains(t))
}

fn plausible_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && trimmed.chars().count() <= NAME_MAX_CHARS
        && !trimmed.chars().all(|c| c.is_ascii_digit() || c == ',')
}

/// Splits rendered text lines into menu items: blocks of consecutive
/// non-empty lines where one line carries a price or inquiry token.
/// Name is the first non-price line, description whatever remains.
pub fn parse_menu_lines(lines: &[&str]) -> Vec<MenuItem> {
    let mut items: Vec<MenuItem> = vec![];
    let mut block: Vec<&str> = vec![];

    let mut flush = |block: &mut Vec<&str>, items: &mut Vec<MenuItem>| {
        if block.is_empty() {
            return;
        }
        let price_idx = block.iter().position(|l| is_price_line(l));
        if let Some(idx) = price_idx {
            let price_text = block[idx].trim().to_string();
            let name = block
                .iter()
                .enumerate()
                .find(|(i, l)| *i != idx && !l.trim().is_empty())
                .map(|(_, l)| l.trim().to_string())
                .unwrap_or_default();
            let description: Vec<&str> = block
                .iter()
                .enumerate()
                .filter(|(i, l)| *i != idx && l.trim() != name)
                .map(|(_, l)| l.trim())
                .filter(|l| !l.is_empty())
                .collect();

            if plausible_name(&name) {
                let duplicate = items
                    .iter()
                    .any(|m: &MenuItem| m.name == name && m.price_text == price_text);
                if !duplicate && items.len() < MENU_ITEM_CAP {
                    items.push(MenuItem {
                        name,
                        price_text,
                        description: if description.is_empty() {
                            None
                        } else {
                            Some(description.join(" "))
                        },
                    });
                }
            }
        }
        block.clear();
    };

    for line in lines {
        if line.trim().is_empty() {
            flush(&mut block, &mut items);
        } else {
            block.push(line);
        }
    }
    flush(&mut block, &mut items);

    items
}

/// Navigates to the pricing sub-view and parses whatever line candidates
/// rendered. Absent menu data is a valid outcome and stays `absent`.
pub async fn extract_menu(
    driver: &WebDriver,
    place_id: &str,
    trace: &mut DiagnosisTrace,
) -> WebDriverResult<ExtractionResult<Vec<MenuItem>>> {
    let url = menu_url(place_id);
    if let Err(e) = driver.goto(&url).await {
        trace.note("menu", format!("menu navigation failed: {:?}", e));
        return Ok(ExtractionResult::absent());
    }

    let body_text = match driver.find(By::Tag("body")).await {
        Ok(body) => body.text().await.unwrap_or_default(),
        Err(_) => String::new(),
    };

    let lines: Vec<&str> = body_text.lines().collect();
    let items = parse_menu_lines(&lines);
    if items.is_empty() {
        trace.note("menu", "no price-like line candidates");
        return Ok(ExtractionResult::absent());
    }

    trace.note("menu", format!("{} items parsed", items.len()));
    Ok(ExtractionResult::found(items, Strategy::DomScan))
}
