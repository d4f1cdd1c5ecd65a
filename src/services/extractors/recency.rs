use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use regex::Regex;
use thirtyfour::error::WebDriverResult;
use thirtyfour::{By, WebDriver};

use crate::domain::extraction::{DiagnosisTrace, ExtractionResult, Strategy};

/// Fewer parsed dates than this and the page probably didn't render the
/// review list at all; recency stays unmeasured rather than zero.
pub const MIN_TRUSTED_DATES: usize = 3;
pub const RECENT_WINDOW_DAYS: i64 = 30;

pub fn review_list_url(place_id: &str) -> String {
    format!("https://m.place.naver.com/place/{}/review/visitor", place_id)
}

/// Parses both date shapes the review list renders: `2025.8.12.` with an
/// explicit year, and `8.12.화` where the year is implied by `today`.
pub fn parse_date_tokens(text: &str, today: NaiveDate) -> Vec<NaiveDate> {
    let with_year = Regex::new(r"(\d{4})\.(\d{1,2})\.(\d{1,2})").unwrap();
    let weekday_form = Regex::new(r"(?:^|[^\d.])(\d{1,2})\.(\d{1,2})\.(?:월|화|수|목|금|토|일)").unwrap();

    let mut dates: Vec<NaiveDate> = vec![];

    for cap in with_year.captures_iter(text) {
        let (year, month, day) = (
            cap[1].parse().unwrap_or(0),
            cap[2].parse().unwrap_or(0),
            cap[3].parse().unwrap_or(0),
        );
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            dates.push(date);
        }
    }

    for cap in weekday_form.captures_iter(text) {
        let (month, day) = (cap[1].parse().unwrap_or(0), cap[2].parse().unwrap_or(0));
        if let Some(date) = NaiveDate::from_ymd_opt(today.year(), month, day) {
            // A month/day past today belongs to last year.
            let date = if date > today {
                NaiveDate::from_ymd_opt(today.year() - 1, month, day).unwrap_or(date)
            } else {
                date
            };
            dates.push(date);
        }
    }

    dates
}

/// None when too few dates parsed to trust the page at all.
pub fn count_recent(dates: &[NaiveDate], today: NaiveDate) -> Option<u32> {
    if dates.len() < MIN_TRUSTED_DATES {
        return None;
    }
    let floor = today - ChronoDuration::days(RECENT_WINDOW_DAYS);
    let recent = dates
        .iter()
        .filter(|&&d| d > floor && d <= today)
        .count() as u32;
    Some(recent)
}

/// Navigates to the review list and counts reviews within the last 30
/// days of `today`. `today` is injected so tests never touch the clock.
pub async fn extract_recency(
    driver: &WebDriver,
    place_id: &str,
    today: NaiveDate,
    trace: &mut DiagnosisTrace,
) -> WebDriverResult<ExtractionResult<u32>> {
    let url = review_list_url(place_id);
    if let Err(e) = driver.goto(&url).await {
        trace.note("recency", format!("review list navigation failed: {:?}", e));
        return Ok(ExtractionResult::absent());
    }

    let body_text = match driver.find(By::Tag("body")).await {
        Ok(body) => body.text().await.unwrap_or_default(),
        Err(_) => String::new(),
    };

    let dates = parse_date_tokens(&body_text, today);
    match count_recent(&dates, today) {
        Some(recent) => {
            trace.note(
                "recency",
                format!("{} of {} parsed dates within 30d", recent, dates.len()),
            );
            Ok(ExtractionResult::found(recent, Strategy::DomScan))
        }
        None => {
            trace.note(
                "recency",
                format!("only {} dates parsed, leaving unmeasured", dates.len()),
            );
            Ok(ExtractionResult::absent())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_both_date_formats() {
        let today = day(2025, 8, 20);
        let text = "방문일 2025.8.12. 좋았어요\n7.30.수 재방문\n2024.12.1. 오래된 리뷰";
        let dates = parse_date_tokens(text, today);
        assert_eq!(
            dates,
            vec![day(2025, 8, 12), day(2024, 12, 1), day(2025, 7, 30)]
        );
    }

    #[test]
    fn weekday_form_past_today_rolls_back_a_year() {
        let today = day(2025, 2, 10);
        let dates = parse_date_tokens("11.20.목", today);
        assert_eq!(dates, vec![day(2024, 11, 20)]);
    }

    #[test]
    fn counts_only_dates_within_the_window() {
        let today = day(2025, 8, 20);
        let dates = vec![
            day(2025, 8, 18),
            day(2025, 8, 1),
            day(2025, 7, 25),
            day(2025, 6, 1),
        ];
        assert_eq!(count_recent(&dates, today), Some(3));
    }

    #[test]
    fn too_few_dates_leaves_recency_unmeasured() {
        let today = day(2025, 8, 20);
        let dates = vec![day(2025, 8, 18), day(2025, 8, 19)];
        assert_eq!(count_recent(&dates, today), None);
    }

    #[test]
    fn future_dates_are_not_counted() {
        let today = day(2025, 8, 20);
        let dates = vec![day(2025, 8, 25), day(2025, 8, 10), day(2025, 8, 11)];
        assert_eq!(count_recent(&dates, today), Some(2));
    }
}
