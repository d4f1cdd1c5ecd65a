use std::time::{Duration, Instant};

use regex::Regex;
use thirtyfour::extensions::query::ElementQueryable;
use thirtyfour::{By, WebDriver};
use url::Url;

use crate::domain::extraction::DiagnosisTrace;
use crate::error::DiagnoseError;

const ENTRY_FRAME_ID: &str = "entryIframe";
const ENTRY_FRAME_MARKER: &str = "entry";
const EMBEDDED_BLOB_MARKER: &str = "__APOLLO_STATE__";
const MIN_ID_DIGITS: usize = 5;
const MAX_ID_DIGITS: usize = 15;

/// Where the extractable content ended up after the frame cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentHandle {
    /// Driver is switched into the nested content frame.
    Frame,
    /// No frame found; the outer page itself is the content.
    Outer,
    /// No frame, but the outer page inlines the full data blob.
    EmbeddedBlob,
}

#[derive(Debug)]
pub struct Resolved {
    pub place_id: String,
    pub handle: ContentHandle,
    /// Source of the outer page before any frame switch. Extractors widen
    /// their key search to this when the content handle has nothing.
    pub outer_source: String,
    pub trace: DiagnosisTrace,
}

/// Path-segment matchers, tried before any query parameter. The order is
/// part of the contract: a path id always beats a stray query number.
fn path_patterns() -> &'static [&'static str] {
    &[
        r"/place/(\d{5,15})",
        r"/(?:restaurant|hairshop|cafe|beauty|accommodation|hospital)/(\d{5,15})",
        r"/entry/place/(\d{5,15})",
    ]
}

const ID_QUERY_PARAMS: &[&str] = &["id", "placeId", "pinId"];

fn is_id_shaped(val: &str) -> bool {
    val.len() >= MIN_ID_DIGITS
        && val.len() <= MAX_ID_DIGITS
        && val.chars().all(|c| c.is_ascii_digit())
}

pub fn extract_place_id(input: &str) -> Result<String, DiagnoseError> {
    let input = input.trim();

    for pattern in path_patterns() {
        let re = Regex::new(pattern).expect("id pattern must compile");
        if let Some(cap) = re.captures(input) {
            return Ok(cap[1].to_string());
        }
    }

    if let Ok(parsed) = Url::parse(input) {
        for param in ID_QUERY_PARAMS {
            if let Some((_, value)) = parsed.query_pairs().find(|(k, _)| k == param) {
                if is_id_shaped(&value) {
                    return Ok(value.to_string());
                }
            }
        }
    }

    // Bare-digit fallback: the caller pasted a raw id.
    if is_id_shaped(input) {
        return Ok(input.to_string());
    }

    Err(DiagnoseError::InvalidIdentifier {
        input: input.to_string(),
    })
}

pub fn canonical_mobile_url(place_id: &str) -> String {
    format!("https://m.place.naver.com/place/{}/home", place_id)
}

fn shell_path(place_id: &str) -> String {
    format!("/place/{}", place_id)
}

/// Resolves an arbitrary caller input into a place id plus a usable content
/// handle, walking the frame discovery cascade. On success the driver is
/// left switched into whatever the handle points at.
pub async fn resolve(
    driver: &WebDriver,
    input: &str,
    frame_wait: Duration,
) -> Result<Resolved, DiagnoseError> {
    let mut trace = DiagnosisTrace::new();
    let place_id = extract_place_id(input)?;
    let url = canonical_mobile_url(&place_id);

    let started = Instant::now();
    if let Err(e) = driver.goto(&url).await {
        trace.push("navigate", format!("goto failed: {:?}", e), started);
        return Err(DiagnoseError::NavigationFailure {
            url,
            reason: format!("{:?}", e),
        });
    }
    trace.push("navigate", format!("loaded {}", url), started);

    let mut retried_home = false;
    loop {
        // 1. Wait briefly for the well-known nested frame element.
        let started = Instant::now();
        let frame = driver
            .query(By::Id(ENTRY_FRAME_ID))
            .wait(frame_wait, Duration::from_millis(250))
            .first()
            .await;
        match frame {
            Ok(element) => {
                trace.push("frame_wait", "found #entryIframe", started);
                let outer_source = driver.source().await.unwrap_or_default();
                if element.enter_frame().await.is_ok() {
                    return Ok(Resolved {
                        place_id,
                        handle: ContentHandle::Frame,
                        outer_source,
                        trace,
                    });
                }
                trace.note("frame_wait", "enter_frame failed, falling through");
            }
            Err(_) => {
                trace.push("frame_wait", "no #entryIframe", started);
            }
        }

        // 2. Scan every nested frame for an entry marker in src or name.
        let started = Instant::now();
        if let Ok(frames) = driver.find_all(By::Tag("iframe")).await {
            let total = frames.len();
            for frame in frames {
                let src = frame.attr("src").await.ok().flatten().unwrap_or_default();
                let name = frame.attr("name").await.ok().flatten().unwrap_or_default();
                if src.contains(ENTRY_FRAME_MARKER) || name.contains(ENTRY_FRAME_MARKER) {
                    trace.push(
                        "frame_scan",
                        format!("matched 1 of {} iframes (src: {})", total, src),
                        started,
                    );
                    let outer_source = driver.source().await.unwrap_or_default();
                    if frame.enter_frame().await.is_ok() {
                        return Ok(Resolved {
                            place_id,
                            handle: ContentHandle::Frame,
                            outer_source,
                            trace,
                        });
                    }
                }
            }
            trace.push(
                "frame_scan",
                format!("no entry marker among {} iframes", total),
                started,
            );
        }

        // 3. Bare shell page — hop to the /home sibling once and retry.
        if !retried_home {
            if let Ok(current) = driver.current_url().await {
                if current.path() == shell_path(&place_id) {
                    retried_home = true;
                    let home = canonical_mobile_url(&place_id);
                    let started = Instant::now();
                    match driver.goto(&home).await {
                        Ok(()) => {
                            trace.push("shell_retry", format!("navigated to {}", home), started);
                            continue;
                        }
                        Err(e) => {
                            trace.push("shell_retry", format!("goto failed: {:?}", e), started);
                        }
                    }
                }
            }
        }
        break;
    }

    // 4. Outer page as the handle, with the embedded blob if present.
    let outer_source = driver.source().await.unwrap_or_default();
    if outer_source.trim().is_empty() {
        trace.note("fallback", "outer page source empty, nothing to extract");
        return Err(DiagnoseError::NoContentHandle { place_id, trace });
    }
    if outer_source.contains(EMBEDDED_BLOB_MARKER) {
        trace.note("blob_probe", "outer page inlines the data blob");
        return Ok(Resolved {
            place_id,
            handle: ContentHandle::EmbeddedBlob,
            outer_source,
            trace,
        });
    }

    trace.note("fallback", "treating outer page as content handle");
    Ok(Resolved {
        place_id,
        handle: ContentHandle::Outer,
        outer_source,
        trace,
    })
}
