#![forbid(unsafe_code)]

//! Support for pages rendered by an in-browser PDF viewer.
//!
//! PDF viewers expose their text as absolutely positioned `span`s inside
//! `.textLayer` containers, one layer per page. Block-structure extraction
//! gives poor results there, so PDF pages read the layers directly.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::node::ElementData;
use crate::snapshot::DomSnapshot;

static PAGE_COUNTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").expect("page counter regex"));

const PDF_MIME: &str = "application/pdf";

/// Whether the page is a PDF document or embeds one.
#[must_use]
pub fn is_pdf_document(location_path: &str, snapshot: &DomSnapshot) -> bool {
    location_path.to_ascii_lowercase().ends_with(".pdf")
        || snapshot
            .find_element(snapshot.body(), is_embedded_pdf)
            .is_some()
}

fn is_embedded_pdf(el: &ElementData) -> bool {
    match el.tag() {
        "embed" | "object" => el.attr("type") == Some(PDF_MIME),
        "iframe" => el.attr("src").is_some_and(|src| src.contains(".pdf")),
        _ => false,
    }
}

/// Text of every PDF text layer, one paragraph per layer.
///
/// Falls back to the raw body text when no layer holds any text.
#[must_use]
pub fn extract_pdf_text(snapshot: &DomSnapshot) -> String {
    let mut text = String::new();
    for layer in snapshot.elements_matching(snapshot.body(), |el| el.has_class("textLayer")) {
        let mut spans = snapshot
            .elements_matching(layer, |el| el.tag() == "span")
            .peekable();
        if spans.peek().is_none() {
            continue;
        }
        for span in spans {
            text.push_str(&snapshot.text_content(span));
            text.push(' ');
        }
        text.push_str("\n\n");
    }
    if text.trim().is_empty() {
        tracing::debug!("no pdf text layers, using body text");
        return snapshot.text_content(snapshot.body());
    }
    text
}

/// Number of pages shown by the viewer, if it can be determined.
///
/// Reads the `N / M` page counter first, then counts `.page` containers.
#[must_use]
pub fn pdf_page_count(snapshot: &DomSnapshot) -> Option<usize> {
    let counter = snapshot
        .find_element(snapshot.body(), |el| el.has_class("pageNumber"))
        .map(|id| snapshot.text_content(id));
    if let Some(caps) = counter.as_deref().and_then(|c| PAGE_COUNTER.captures(c))
        && let Some(total) = caps.get(2).and_then(|m| m.as_str().parse().ok())
    {
        return Some(total);
    }
    let pages = snapshot
        .elements_matching(snapshot.body(), |el| el.has_class("page"))
        .count();
    (pages > 0).then_some(pages)
}
