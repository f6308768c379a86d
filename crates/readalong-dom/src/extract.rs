#![forbid(unsafe_code)]

//! Readable-text extraction.
//!
//! The extractor linearizes the visible text of a subtree and marks the end
//! of every block-level element with a paragraph break. A cleanup pass then
//! turns breaks into newlines and normalizes whitespace:
//!
//! 1. a break and the whitespace around it become one `\n`,
//! 2. runs of two or more horizontal whitespace characters become one space,
//! 3. runs of newlines collapse to one,
//! 4. horizontal whitespace next to a newline is removed,
//! 5. the result is trimmed.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::node::NodeId;
use crate::snapshot::{DomSnapshot, WalkStep};

static HORIZONTAL_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]{2,}").expect("horizontal whitespace regex"));
static NEWLINE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("newline run regex"));
static NEWLINE_PADDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]*\n[^\S\n]*").expect("newline padding regex"));

/// Where the readable text of a page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    /// The walk over the main content region (or body) produced text.
    Structured,
    /// The walk yielded only whitespace; the raw body text was used.
    BodyTextFallback,
}

/// Result of [`extract_readable_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub source: ExtractionSource,
}

#[derive(Debug, Clone, Copy)]
enum Chunk<'a> {
    Text(&'a str),
    Break,
}

/// Extract normalized readable text from the subtree below `root`.
#[must_use]
pub fn extract_text(snapshot: &DomSnapshot, root: NodeId) -> String {
    let mut chunks = Vec::new();
    let mut break_pending = false;
    for step in snapshot.walk_visible(root) {
        match step {
            WalkStep::Text(_, text) => {
                chunks.push(Chunk::Text(text));
                break_pending = false;
            }
            WalkStep::Leave(_, el) if el.is_block() && !break_pending => {
                chunks.push(Chunk::Break);
                break_pending = true;
            }
            WalkStep::Enter(..) | WalkStep::Leave(..) => {}
        }
    }
    let raw = join_chunks(&chunks);
    tracing::debug!(chunks = chunks.len(), raw_len = raw.len(), "collected raw text");
    normalize(&raw)
}

/// Extract the page's readable text from its main content region.
///
/// Falls back to the raw text content of the body when the structured walk
/// yields nothing but whitespace.
#[must_use]
pub fn extract_readable_text(snapshot: &DomSnapshot) -> Extraction {
    let root = snapshot.main_content();
    let text = extract_text(snapshot, root);
    if !text.trim().is_empty() {
        return Extraction {
            text,
            source: ExtractionSource::Structured,
        };
    }
    tracing::debug!("structured extraction empty, using body text");
    Extraction {
        text: snapshot.text_content(snapshot.body()).trim().to_owned(),
        source: ExtractionSource::BodyTextFallback,
    }
}

fn join_chunks(chunks: &[Chunk<'_>]) -> String {
    let mut out = String::new();
    let mut after_break = false;
    for chunk in chunks {
        match *chunk {
            Chunk::Text(text) => {
                if after_break {
                    out.push_str(text.trim_start());
                } else {
                    out.push_str(text);
                }
                after_break = false;
            }
            Chunk::Break => {
                out.truncate(out.trim_end().len());
                out.push('\n');
                after_break = true;
            }
        }
    }
    out
}

/// Apply the whitespace cleanup steps 2 to 5 to already-joined text.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let text = HORIZONTAL_RUN.replace_all(raw, " ");
    let text = NEWLINE_RUN.replace_all(&text, "\n");
    let text = NEWLINE_PADDING.replace_all(&text, "\n");
    text.trim().to_owned()
}
