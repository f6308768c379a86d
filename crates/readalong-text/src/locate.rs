#![forbid(unsafe_code)]

//! Mapping spoken words back to their rendered position on the page.
//!
//! The spoken text and the DOM rarely tokenize identically: entities, inline
//! markup inside a word and user selections spanning nodes all shift things.
//! Location therefore re-walks every readable text node in document order
//! and advances a single cursor over the word table, accepting a node token
//! when its alphanumeric core contains the expected word's core. A token that
//! does not match is skipped; the cursor never moves backwards.
//!
//! This is a best-effort heuristic. On pages with many repeated short words
//! the cursor can lock onto an earlier occurrence than the one being read,
//! and words it never reaches simply have no position.

use std::ops::Range;

use readalong_dom::geometry::{LayoutOracle, Rect};
use readalong_dom::snapshot::DomSnapshot;

use crate::segment::Word;

/// Document-relative bounding box of one located word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WordPosition {
    pub word_index: usize,
    /// Scroll-compensated, document coordinates.
    pub bounding_box: Rect,
}

/// Index-aligned table of optional word positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionTable {
    slots: Vec<Option<WordPosition>>,
}

impl PositionTable {
    /// A table for `len` words with nothing located.
    #[must_use]
    pub fn unlocated(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Position of word `index`, if it was located.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&WordPosition> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Number of word slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of words that have a position.
    #[must_use]
    pub fn located(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WordPosition> {
        self.slots.iter().flatten()
    }

    fn set(&mut self, position: WordPosition) {
        if let Some(slot) = self.slots.get_mut(position.word_index) {
            *slot = Some(position);
        }
    }
}

/// Whether a DOM token can stand for the expected spoken word.
///
/// Both sides are reduced to their alphanumeric core (leading and trailing
/// punctuation removed) and the candidate core must contain the expected
/// core. Punctuation-only words fall back to raw containment.
#[must_use]
pub fn matches_expected(candidate: &str, expected: &str) -> bool {
    let expected_core = alphanumeric_core(expected);
    if expected_core.is_empty() {
        return candidate.contains(expected);
    }
    alphanumeric_core(candidate).contains(expected_core)
}

fn alphanumeric_core(s: &str) -> &str {
    s.trim_matches(|c: char| !c.is_alphanumeric())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate<'a> {
    text: &'a str,
    units: Range<u32>,
}

/// Whitespace tokens of a text node with their UTF-16 ranges.
fn candidates(text: &str) -> Vec<Candidate<'_>> {
    let mut out = Vec::new();
    let mut unit: u32 = 0;
    let mut open: Option<(usize, u32)> = None;
    for (byte, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some((start, start_unit)) = open.take() {
                out.push(Candidate {
                    text: &text[start..byte],
                    units: start_unit..unit,
                });
            }
        } else if open.is_none() {
            open = Some((byte, unit));
        }
        unit += ch.len_utf16() as u32;
    }
    if let Some((start, start_unit)) = open {
        out.push(Candidate {
            text: &text[start..],
            units: start_unit..unit,
        });
    }
    out
}

/// Locate each word of `words` among the readable text nodes of the page.
///
/// Words that are never reached, or whose range has no rendered box, have
/// no entry in the returned table.
#[must_use]
pub fn locate_words(
    words: &[Word],
    snapshot: &DomSnapshot,
    layout: &impl LayoutOracle,
) -> PositionTable {
    let mut table = PositionTable::unlocated(words.len());
    if words.is_empty() {
        return table;
    }
    let viewport = layout.viewport();
    let mut cursor = 0usize;

    'nodes: for node in snapshot.visible_text_nodes(snapshot.body()) {
        let Some(text) = snapshot.text(node) else {
            continue;
        };
        for candidate in candidates(text) {
            let Some(expected) = words.get(cursor) else {
                break 'nodes;
            };
            if !matches_expected(candidate.text, &expected.text) {
                continue;
            }
            if let Some(client) = layout.text_rect(node, candidate.units) {
                table.set(WordPosition {
                    word_index: cursor,
                    bounding_box: viewport.to_document(client),
                });
            }
            cursor += 1;
        }
    }

    tracing::debug!(
        words = words.len(),
        matched = cursor,
        located = table.located(),
        "located words on page"
    );
    table
}
