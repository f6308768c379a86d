//! Property-based invariant tests for readable-text extraction.
//!
//! 1. Extraction is deterministic: same snapshot, byte-identical output
//! 2. Output is trimmed
//! 3. Output never holds two adjacent horizontal whitespace characters
//! 4. No horizontal whitespace touches a newline
//! 5. Text inside hidden or excluded subtrees never leaks into the output
//! 6. `normalize` never lengthens its input

use proptest::prelude::*;
use readalong_dom::extract::{extract_text, normalize};
use readalong_dom::node::{ComputedStyle, ElementData};
use readalong_dom::snapshot::DomSnapshot;

// ── Helpers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Open { tag: &'static str, hidden: bool },
    Text(String),
    Close,
}

const TAGS: &[&str] = &["p", "div", "span", "em", "li", "h2", "br", "nav", "script", "td"];

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (prop::sample::select(TAGS), prop::bool::weighted(0.15))
            .prop_map(|(tag, hidden)| Op::Open { tag, hidden }),
        "[a-z \t\n]{0,12}".prop_map(Op::Text),
        Just(Op::Close),
    ]
}

/// Build a snapshot; text under hidden or excluded elements is tagged `ZZ`.
fn build(ops: &[Op]) -> DomSnapshot {
    let mut b = DomSnapshot::builder();
    let mut concealed: Vec<bool> = Vec::new();
    for op in ops {
        match op {
            Op::Open { tag, hidden } => {
                let style = if *hidden {
                    ComputedStyle::DISPLAY_NONE
                } else {
                    ComputedStyle::VISIBLE
                };
                let parent_concealed = concealed.last().copied().unwrap_or(false);
                let excluded = matches!(*tag, "nav" | "script");
                concealed.push(parent_concealed || *hidden || excluded);
                b.open(ElementData::new(*tag).with_style(style));
            }
            Op::Text(text) => {
                if concealed.last().copied().unwrap_or(false) {
                    b.text(format!("ZZ{text}"));
                } else {
                    b.text(text.clone());
                }
            }
            Op::Close => {
                concealed.pop();
                b.close();
            }
        }
    }
    b.finish()
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 0..40)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Determinism
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn extraction_is_deterministic(ops in ops_strategy()) {
        let snapshot = build(&ops);
        let first = extract_text(&snapshot, snapshot.body());
        let second = extract_text(&snapshot, snapshot.body());
        let rebuilt = build(&ops);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, extract_text(&rebuilt, rebuilt.body()));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2-4. Whitespace shape
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn output_whitespace_is_normalized(ops in ops_strategy()) {
        let snapshot = build(&ops);
        let text = extract_text(&snapshot, snapshot.body());
        prop_assert_eq!(text.trim(), text.as_str());
        let chars: Vec<char> = text.chars().collect();
        for pair in chars.windows(2) {
            let horizontal = |c: char| c.is_ascii_whitespace() && c != '\n';
            prop_assert!(
                !(horizontal(pair[0]) && horizontal(pair[1])),
                "double horizontal whitespace in {:?}", text
            );
            let padded_newline = (pair[0] == '\n' && horizontal(pair[1]))
                || (horizontal(pair[0]) && pair[1] == '\n');
            prop_assert!(!padded_newline, "whitespace beside newline in {:?}", text);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Concealed text never leaks
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn concealed_text_never_leaks(ops in ops_strategy()) {
        let snapshot = build(&ops);
        let text = extract_text(&snapshot, snapshot.body());
        prop_assert!(!text.contains("ZZ"), "concealed text leaked: {:?}", text);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. normalize only shrinks
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn normalize_never_lengthens(raw in "[a-c \t\n]{0,40}") {
        let once = normalize(&raw);
        prop_assert!(once.len() <= raw.len());
        prop_assert!(!once.contains("  "), "double space in {:?}", once);
    }
}
