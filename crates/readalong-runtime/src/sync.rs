#![forbid(unsafe_code)]

//! Boundary-event mapping and highlight refresh.

use readalong_dom::geometry::{Rect, Viewport};
use readalong_text::locate::PositionTable;
use readalong_text::segment::Word;

/// The page-side presentation: one highlight box and one control surface.
///
/// All calls are idempotent.
pub trait HighlightSurface {
    /// Move the highlight to a document-relative rect and show it.
    fn show_highlight(&mut self, rect: Rect);

    fn hide_highlight(&mut self);

    fn viewport(&self) -> Viewport;

    /// Smoothly scroll the document to vertical offset `top`.
    fn scroll_to(&mut self, top: f64);

    fn set_controls_visible(&mut self, visible: bool);
}

impl<S: HighlightSurface + ?Sized> HighlightSurface for Box<S> {
    fn show_highlight(&mut self, rect: Rect) {
        (**self).show_highlight(rect);
    }

    fn hide_highlight(&mut self) {
        (**self).hide_highlight();
    }

    fn viewport(&self) -> Viewport {
        (**self).viewport()
    }

    fn scroll_to(&mut self, top: f64) {
        (**self).scroll_to(top);
    }

    fn set_controls_visible(&mut self, visible: bool) {
        (**self).set_controls_visible(visible);
    }
}

/// Word whose range contains `offset`.
///
/// Each event is resolved on its own, with no assumption that offsets
/// increase. Words are contiguous with one separator unit between them, so
/// a binary search over their ranges gives the same answer as accumulating
/// `len + 1` per word until the running total passes `offset`. Offsets on a
/// separator or past the last word map to nothing.
#[must_use]
pub fn word_index_at(words: &[Word], offset: u32) -> Option<usize> {
    let index = words.partition_point(|w| w.char_end <= offset);
    words
        .get(index)
        .filter(|w| w.contains_offset(offset))
        .map(|w| w.index)
}

/// What a highlight refresh did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HighlightOutcome {
    /// The highlight moved; `scrolled_to` is set when the page scrolled.
    Shown { rect: Rect, scrolled_to: Option<f64> },
    /// The word has no position; the surface was left untouched.
    Unlocated,
}

/// Move the highlight to word `index`, scrolling it into the middle of the
/// viewport when it is outside the visible band.
pub fn refresh_highlight(
    surface: &mut impl HighlightSurface,
    positions: &PositionTable,
    index: usize,
) -> HighlightOutcome {
    let Some(position) = positions.get(index) else {
        return HighlightOutcome::Unlocated;
    };
    let rect = position.bounding_box;
    surface.show_highlight(rect);
    let viewport = surface.viewport();
    let scrolled_to = (!viewport.shows_vertically(&rect)).then(|| {
        let top = viewport.centered_scroll_top(&rect);
        surface.scroll_to(top);
        top
    });
    HighlightOutcome::Shown { rect, scrolled_to }
}
