#![forbid(unsafe_code)]

//! Rectangles, viewport state and the layout query seam.
//!
//! The snapshot carries no geometry. Rendered positions are asked for lazily
//! through [`LayoutOracle`], which a browser host answers with
//! `Range.getBoundingClientRect()` and tests answer with
//! [`FixedAdvanceLayout`].

use std::collections::HashMap;
use std::ops::Range;

use crate::node::NodeId;

/// Axis-aligned rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Shift by `(dx, dy)`.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            top: self.top + dy,
            left: self.left + dx,
            ..self
        }
    }
}

/// Scroll offsets and visible size of the document window.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    #[must_use]
    pub const fn new(scroll_x: f64, scroll_y: f64, width: f64, height: f64) -> Self {
        Self {
            scroll_x,
            scroll_y,
            width,
            height,
        }
    }

    /// Convert a viewport-relative rect to document coordinates.
    #[must_use]
    pub fn to_document(&self, client: Rect) -> Rect {
        client.offset(self.scroll_x, self.scroll_y)
    }

    /// Whether a document-relative rect lies fully inside the visible band.
    #[must_use]
    pub fn shows_vertically(&self, rect: &Rect) -> bool {
        rect.top >= self.scroll_y && rect.bottom() <= self.scroll_y + self.height
    }

    /// Scroll offset that vertically centers a document-relative rect.
    #[must_use]
    pub fn centered_scroll_top(&self, rect: &Rect) -> f64 {
        (rect.top + rect.height / 2.0 - self.height / 2.0).max(0.0)
    }
}

/// Geometry queries against the rendered page.
pub trait LayoutOracle {
    /// Viewport-relative bounding box of a text node range.
    ///
    /// `range` is in UTF-16 code units, like DOM `Range` offsets. Returns
    /// `None` when the node is not rendered or the range is out of bounds.
    fn text_rect(&self, node: NodeId, range: Range<u32>) -> Option<Rect>;

    /// Current scroll offsets and window size.
    fn viewport(&self) -> Viewport;
}

impl<T: LayoutOracle + ?Sized> LayoutOracle for &T {
    fn text_rect(&self, node: NodeId, range: Range<u32>) -> Option<Rect> {
        (**self).text_rect(node, range)
    }

    fn viewport(&self) -> Viewport {
        (**self).viewport()
    }
}

/// Monospace single-line layout: every placed text node starts at a fixed
/// document position and each UTF-16 unit advances by the same width.
#[derive(Debug, Clone)]
pub struct FixedAdvanceLayout {
    origins: HashMap<NodeId, (f64, f64)>,
    advance: f64,
    line_height: f64,
    viewport: Viewport,
}

impl FixedAdvanceLayout {
    /// 8px advance, 16px line height, 1024x768 window at the top of the page.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origins: HashMap::new(),
            advance: 8.0,
            line_height: 16.0,
            viewport: Viewport::new(0.0, 0.0, 1024.0, 768.0),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, advance: f64, line_height: f64) -> Self {
        self.advance = advance;
        self.line_height = line_height;
        self
    }

    #[must_use]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Render `node` with its first unit at document position `(left, top)`.
    pub fn place(&mut self, node: NodeId, left: f64, top: f64) {
        self.origins.insert(node, (left, top));
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }
}

impl Default for FixedAdvanceLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutOracle for FixedAdvanceLayout {
    fn text_rect(&self, node: NodeId, range: Range<u32>) -> Option<Rect> {
        let &(left, top) = self.origins.get(&node)?;
        if range.end < range.start {
            return None;
        }
        let doc = Rect::new(
            top,
            left + f64::from(range.start) * self.advance,
            f64::from(range.end - range.start) * self.advance,
            self.line_height,
        );
        Some(doc.offset(-self.viewport.scroll_x, -self.viewport.scroll_y))
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }
}
