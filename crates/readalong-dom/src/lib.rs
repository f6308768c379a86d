#![forbid(unsafe_code)]

//! `readalong-dom` turns a captured page into readable text.
//!
//! - [`snapshot`]: an immutable arena copy of the page DOM, built by the host.
//! - [`extract`]: visible-text linearization with paragraph breaks.
//! - [`geometry`]: rectangles, viewport and the [`LayoutOracle`] query seam.
//! - [`pdf`]: text-layer reading for in-browser PDF viewers.
//!
//! Nothing here talks to a browser. Given the same snapshot, every function
//! returns the same result.

pub mod extract;
pub mod geometry;
pub mod node;
pub mod pdf;
pub mod snapshot;

pub use extract::{Extraction, ExtractionSource, extract_readable_text, extract_text};
pub use geometry::{FixedAdvanceLayout, LayoutOracle, Rect, Viewport};
pub use node::{ComputedStyle, ElementData, NodeId, NodeKind};
pub use snapshot::{DomSnapshot, SnapshotBuilder, WalkStep};
