#![forbid(unsafe_code)]

//! Word tables for spoken text and their positions on the page.
//!
//! - [`segment`]: whitespace segmentation with UTF-16 offsets matching the
//!   speech engine's boundary events.
//! - [`locate`]: cursor-based matching of spoken words to rendered text nodes.

pub mod locate;
pub mod segment;

pub use locate::{PositionTable, WordPosition, locate_words, matches_expected};
pub use segment::{SpeechText, Word, segment_words};
