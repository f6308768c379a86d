#![forbid(unsafe_code)]

//! `readalong-web` is the content script of the ReadAlong extension.
//!
//! - [`command`]: the JSON messages exchanged with the popup and background
//!   page, and their replies.
//! - [`host`]: [`host::ContentHost`], which resolves what to read and routes
//!   commands, engine callbacks and clock ticks into the playback controller.
//! - `wasm` (wasm32 only): the `ReadAlong` export binding all of it to the
//!   live document, `speechSynthesis` and `localStorage`.

pub mod command;
pub mod host;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::ReadAlong;

pub use command::{Ack, Command, CommandParseError, Response, StateSnapshot};
pub use host::{
    ContentHost, ControlAction, MemoryPreferenceStore, Page, PageCapture, PreferenceStore,
    TextSource,
};
