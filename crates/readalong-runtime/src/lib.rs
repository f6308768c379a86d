#![forbid(unsafe_code)]

//! `readalong-runtime` keeps a moving word highlight in step with speech.
//!
//! Design goals:
//! - **Host-driven**: the embedding page pushes engine callbacks and clock
//!   ticks; nothing here blocks, spawns or sleeps.
//! - **Generation tagged**: every engine request carries a [`Generation`];
//!   callbacks from a superseded request are dropped, never applied.
//! - **One session**: the [`PlaybackController`] owns the only
//!   [`PlaybackSession`] and starting a new one always stops the old one.

pub mod config;
pub mod controller;
pub mod engine;
pub mod session;
pub mod sync;
pub mod voice;

pub use config::{PlaybackConfig, Preferences, PreferencesError, RATE_PRESETS};
pub use controller::{EventOutcome, PlaybackController, StartError};
pub use engine::{
    BoundaryEvent, EngineError, EngineEvent, Generation, SpeechEngine, UtteranceRequest,
};
pub use session::{PlaybackSession, PlaybackState};
pub use sync::{HighlightOutcome, HighlightSurface, refresh_highlight, word_index_at};
pub use voice::{Voice, VoiceRef, default_voice, resolve_voice};
