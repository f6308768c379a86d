#![forbid(unsafe_code)]

//! The seam to the host's speech synthesizer.
//!
//! Speech engines are callback driven. The runtime never blocks on them:
//! it issues a [`UtteranceRequest`] tagged with a [`Generation`], and the
//! host later feeds the engine's callbacks back as [`EngineEvent`]s carrying
//! the generation they were issued under. Any request (including a restart
//! after a rate change) bumps the generation, so callbacks from a cancelled
//! utterance can always be recognized and dropped.

use crate::voice::{Voice, VoiceRef};

/// Monotonic identifier of one engine request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl core::fmt::Display for Generation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Approximate word boundary reported while speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryEvent {
    pub generation: Generation,
    /// UTF-16 offset into the text of the request that produced the event.
    pub offset: u32,
    /// Reported length of the spoken token, when the engine provides one.
    pub length: Option<u32>,
}

/// Callback delivered by the engine for some request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Boundary(BoundaryEvent),
    /// The utterance finished naturally.
    End { generation: Generation },
    /// The engine gave up on the utterance.
    Error {
        generation: Generation,
        message: String,
    },
}

impl EngineEvent {
    /// Generation the event belongs to.
    #[must_use]
    pub const fn generation(&self) -> Generation {
        match self {
            Self::Boundary(b) => b.generation,
            Self::End { generation } | Self::Error { generation, .. } => *generation,
        }
    }
}

/// One utterance to speak.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    pub generation: Generation,
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub voice: Option<VoiceRef>,
}

/// Engine-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No speech synthesizer is available in this context.
    Unavailable,
    /// The host refused to speak (autoplay policy, permissions, ...).
    Rejected(String),
}

impl core::fmt::Display for EngineError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "speech synthesis unavailable"),
            Self::Rejected(msg) => write!(f, "speech rejected: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

/// Host speech synthesizer.
///
/// `speak` must cancel whatever the engine was doing before. Events for the
/// request are delivered later through the host, never re-entrantly from
/// inside these calls.
pub trait SpeechEngine {
    fn speak(&mut self, request: UtteranceRequest) -> Result<(), EngineError>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Drop the current utterance. Idempotent.
    fn cancel(&mut self);

    /// Current voice catalog.
    fn voices(&self) -> Vec<Voice>;

    /// Change pitch of the utterance in flight.
    ///
    /// Returns `false` when the engine cannot do this, in which case the
    /// caller restarts the utterance.
    fn apply_live_pitch(&mut self, pitch: f32) -> bool {
        let _ = pitch;
        false
    }
}

impl<E: SpeechEngine + ?Sized> SpeechEngine for Box<E> {
    fn speak(&mut self, request: UtteranceRequest) -> Result<(), EngineError> {
        (**self).speak(request)
    }

    fn pause(&mut self) {
        (**self).pause();
    }

    fn resume(&mut self) {
        (**self).resume();
    }

    fn cancel(&mut self) {
        (**self).cancel();
    }

    fn voices(&self) -> Vec<Voice> {
        (**self).voices()
    }

    fn apply_live_pitch(&mut self, pitch: f32) -> bool {
        (**self).apply_live_pitch(pitch)
    }
}
