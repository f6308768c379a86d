#![forbid(unsafe_code)]

//! User preferences and playback tuning.
//!
//! [`Preferences`] is the persisted, user-editable part; it round-trips
//! through JSON with the same camelCase keys the extension storage uses.
//! [`PlaybackConfig`] holds the limits the controller enforces.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Speeds listed in the control bar's selector.
pub const RATE_PRESETS: [f32; 7] = [0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

const fn default_speech_param() -> f32 {
    1.0
}

/// Persisted reading preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub voice_name: Option<String>,
    #[serde(default = "default_speech_param")]
    pub speech_rate: f32,
    #[serde(default = "default_speech_param")]
    pub speech_pitch: f32,
    #[serde(default)]
    pub autoplay: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            voice_name: None,
            speech_rate: default_speech_param(),
            speech_pitch: default_speech_param(),
            autoplay: false,
        }
    }
}

impl Preferences {
    /// Parse stored JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, PreferencesError> {
        serde_json::from_str(json).map_err(|e| PreferencesError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, PreferencesError> {
        serde_json::to_string(self).map_err(|e| PreferencesError::Malformed(e.to_string()))
    }
}

/// Failure to read or write preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferencesError {
    /// Stored data is not valid preferences JSON.
    Malformed(String),
    /// The backing store failed.
    Storage(String),
}

impl core::fmt::Display for PreferencesError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed preferences: {msg}"),
            Self::Storage(msg) => write!(f, "preference storage failed: {msg}"),
        }
    }
}

impl std::error::Error for PreferencesError {}

/// Controller limits and timings.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// Delay between natural end and hiding the highlight and controls.
    pub end_grace: Duration,
    pub min_rate: f32,
    pub max_rate: f32,
    pub min_pitch: f32,
    pub max_pitch: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            end_grace: Duration::from_millis(2000),
            min_rate: 0.1,
            max_rate: 10.0,
            min_pitch: 0.0,
            max_pitch: 2.0,
        }
    }
}

impl PlaybackConfig {
    #[must_use]
    pub fn with_end_grace(mut self, end_grace: Duration) -> Self {
        self.end_grace = end_grace;
        self
    }

    /// Clamp a requested rate; `None` for NaN or infinities.
    #[must_use]
    pub fn sanitize_rate(&self, rate: f32) -> Option<f32> {
        rate
            .is_finite()
            .then(|| rate.clamp(self.min_rate, self.max_rate))
    }

    /// Clamp a requested pitch; `None` for NaN or infinities.
    #[must_use]
    pub fn sanitize_pitch(&self, pitch: f32) -> Option<f32> {
        pitch
            .is_finite()
            .then(|| pitch.clamp(self.min_pitch, self.max_pitch))
    }
}
