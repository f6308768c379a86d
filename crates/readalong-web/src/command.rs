#![forbid(unsafe_code)]

//! JSON command surface spoken by the popup and the background page.
//!
//! Requests are `{"action": "<name>", ...}` objects; responses are the
//! small camelCase objects the popup expects.

use serde::{Deserialize, Deserializer, Serialize};

use readalong_runtime::voice::Voice;

/// A parsed request.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetState,
    GetVoices,
    /// Read explicit text, else the selection, else the page.
    Start { text: Option<String> },
    Stop,
    Pause,
    Resume,
    SetVoice { voice_name: String },
    SetRate { rate: f32 },
    SetPitch { pitch: f32 },
    /// Context-menu "read this"; ignored without text.
    ReadSelectedText { selected_text: Option<String> },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum RawCommand {
    GetState,
    GetVoices,
    Start {
        #[serde(default)]
        text: Option<String>,
    },
    Stop,
    Pause,
    Resume,
    SetVoice {
        #[serde(rename = "voiceName")]
        voice_name: String,
    },
    SetRate {
        #[serde(deserialize_with = "lenient_f32")]
        rate: f32,
    },
    SetPitch {
        #[serde(deserialize_with = "lenient_f32")]
        pitch: f32,
    },
    ReadSelectedText {
        #[serde(default, rename = "selectedText")]
        selected_text: Option<String>,
    },
}

impl From<RawCommand> for Command {
    fn from(raw: RawCommand) -> Self {
        match raw {
            RawCommand::GetState => Self::GetState,
            RawCommand::GetVoices => Self::GetVoices,
            RawCommand::Start { text } => Self::Start { text },
            RawCommand::Stop => Self::Stop,
            RawCommand::Pause => Self::Pause,
            RawCommand::Resume => Self::Resume,
            RawCommand::SetVoice { voice_name } => Self::SetVoice { voice_name },
            RawCommand::SetRate { rate } => Self::SetRate { rate },
            RawCommand::SetPitch { pitch } => Self::SetPitch { pitch },
            RawCommand::ReadSelectedText { selected_text } => {
                Self::ReadSelectedText { selected_text }
            }
        }
    }
}

/// Slider values arrive as numbers or as numeric strings.
fn lenient_f32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f32),
        String(String),
    }
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl Command {
    /// Parse a JSON request.
    pub fn from_json(json: &str) -> Result<Self, CommandParseError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| CommandParseError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse an already-decoded request object.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CommandParseError> {
        let action = match value.get("action") {
            Some(serde_json::Value::String(action)) => action.clone(),
            Some(_) | None => return Err(CommandParseError::MissingAction),
        };
        if !KNOWN_ACTIONS.contains(&action.as_str()) {
            return Err(CommandParseError::UnknownAction(action));
        }
        serde_json::from_value::<RawCommand>(value)
            .map(Self::from)
            .map_err(|e| CommandParseError::InvalidField {
                action,
                message: e.to_string(),
            })
    }
}

const KNOWN_ACTIONS: &[&str] = &[
    "getState",
    "getVoices",
    "start",
    "stop",
    "pause",
    "resume",
    "setVoice",
    "setRate",
    "setPitch",
    "readSelectedText",
];

/// Why a request could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    /// Not JSON.
    Malformed(String),
    /// No string `action` key.
    MissingAction,
    UnknownAction(String),
    /// A known action with missing or mistyped fields.
    InvalidField { action: String, message: String },
}

impl core::fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed(msg) => write!(f, "malformed command: {msg}"),
            Self::MissingAction => write!(f, "command has no action"),
            Self::UnknownAction(action) => write!(f, "unknown action: {action}"),
            Self::InvalidField { action, message } => {
                write!(f, "invalid {action} command: {message}")
            }
        }
    }
}

impl std::error::Error for CommandParseError {}

/// `getState` reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub is_playing: bool,
    pub speech_rate: f32,
    pub speech_pitch: f32,
    pub selected_voice_name: Option<String>,
}

/// Generic `{success, message?}` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Ack {
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub const fn from_bool(success: bool) -> Self {
        Self {
            success,
            message: None,
        }
    }
}

/// Reply to one command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    State(StateSnapshot),
    Voices { voices: Vec<Voice> },
    Ack(Ack),
    /// `readSelectedText` sends nothing back.
    None,
}

impl Response {
    /// JSON text of the reply; `None` for commands without one.
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        match self {
            Self::None => None,
            other => serde_json::to_string(other).ok(),
        }
    }
}
