#![forbid(unsafe_code)]

//! Voice catalog lookups.

use serde::{Deserialize, Serialize};

/// One entry of the host's voice catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    pub lang: String,
    #[serde(default)]
    pub default: bool,
}

impl Voice {
    #[must_use]
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            default: false,
        }
    }

    /// Reference to this voice.
    #[must_use]
    pub fn to_ref(&self) -> VoiceRef {
        VoiceRef {
            name: self.name.clone(),
            lang: self.lang.clone(),
        }
    }
}

/// Name and language of a voice, resolved against the catalog on use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoiceRef {
    pub name: String,
    pub lang: String,
}

/// Exact-name lookup.
#[must_use]
pub fn resolve_voice<'a>(catalog: &'a [Voice], name: &str) -> Option<&'a Voice> {
    catalog.iter().find(|v| v.name == name)
}

/// First English voice, else the first voice.
#[must_use]
pub fn default_voice(catalog: &[Voice]) -> Option<&Voice> {
    catalog
        .iter()
        .find(|v| v.lang.contains("en"))
        .or_else(|| catalog.first())
}
