//! Voice selection passed to the synthesis provider

use serde::{Deserialize, Serialize};

/// Which voice a session speaks with, and which provider serves it.
///
/// Devices without an explicit voice assignment fall back to the default;
/// the provider id is opaque to the pipeline and only routed through to the
/// synthesis collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Provider-side voice name.
    pub voice: String,
    /// Synthesis provider identifier, `None` for the default provider.
    pub provider: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice: "default".to_string(),
            provider: None,
        }
    }
}

impl VoiceConfig {
    pub fn named(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            provider: None,
        }
    }
}
