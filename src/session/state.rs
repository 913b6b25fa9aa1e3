//! Call state machine

use serde::Serialize;

/// What an active call is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivePhase {
    Listening,
    Translating,
    Speaking,
}

/// Lifecycle of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "phase")]
pub enum CallState {
    Idle,
    Connecting,
    Active(ActivePhase),
    Stopped,
}

impl CallState {
    /// Whether the call is up
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active(_))
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Connecting => f.write_str("connecting"),
            Self::Active(ActivePhase::Listening) => f.write_str("active(listening)"),
            Self::Active(ActivePhase::Translating) => f.write_str("active(translating)"),
            Self::Active(ActivePhase::Speaking) => f.write_str("active(speaking)"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}
