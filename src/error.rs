//! Error types for the parley pipeline

use std::time::Duration;

use thiserror::Error;

/// Result type alias for parley operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the translation and cloning pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// A capability provider reported it is not ready to serve requests
    #[error("backend not ready: {0}")]
    BackendNotReady(String),

    /// Model weights missing at the requested path
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// Model weights present but the session could not be created
    #[error("model load failed: {0}")]
    ModelLoadFailed(String),

    /// Audio could not be read or decoded
    #[error("audio load failed: {0}")]
    AudioLoadFailed(String),

    /// Speaker embedding could not be extracted from a sample
    #[error("embedding extraction failed: {0}")]
    EmbeddingExtractionFailed(String),

    /// Embeddings are empty or disagree in length
    #[error("malformed embedding: {0}")]
    MalformedEmbedding(String),

    /// Voice profile not found
    #[error("voice profile not found: {0}")]
    ProfileNotFound(String),

    /// Voice synthesis failed
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Every translation backend failed or was unavailable
    #[error("translation unavailable: {0}")]
    TranslationUnavailable(String),

    /// Source language could not be detected and no fallback is configured
    #[error("language detection failed: {0}")]
    LanguageDetection(String),

    /// Operation was cancelled before it completed
    #[error("operation cancelled")]
    Cancelled,

    /// Synthesis queue is at capacity
    #[error("synthesis queue full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity
        capacity: usize,
    },

    /// Backend call exceeded its deadline
    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout {
        /// Operation that timed out
        operation: &'static str,
        /// Deadline that was exceeded
        after: Duration,
    },

    /// Call session lifecycle violation
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or processing error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Reclassify an error raised while synthesizing into the synthesis taxonomy
    ///
    /// Errors that already carry a pipeline meaning pass through untouched
    #[must_use]
    pub fn into_synthesis(self) -> Self {
        match self {
            e @ (Self::BackendNotReady(_)
            | Self::ProfileNotFound(_)
            | Self::Cancelled
            | Self::QueueFull { .. }
            | Self::SynthesisFailed(_)
            | Self::ModelNotFound(_)
            | Self::ModelLoadFailed(_)) => e,
            other => Self::SynthesisFailed(other.to_string()),
        }
    }

    /// Whether this error is a cancellation
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
