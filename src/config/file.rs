//! TOML configuration file loading
//!
//! Supports `~/.config/parley/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfigFile {
    /// On-device inference engine
    #[serde(default)]
    pub engine: EngineFileConfig,

    /// Translation chain
    #[serde(default)]
    pub translation: TranslationFileConfig,

    /// Remote speech-to-text for the fallback chain
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Stock text-to-speech voice
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Cloned-voice synthesis queue
    #[serde(default)]
    pub synthesis: SynthesisFileConfig,

    /// Live call defaults
    #[serde(default)]
    pub session: SessionFileConfig,

    /// HTTP control API
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Inference engine configuration
#[derive(Debug, Default, Deserialize)]
pub struct EngineFileConfig {
    /// Base URL of the local inference sidecar
    pub sidecar_url: Option<String>,

    /// Speech translation model weights
    pub speech_model_path: Option<String>,

    /// Voice cloning model weights
    pub voice_model_path: Option<String>,

    /// Deadline for each backend call, in milliseconds
    pub timeout_ms: Option<u64>,
}

/// Translation chain configuration
#[derive(Debug, Default, Deserialize)]
pub struct TranslationFileConfig {
    pub libretranslate_url: Option<String>,
    pub libretranslate_key: Option<String>,

    /// Outbound request budget for LibreTranslate
    pub libretranslate_rpm: Option<u32>,

    pub google_key: Option<String>,

    pub max_audio_secs: Option<f64>,
    pub max_text_chars: Option<usize>,
    pub history_limit: Option<usize>,

    /// Language assumed when `auto` detection fails (`en` when unset); `strict` fails instead
    pub detection_fallback: Option<String>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// "whisper" or "deepgram"
    pub provider: Option<String>,
    pub api_key: Option<String>,

    /// Model identifier (e.g. "whisper-1")
    pub model: Option<String>,
}

/// Text-to-speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// "openai" or "elevenlabs"
    pub provider: Option<String>,
    pub api_key: Option<String>,

    /// Voice identifier (e.g. "alloy")
    pub voice: Option<String>,

    /// Speed multiplier
    pub speed: Option<f32>,

    /// Model identifier (e.g. "tts-1")
    pub model: Option<String>,
}

/// Synthesis queue configuration
#[derive(Debug, Default, Deserialize)]
pub struct SynthesisFileConfig {
    pub queue_capacity: Option<usize>,

    /// "drop_oldest" or "reject_new"
    pub overflow: Option<String>,
}

/// Live call configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    pub cadence_ms: Option<u64>,
    pub capture_ms: Option<u64>,
    pub source_language: Option<String>,
    pub target_language: Option<String>,
    pub preserve_voice: Option<bool>,

    /// "active_profile", "profile", or "sample"
    pub clone_mode: Option<String>,

    /// Profile used when `clone_mode = "profile"`
    pub profile_id: Option<String>,
}

/// Server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ParleyConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ParleyConfigFile {
    let Some(path) = config_file_path() else {
        return ParleyConfigFile::default();
    };

    if !path.exists() {
        return ParleyConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ParleyConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ParleyConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/parley/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}
