//! Configuration management for parley

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::session::{CloneMode, SessionConfig};
use crate::translation::{DetectionFallback, SttProvider, TranslatorSettings};
use crate::voice::{OverflowPolicy, TtsProvider};
use crate::{Error, Result};
use file::ParleyConfigFile;

/// Where the inference sidecar listens unless configured otherwise
pub const DEFAULT_SIDECAR_URL: &str = "http://127.0.0.1:7790/";

/// Parley configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (profiles, temp audio)
    pub data_dir: PathBuf,

    /// On-device inference engine
    pub engine: EngineConfig,

    /// Translation chain
    pub translation: TranslationConfig,

    /// Remote transcription, when a key is available
    pub stt: Option<SttConfig>,

    /// Stock TTS voice, when a key is available
    pub tts: Option<TtsConfig>,

    /// Cloned-voice synthesis queue
    pub synthesis: SynthesisConfig,

    /// Defaults for new call sessions
    pub session: SessionDefaults,

    /// HTTP control API
    pub server: ServerConfig,
}

/// Inference engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Local inference sidecar serving both model sessions
    pub sidecar_url: Url,
    pub speech_model_path: Option<PathBuf>,
    pub voice_model_path: Option<PathBuf>,
    /// Deadline for each backend call
    pub timeout: Duration,
}

/// Translation chain configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub libretranslate_url: Option<Url>,
    pub libretranslate_key: Option<SecretString>,
    /// Outbound requests per minute to LibreTranslate
    pub libretranslate_rpm: Option<u32>,
    pub google_key: Option<SecretString>,
    pub max_audio_secs: f64,
    pub max_text_chars: usize,
    pub history_limit: usize,
    /// Language assumed when `auto` detection fails, or `strict` to fail
    pub detection_fallback: Option<String>,
}

/// Speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    pub provider: SttProvider,
    pub api_key: SecretString,
    pub model: String,
}

/// Text-to-speech configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub provider: TtsProvider,
    pub api_key: SecretString,
    pub voice: String,
    pub speed: f32,
    pub model: String,
}

/// Synthesis queue configuration
#[derive(Debug, Clone, Copy)]
pub struct SynthesisConfig {
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

/// Defaults for new call sessions
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub cadence: Duration,
    pub capture_duration: Duration,
    pub source_language: String,
    pub target_language: String,
    pub preserve_voice: bool,
    pub clone_mode: CloneMode,
}

/// HTTP API server configuration
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Port to listen on (default: 18790)
    pub port: u16,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a URL or enum value is malformed
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a URL or enum value is malformed
    pub fn from_sources(fc: ParleyConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let parse_env = |key: &str| env(key).filter(|v| !v.is_empty());

        // Engine config (env > toml > default)
        let engine = EngineConfig {
            sidecar_url: parse_env("PARLEY_SIDECAR_URL")
                .or(fc.engine.sidecar_url)
                .map_or_else(
                    || parse_url("engine.sidecar_url", DEFAULT_SIDECAR_URL),
                    |u| parse_url("engine.sidecar_url", &u),
                )?,
            speech_model_path: parse_env("PARLEY_SPEECH_MODEL")
                .or(fc.engine.speech_model_path)
                .map(PathBuf::from),
            voice_model_path: parse_env("PARLEY_VOICE_MODEL")
                .or(fc.engine.voice_model_path)
                .map(PathBuf::from),
            timeout: Duration::from_millis(
                parse_env("PARLEY_TIMEOUT_MS")
                    .and_then(|v| v.parse().ok())
                    .or(fc.engine.timeout_ms)
                    .unwrap_or(15_000),
            ),
        };

        let defaults = TranslatorSettings::default();
        let translation = TranslationConfig {
            libretranslate_url: parse_env("LIBRETRANSLATE_URL")
                .or(fc.translation.libretranslate_url)
                .map(|u| parse_url("translation.libretranslate_url", &u))
                .transpose()?,
            libretranslate_key: parse_env("LIBRETRANSLATE_API_KEY")
                .or(fc.translation.libretranslate_key)
                .map(SecretString::from),
            libretranslate_rpm: parse_env("PARLEY_LIBRETRANSLATE_RPM")
                .and_then(|v| v.parse().ok())
                .or(fc.translation.libretranslate_rpm),
            google_key: parse_env("GOOGLE_TRANSLATE_API_KEY")
                .or(fc.translation.google_key)
                .map(SecretString::from),
            max_audio_secs: fc.translation.max_audio_secs.unwrap_or(defaults.max_audio_secs),
            max_text_chars: fc.translation.max_text_chars.unwrap_or(defaults.max_text_chars),
            history_limit: fc.translation.history_limit.unwrap_or(defaults.history_limit),
            detection_fallback: parse_env("PARLEY_DETECTION_FALLBACK")
                .or(fc.translation.detection_fallback),
        };

        // STT is only configured when its provider has a key
        let stt_provider = parse_env("PARLEY_STT_PROVIDER")
            .or(fc.stt.provider)
            .map_or(Ok(SttProvider::Whisper), |p| parse_stt_provider(&p))?;
        let stt_key = match stt_provider {
            SttProvider::Whisper => parse_env("OPENAI_API_KEY"),
            SttProvider::Deepgram => parse_env("DEEPGRAM_API_KEY"),
        }
        .or(fc.stt.api_key);
        let stt = stt_key.map(|key| SttConfig {
            provider: stt_provider,
            api_key: SecretString::from(key),
            model: parse_env("PARLEY_STT_MODEL")
                .or_else(|| fc.stt.model.clone())
                .unwrap_or_else(|| match stt_provider {
                    SttProvider::Whisper => "whisper-1".to_string(),
                    SttProvider::Deepgram => "nova-2".to_string(),
                }),
        });

        let tts_provider = parse_env("PARLEY_TTS_PROVIDER")
            .or(fc.tts.provider)
            .map_or(Ok(TtsProvider::OpenAi), |p| parse_tts_provider(&p))?;
        let tts_key = match tts_provider {
            TtsProvider::OpenAi => parse_env("OPENAI_API_KEY"),
            TtsProvider::ElevenLabs => parse_env("ELEVENLABS_API_KEY"),
        }
        .or(fc.tts.api_key);
        let tts = tts_key.map(|key| TtsConfig {
            provider: tts_provider,
            api_key: SecretString::from(key),
            voice: parse_env("PARLEY_TTS_VOICE")
                .or_else(|| fc.tts.voice.clone())
                .unwrap_or_else(|| match tts_provider {
                    TtsProvider::OpenAi => "alloy".to_string(),
                    TtsProvider::ElevenLabs => "21m00Tcm4TlvDQ8ikWAM".to_string(),
                }),
            speed: fc.tts.speed.unwrap_or(1.0),
            model: parse_env("PARLEY_TTS_MODEL")
                .or_else(|| fc.tts.model.clone())
                .unwrap_or_else(|| match tts_provider {
                    TtsProvider::OpenAi => "tts-1".to_string(),
                    TtsProvider::ElevenLabs => "eleven_multilingual_v2".to_string(),
                }),
        });

        let synthesis = SynthesisConfig {
            queue_capacity: parse_env("PARLEY_QUEUE_CAPACITY")
                .and_then(|v| v.parse().ok())
                .or(fc.synthesis.queue_capacity)
                .unwrap_or(16),
            overflow: parse_env("PARLEY_QUEUE_OVERFLOW")
                .or(fc.synthesis.overflow)
                .map_or(Ok(OverflowPolicy::default()), |p| parse_overflow(&p))?,
        };

        let session_defaults = SessionConfig::default();
        let clone_mode = match fc.session.clone_mode.as_deref() {
            None | Some("active_profile") => CloneMode::ActiveProfile,
            Some("sample") => CloneMode::Sample,
            Some("profile") => CloneMode::Profile(fc.session.profile_id.ok_or_else(|| {
                Error::Config("session.clone_mode = \"profile\" requires session.profile_id".to_string())
            })?),
            Some(other) => {
                return Err(Error::Config(format!("unknown session.clone_mode: {other}")));
            }
        };
        let session = SessionDefaults {
            cadence: fc
                .session
                .cadence_ms
                .map_or(session_defaults.cadence, Duration::from_millis),
            capture_duration: fc
                .session
                .capture_ms
                .map_or(session_defaults.capture_duration, Duration::from_millis),
            source_language: parse_env("PARLEY_SOURCE_LANGUAGE")
                .or(fc.session.source_language)
                .unwrap_or(session_defaults.source_language),
            target_language: parse_env("PARLEY_TARGET_LANGUAGE")
                .or(fc.session.target_language)
                .unwrap_or(session_defaults.target_language),
            preserve_voice: fc
                .session
                .preserve_voice
                .unwrap_or(session_defaults.preserve_voice),
            clone_mode,
        };

        let server = ServerConfig {
            port: parse_env("PARLEY_API_PORT")
                .or_else(|| parse_env("PORT"))
                .and_then(|p| p.parse().ok())
                .or(fc.server.port)
                .unwrap_or(18790),
        };

        // Determine data directory (~/.local/share/parley on Linux)
        let data_dir = parse_env("PARLEY_DATA_DIR").map_or_else(
            || {
                directories::BaseDirs::new()
                    .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("parley"))
            },
            PathBuf::from,
        );

        Ok(Self {
            data_dir,
            engine,
            translation,
            stt,
            tts,
            synthesis,
            session,
            server,
        })
    }

    /// Orchestrator settings derived from this config
    #[must_use]
    pub fn translator_settings(&self) -> TranslatorSettings {
        TranslatorSettings {
            timeout: self.engine.timeout,
            max_audio_secs: self.translation.max_audio_secs,
            max_text_chars: self.translation.max_text_chars,
            history_limit: self.translation.history_limit,
            detection: self
                .translation
                .detection_fallback
                .as_deref()
                .map_or_else(DetectionFallback::default, DetectionFallback::from_setting),
        }
    }

    /// A fresh session config seeded from the defaults
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            cadence: self.session.cadence,
            capture_duration: self.session.capture_duration,
            source_language: self.session.source_language.clone(),
            target_language: self.session.target_language.clone(),
            preserve_voice: self.session.preserve_voice,
            clone_mode: self.session.clone_mode.clone(),
            ..SessionConfig::default()
        }
    }

    /// Where voice profiles are persisted
    #[must_use]
    pub fn profiles_path(&self) -> PathBuf {
        self.data_dir.join("profiles.json")
    }

    /// Scratch directory for capture and playback files
    #[must_use]
    pub fn temp_audio_dir(&self) -> PathBuf {
        self.data_dir.join("tmp")
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| Error::Config(format!("invalid {field} {value:?}: {e}")))
}

fn parse_stt_provider(value: &str) -> Result<SttProvider> {
    match value.to_lowercase().as_str() {
        "whisper" | "openai" => Ok(SttProvider::Whisper),
        "deepgram" => Ok(SttProvider::Deepgram),
        other => Err(Error::Config(format!("unknown STT provider: {other}"))),
    }
}

fn parse_tts_provider(value: &str) -> Result<TtsProvider> {
    match value.to_lowercase().as_str() {
        "openai" => Ok(TtsProvider::OpenAi),
        "elevenlabs" => Ok(TtsProvider::ElevenLabs),
        other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
    }
}

fn parse_overflow(value: &str) -> Result<OverflowPolicy> {
    match value {
        "drop_oldest" => Ok(OverflowPolicy::DropOldest),
        "reject_new" => Ok(OverflowPolicy::RejectNew),
        other => Err(Error::Config(format!("unknown overflow policy: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = Config::from_sources(ParleyConfigFile::default(), env_of(&[])).unwrap();

        assert_eq!(config.engine.sidecar_url.as_str(), DEFAULT_SIDECAR_URL);
        assert_eq!(config.engine.timeout, Duration::from_secs(15));
        assert!(config.stt.is_none());
        assert!(config.tts.is_none());
        assert_eq!(config.synthesis.overflow, OverflowPolicy::DropOldest);
        assert_eq!(config.session.source_language, "auto");
        assert_eq!(config.server.port, 18790);
        assert_eq!(config.translator_settings().detection, DetectionFallback::assume("en"));
    }

    #[test]
    fn env_overrides_file() {
        let fc: ParleyConfigFile = toml::from_str(
            r#"
            [engine]
            timeout_ms = 2000

            [translation]
            libretranslate_url = "http://file:5000"

            [server]
            port = 9000
            "#,
        )
        .unwrap();
        let env = env_of(&[
            ("LIBRETRANSLATE_URL", "http://env:5000"),
            ("PARLEY_API_PORT", "9100"),
        ]);

        let config = Config::from_sources(fc, env).unwrap();
        assert_eq!(
            config.translation.libretranslate_url.unwrap().as_str(),
            "http://env:5000/"
        );
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.engine.timeout, Duration::from_millis(2000));
    }

    #[test]
    fn stt_key_follows_provider() {
        let fc: ParleyConfigFile = toml::from_str("[stt]\nprovider = \"deepgram\"\n").unwrap();
        let env = env_of(&[("OPENAI_API_KEY", "sk-openai"), ("DEEPGRAM_API_KEY", "dg-key")]);

        let config = Config::from_sources(fc, env).unwrap();
        let stt = config.stt.unwrap();
        assert_eq!(stt.provider, SttProvider::Deepgram);
        assert_eq!(stt.api_key.expose_secret(), "dg-key");
        assert_eq!(stt.model, "nova-2");

        // Same OpenAI key also enables the default TTS
        let tts = config.tts.unwrap();
        assert_eq!(tts.provider, TtsProvider::OpenAi);
        assert_eq!(tts.voice, "alloy");
    }

    #[test]
    fn detection_fallback_becomes_policy() {
        let env = env_of(&[("PARLEY_DETECTION_FALLBACK", "en")]);
        let config = Config::from_sources(ParleyConfigFile::default(), env).unwrap();
        assert_eq!(
            config.translator_settings().detection,
            DetectionFallback::assume("en")
        );

        let env = env_of(&[("PARLEY_DETECTION_FALLBACK", "strict")]);
        let config = Config::from_sources(ParleyConfigFile::default(), env).unwrap();
        assert_eq!(config.translator_settings().detection, DetectionFallback::strict());
    }

    #[test]
    fn profile_clone_mode_needs_profile_id() {
        let fc: ParleyConfigFile =
            toml::from_str("[session]\nclone_mode = \"profile\"\n").unwrap();
        let err = Config::from_sources(fc, env_of(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let fc: ParleyConfigFile = toml::from_str(
            "[session]\nclone_mode = \"profile\"\nprofile_id = \"p1\"\n",
        )
        .unwrap();
        let config = Config::from_sources(fc, env_of(&[])).unwrap();
        assert_eq!(config.session.clone_mode, CloneMode::Profile("p1".to_string()));
    }

    #[test]
    fn malformed_values_are_config_errors() {
        let env = env_of(&[("PARLEY_SIDECAR_URL", "not a url")]);
        assert!(matches!(
            Config::from_sources(ParleyConfigFile::default(), env),
            Err(Error::Config(_))
        ));

        let env = env_of(&[("PARLEY_QUEUE_OVERFLOW", "drop_everything")]);
        assert!(matches!(
            Config::from_sources(ParleyConfigFile::default(), env),
            Err(Error::Config(_))
        ));
    }
}
