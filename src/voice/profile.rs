//! Voice profile data types

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audio::AudioBuffer;
use crate::Error;

/// Emotional coloring applied to synthesized speech
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Excited,
    Calm,
}

impl Emotion {
    /// Amplitude gain applied by the adjustment pass
    #[must_use]
    pub const fn gain(self) -> f32 {
        match self {
            Self::Neutral => 1.0,
            Self::Happy => 1.1,
            Self::Sad => 0.9,
            Self::Angry => 1.3,
            Self::Excited => 1.15,
            Self::Calm => 0.95,
        }
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Excited => "excited",
            Self::Calm => "calm",
        }
    }
}

impl FromStr for Emotion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "neutral" => Ok(Self::Neutral),
            "happy" => Ok(Self::Happy),
            "sad" => Ok(Self::Sad),
            "angry" => Ok(Self::Angry),
            "excited" => Ok(Self::Excited),
            "calm" => Ok(Self::Calm),
            other => Err(Error::Config(format!("unknown emotion: {other}"))),
        }
    }
}

/// Output quality tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    #[default]
    Standard,
    High,
    Ultra,
}

impl QualityTier {
    /// Whether synthesized audio goes through the enhancement pass
    #[must_use]
    pub const fn wants_enhancement(self) -> bool {
        matches!(self, Self::High | Self::Ultra)
    }
}

impl FromStr for QualityTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "high" => Ok(Self::High),
            "ultra" => Ok(Self::Ultra),
            other => Err(Error::Config(format!("unknown quality tier: {other}"))),
        }
    }
}

/// How a voice should sound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceCharacteristics {
    /// Pitch offset in semitones
    pub pitch: f32,
    /// Speaking rate multiplier
    pub speed: f32,
    pub emotion: Emotion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl Default for VoiceCharacteristics {
    fn default() -> Self {
        Self {
            pitch: 0.0,
            speed: 1.0,
            emotion: Emotion::Neutral,
            accent: None,
            age: None,
            gender: None,
        }
    }
}

impl VoiceCharacteristics {
    /// Whether the adjustment pass would leave audio unchanged
    #[must_use]
    pub fn is_neutral(&self) -> bool {
        self.pitch.abs() < f32::EPSILON
            && (self.speed - 1.0).abs() < f32::EPSILON
            && self.emotion == Emotion::Neutral
    }
}

/// A stored speaker voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub id: String,
    pub name: String,
    /// Language the samples were recorded in
    pub language: String,
    /// Sample files the embedding was averaged from, in order
    pub samples: Vec<PathBuf>,
    /// Averaged speaker embedding
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub characteristics: VoiceCharacteristics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub quality: QualityTier,
}

/// Settings for a new profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOptions {
    pub language: String,
    pub characteristics: VoiceCharacteristics,
    pub quality: QualityTier,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            characteristics: VoiceCharacteristics::default(),
            quality: QualityTier::Standard,
        }
    }
}

/// Partial update to a stored profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub language: Option<String>,
    pub characteristics: Option<VoiceCharacteristics>,
    pub quality: Option<QualityTier>,
}

/// Output of one cloning request
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceCloneResult {
    pub audio: AudioBuffer,
    /// Speaker similarity to the requested voice in `[0, 1]`; 0 when it
    /// could not be scored
    pub similarity: f32,
    pub duration_secs: f64,
    /// Characteristics applied by the adjustment pass, if any
    pub characteristics: Option<VoiceCharacteristics>,
}
