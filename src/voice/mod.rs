//! Voice profiles, cloning, and synthesis
//!
//! Speaker embeddings are averaged into [`VoiceProfile`]s held by the
//! [`ProfileStore`]. Cloned speech is produced by the [`SynthesisQueue`],
//! one request at a time.

pub mod effects;
mod profile;
mod queue;
mod similarity;
mod store;
mod synthesis;
mod tts;

pub use profile::{
    Emotion, ProfileOptions, ProfileUpdate, QualityTier, VoiceCharacteristics, VoiceCloneResult,
    VoiceProfile,
};
pub use queue::{OverflowPolicy, SynthesisOptions, SynthesisQueue, SynthesisRequest, VoiceSource};
pub use similarity::{cosine_similarity, mean_embedding};
pub use store::ProfileStore;
pub use synthesis::Synthesizer;
pub use tts::{TextToSpeech, TtsProvider};
