//! Parley - real-time voice translation and voice cloning for live calls
//!
//! This library provides the core of the parley pipeline:
//! - Speech and text translation through an on-device model with remote
//!   fallbacks (LibreTranslate, Google)
//! - Voice profiles built from speaker embeddings, and cloned-voice synthesis
//! - Real-time call sessions that capture, translate, and speak on a cadence
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │        CLI  │  HTTP control API  │  Call session     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                      Runtime                         │
//! │  Translator  │  Profile store  │  Synthesis queue    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Capability providers                 │
//! │  Speech model │ Voice model │ Remote APIs │ Audio I/O │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod runtime;
pub mod session;
pub mod translation;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use runtime::Runtime;
pub use session::{CallSession, CallState, SessionConfig};
pub use translation::{Translator, TranslationInput, TranslationResult};
pub use voice::{ProfileStore, SynthesisQueue, VoiceProfile};
