//! Persistent voice profile store

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::similarity::{cosine_similarity, mean_embedding};
use super::{ProfileOptions, ProfileUpdate, VoiceProfile};
use crate::audio::read_wav;
use crate::engine::{InferenceResource, VoiceEngine, with_timeout};
use crate::{Error, Result};

const STORE_VERSION: u32 = 1;

#[derive(Deserialize)]
struct StoreDocument {
    version: u32,
    #[serde(default)]
    profiles: Vec<VoiceProfile>,
}

#[derive(Serialize)]
struct StoreDocumentRef<'a> {
    version: u32,
    profiles: Vec<&'a VoiceProfile>,
}

/// Voice profiles backed by a JSON document
///
/// Every mutation is written through to disk before it returns. At most one
/// profile is active.
pub struct ProfileStore {
    path: PathBuf,
    voice: InferenceResource<dyn VoiceEngine>,
    timeout: Duration,
    profiles: RwLock<Vec<Arc<VoiceProfile>>>,
}

impl ProfileStore {
    /// Open the store at `path`, loading any existing profiles
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn open(
        path: impl Into<PathBuf>,
        voice: InferenceResource<dyn VoiceEngine>,
        timeout: Duration,
    ) -> Result<Self> {
        let path = path.into();
        let profiles = if path.exists() {
            load_document(&path)?
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), count = profiles.len(), "profile store opened");
        Ok(Self {
            path,
            voice,
            timeout,
            profiles: RwLock::new(profiles.into_iter().map(Arc::new).collect()),
        })
    }

    /// Speaker embedding of a WAV sample
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingExtractionFailed` if the sample is unreadable or the
    /// voice model is not ready
    pub async fn extract_embedding(&self, sample_path: &Path) -> Result<Vec<f32>> {
        let audio = read_wav(sample_path)
            .map_err(|e| Error::EmbeddingExtractionFailed(e.to_string()))?;

        let embedding = with_timeout(self.timeout, "extract_embedding", async {
            let engine = self.voice.acquire().await?;
            engine.extract_embedding(&audio).await
        })
        .await
        .map_err(|e| match e {
            e @ Error::EmbeddingExtractionFailed(_) => e,
            other => Error::EmbeddingExtractionFailed(other.to_string()),
        })?;

        if embedding.is_empty() {
            return Err(Error::EmbeddingExtractionFailed(format!(
                "{} produced an empty embedding",
                sample_path.display()
            )));
        }
        Ok(embedding)
    }

    /// Build a profile from one or more samples
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingExtractionFailed` for unusable samples,
    /// `MalformedEmbedding` if sample embeddings disagree in length, or the
    /// backend or persistence error
    pub async fn create_profile(
        &self,
        name: &str,
        samples: &[PathBuf],
        options: ProfileOptions,
    ) -> Result<VoiceProfile> {
        if samples.is_empty() {
            return Err(Error::EmbeddingExtractionFailed(
                "at least one voice sample is required".to_string(),
            ));
        }

        let mut embeddings = Vec::with_capacity(samples.len());
        for sample in samples {
            embeddings.push(self.extract_embedding(sample).await?);
        }
        let embedding = mean_embedding(&embeddings)?;

        let id = with_timeout(self.timeout, "register_profile", async {
            let engine = self.voice.acquire().await?;
            engine.register_profile(name, &embedding).await
        })
        .await?;

        let now = Utc::now();
        let profile = VoiceProfile {
            id,
            name: name.to_string(),
            language: options.language,
            samples: samples.to_vec(),
            embedding,
            characteristics: options.characteristics,
            created_at: now,
            updated_at: now,
            active: false,
            quality: options.quality,
        };

        let saved = {
            let mut profiles = self.write();
            profiles.retain(|p| p.id != profile.id);
            profiles.push(Arc::new(profile.clone()));
            let saved = self.save(&profiles);
            if saved.is_err() {
                profiles.retain(|p| p.id != profile.id);
            }
            saved
        };
        if let Err(e) = saved {
            // The id was never handed out
            self.release_backend(&profile.id).await;
            return Err(e);
        }

        tracing::info!(
            profile_id = %profile.id,
            name = %profile.name,
            samples = samples.len(),
            "voice profile created"
        );
        Ok(profile)
    }

    /// Make `id` the only active profile
    ///
    /// # Errors
    ///
    /// Returns `ProfileNotFound` (leaving state untouched) for unknown ids, or
    /// the persistence error
    pub fn set_active(&self, id: &str) -> Result<()> {
        let mut profiles = self.write();
        if !profiles.iter().any(|p| p.id == id) {
            return Err(Error::ProfileNotFound(id.to_string()));
        }

        let next: Vec<Arc<VoiceProfile>> = profiles
            .iter()
            .map(|p| {
                let should_be_active = p.id == id;
                if p.active == should_be_active {
                    Arc::clone(p)
                } else {
                    let mut updated = VoiceProfile::clone(p);
                    updated.active = should_be_active;
                    updated.updated_at = Utc::now();
                    Arc::new(updated)
                }
            })
            .collect();

        self.save(&next)?;
        *profiles = next;
        tracing::info!(profile_id = %id, "voice profile activated");
        Ok(())
    }

    /// Apply a partial update
    ///
    /// # Errors
    ///
    /// Returns `ProfileNotFound` for unknown ids, or the persistence error
    pub fn update(&self, id: &str, update: ProfileUpdate) -> Result<VoiceProfile> {
        let mut profiles = self.write();
        let index = profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::ProfileNotFound(id.to_string()))?;

        let mut updated = VoiceProfile::clone(&profiles[index]);
        if let Some(name) = update.name {
            updated.name = name;
        }
        if let Some(language) = update.language {
            updated.language = language;
        }
        if let Some(characteristics) = update.characteristics {
            updated.characteristics = characteristics;
        }
        if let Some(quality) = update.quality {
            updated.quality = quality;
        }
        updated.updated_at = Utc::now();

        let previous = std::mem::replace(&mut profiles[index], Arc::new(updated.clone()));
        if let Err(e) = self.save(&profiles) {
            profiles[index] = previous;
            return Err(e);
        }

        tracing::debug!(profile_id = %id, "voice profile updated");
        Ok(updated)
    }

    /// Release backend resources and remove the profile
    ///
    /// Deleting an unknown id is a no-op. Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns the persistence error
    pub async fn delete(&self, id: &str) -> Result<bool> {
        if self.get(id).is_none() {
            tracing::debug!(profile_id = %id, "delete of unknown profile ignored");
            return Ok(false);
        }

        self.release_backend(id).await;

        let mut profiles = self.write();
        let before = profiles.len();
        profiles.retain(|p| p.id != id);
        if profiles.len() == before {
            // Raced with another delete
            return Ok(false);
        }
        self.save(&profiles)?;

        tracing::info!(profile_id = %id, "voice profile deleted");
        Ok(true)
    }

    /// Cosine similarity of two profiles' embeddings
    ///
    /// Missing profiles and empty embeddings score 0.
    #[must_use]
    pub fn compare(&self, a: &str, b: &str) -> f32 {
        match (self.get(a), self.get(b)) {
            (Some(a), Some(b)) => cosine_similarity(&a.embedding, &b.embedding),
            _ => 0.0,
        }
    }

    /// All profiles, oldest first
    #[must_use]
    pub fn list(&self) -> Vec<Arc<VoiceProfile>> {
        self.read().clone()
    }

    /// Look up a profile
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<VoiceProfile>> {
        self.read().iter().find(|p| p.id == id).cloned()
    }

    /// The active profile, if any
    #[must_use]
    pub fn active(&self) -> Option<Arc<VoiceProfile>> {
        self.read().iter().find(|p| p.active).cloned()
    }

    /// Path of the backing document
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<VoiceProfile>>> {
        self.profiles.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<VoiceProfile>>> {
        self.profiles.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the document next to its final path, then rename over it
    /// Drop the backend's copy of a profile; failures are only logged
    async fn release_backend(&self, id: &str) {
        let released = with_timeout(self.timeout, "release_profile", async {
            let engine = self.voice.acquire().await?;
            engine.release_profile(id).await
        })
        .await;
        if let Err(e) = released {
            tracing::warn!(profile_id = %id, error = %e, "backend profile release failed");
        }
    }

    fn save(&self, profiles: &[Arc<VoiceProfile>]) -> Result<()> {
        let document = StoreDocumentRef {
            version: STORE_VERSION,
            profiles: profiles.iter().map(AsRef::as_ref).collect(),
        };
        let json = serde_json::to_vec_pretty(&document)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&json)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

fn load_document(path: &Path) -> Result<Vec<VoiceProfile>> {
    let raw = std::fs::read(path)?;
    let document: StoreDocument = serde_json::from_slice(&raw)?;
    if document.version != STORE_VERSION {
        return Err(Error::Config(format!(
            "unsupported profile store version {} in {}",
            document.version,
            path.display()
        )));
    }

    let mut profiles = document.profiles;
    let mut seen_active = false;
    for profile in &mut profiles {
        if profile.active {
            if seen_active {
                tracing::warn!(profile_id = %profile.id, "multiple active profiles on disk, deactivating");
                profile.active = false;
            }
            seen_active = true;
        }
    }
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{QualityTier, VoiceCharacteristics};

    #[test]
    fn load_repairs_multiple_active_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let now = Utc::now();
        let profile = |id: &str| VoiceProfile {
            id: id.into(),
            name: id.into(),
            language: "en".into(),
            samples: Vec::new(),
            embedding: vec![1.0],
            characteristics: VoiceCharacteristics::default(),
            created_at: now,
            updated_at: now,
            active: true,
            quality: QualityTier::Standard,
        };
        let a = profile("a");
        let b = profile("b");
        let doc = StoreDocumentRef {
            version: 1,
            profiles: vec![&a, &b],
        };
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        let profiles = load_document(&path).unwrap();
        assert_eq!(profiles.iter().filter(|p| p.active).count(), 1);
        assert!(profiles[0].active);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(&path, br#"{"version": 9, "profiles": []}"#).unwrap();
        assert!(matches!(load_document(&path), Err(Error::Config(_))));
    }
}
