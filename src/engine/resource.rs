//! Shared ownership of a model session

use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{OwnedRwLockReadGuard, RwLock};

use super::ModelSession;
use crate::{Error, Result};

/// Reference-counted handle to a model session
///
/// Inference holds a read guard for the duration of a call, so any number of
/// calls run concurrently. Loading and unloading take the write side: unload
/// waits for in-flight inference, and anything that acquires afterwards gets
/// `BackendNotReady`.
pub struct InferenceResource<E: ?Sized> {
    engine: Arc<E>,
    gate: Arc<RwLock<()>>,
}

impl<E: ?Sized> Clone for InferenceResource<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<E: ModelSession + ?Sized> InferenceResource<E> {
    /// Take ownership of a session
    #[must_use]
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            gate: Arc::new(RwLock::new(())),
        }
    }

    /// Session name
    #[must_use]
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// Ask the session whether it can serve requests right now
    pub async fn is_ready(&self) -> bool {
        self.engine.is_loaded().await
    }

    /// Borrow the session for one inference call
    ///
    /// # Errors
    ///
    /// Returns `BackendNotReady` if the model is not loaded
    pub async fn acquire(&self) -> Result<EngineGuard<E>> {
        let guard = Arc::clone(&self.gate).read_owned().await;
        if !self.engine.is_loaded().await {
            return Err(Error::BackendNotReady(format!(
                "{} model is not loaded",
                self.engine.name()
            )));
        }
        Ok(EngineGuard {
            _guard: guard,
            engine: Arc::clone(&self.engine),
        })
    }

    /// Load model weights, waiting for in-flight inference to drain
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` if `model_path` does not exist, or the session's
    /// own load error
    pub async fn load(&self, model_path: &Path) -> Result<()> {
        let _write = self.gate.write().await;
        if !model_path.exists() {
            return Err(Error::ModelNotFound(model_path.display().to_string()));
        }

        tracing::info!(model = self.engine.name(), path = %model_path.display(), "loading model");
        self.engine.load(model_path).await?;
        tracing::info!(model = self.engine.name(), "model loaded");
        Ok(())
    }

    /// Unload the session, waiting for in-flight inference to drain
    ///
    /// # Errors
    ///
    /// Returns the session's own unload error
    pub async fn unload(&self) -> Result<()> {
        let _write = self.gate.write().await;
        self.engine.unload().await?;
        tracing::info!(model = self.engine.name(), "model unloaded");
        Ok(())
    }
}

/// Read access to a loaded session
pub struct EngineGuard<E: ?Sized> {
    _guard: OwnedRwLockReadGuard<()>,
    engine: Arc<E>,
}

impl<E: ?Sized> Deref for EngineGuard<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.engine
    }
}
