//! Scoped temporary audio files

use std::path::{Path, PathBuf};

use super::{AudioBuffer, write_wav};
use crate::Result;

/// Directory that owns transient audio files for one process
#[derive(Debug, Clone)]
pub struct TempAudioDir {
    root: PathBuf,
}

impl TempAudioDir {
    /// Use (and create if needed) `root` for temporary audio
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Reserve a unique file path under this directory
    ///
    /// The file is not created; whatever ends up at the path is removed when
    /// the returned guard drops.
    #[must_use]
    pub fn allocate(&self, prefix: &str) -> TempAudioFile {
        let name = format!("{prefix}-{}.wav", uuid::Uuid::new_v4().simple());
        TempAudioFile::adopt(self.root.join(name))
    }

    /// Write a buffer to a fresh scoped file
    ///
    /// # Errors
    ///
    /// Returns error if encoding or the write fails
    pub fn write(&self, prefix: &str, audio: &AudioBuffer) -> Result<TempAudioFile> {
        let file = self.allocate(prefix);
        write_wav(file.path(), audio)?;
        Ok(file)
    }

    /// Remove leftover `.wav` files from a previous run
    ///
    /// Returns how many files were removed.
    pub fn sweep(&self) -> usize {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return 0;
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "wav") {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to remove stale audio file");
                    }
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, dir = %self.root.display(), "swept stale audio files");
        }
        removed
    }
}

/// Owns a temporary audio file and deletes it on drop
#[derive(Debug)]
pub struct TempAudioFile {
    path: PathBuf,
}

impl TempAudioFile {
    /// Take ownership of an existing path
    #[must_use]
    pub const fn adopt(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release ownership, leaving the file on disk for a new owner
    #[must_use]
    pub fn into_path(self) -> PathBuf {
        let this = std::mem::ManuallyDrop::new(self);
        this.path.clone()
    }
}

impl Drop for TempAudioFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "temp audio removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp audio");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_removes_file_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let temp = TempAudioDir::new(dir.path()).unwrap();

        let file = temp
            .write("capture", &AudioBuffer::new(vec![0.1; 160], 16_000))
            .unwrap();
        let path = file.path().to_path_buf();
        assert!(path.exists());

        drop(file);
        assert!(!path.exists());
    }

    #[test]
    fn dropping_unwritten_allocation_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let temp = TempAudioDir::new(dir.path()).unwrap();
        let file = temp.allocate("never-written");
        assert!(!file.path().exists());
        drop(file);
    }

    #[test]
    fn sweep_removes_only_wav_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stale-1.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("stale-2.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep").unwrap();

        let temp = TempAudioDir::new(dir.path()).unwrap();
        assert_eq!(temp.sweep(), 2);
        assert!(dir.path().join("notes.txt").exists());
    }
}
