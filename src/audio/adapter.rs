//! Capture/playback adapter
//!
//! The pipeline never touches audio devices directly. It asks an
//! [`AudioAdapter`] to record into a file and to play a file back, which keeps
//! the session loop testable without hardware.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{AudioCapture, AudioPlayback, TempAudioDir, read_wav, write_wav};
use crate::{Error, Result};

/// Handle for one in-progress recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordingToken(u64);

impl RecordingToken {
    /// Wrap a raw recording id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw recording id
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Records to and plays from audio files
#[async_trait]
pub trait AudioAdapter: Send + Sync {
    /// Begin capturing from the input device
    async fn start_recording(&self) -> Result<RecordingToken>;

    /// Finish the recording and return the path of the captured WAV file
    ///
    /// The caller owns the returned file.
    async fn stop_recording(&self, token: RecordingToken) -> Result<PathBuf>;

    /// Play a WAV file to the output device, returning once it finishes
    async fn play(&self, path: &Path) -> Result<()>;

    /// Abort any recording and cut playback short
    async fn stop(&self) -> Result<()>;
}

enum Command {
    StartRecording {
        reply: oneshot::Sender<Result<RecordingToken>>,
    },
    StopRecording {
        token: RecordingToken,
        reply: oneshot::Sender<Result<PathBuf>>,
    },
    Play {
        path: PathBuf,
        reply: oneshot::Sender<Result<()>>,
    },
    Abort,
}

/// [`AudioAdapter`] backed by the default cpal input and output devices
///
/// cpal streams are not `Send`, so capture and playback live on a dedicated
/// OS thread that executes commands sent from async code.
pub struct DeviceAudioAdapter {
    commands: mpsc::Sender<Command>,
    interrupt: Arc<AtomicBool>,
}

impl DeviceAudioAdapter {
    /// Open the default devices on a dedicated audio thread
    ///
    /// Captured files are written under `temp`.
    ///
    /// # Errors
    ///
    /// Returns error if either device cannot be opened
    pub fn spawn(temp: TempAudioDir) -> Result<Self> {
        let (commands, inbox) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<Arc<AtomicBool>>>();

        std::thread::Builder::new()
            .name("parley-audio".to_string())
            .spawn(move || {
                let devices = AudioCapture::new()
                    .and_then(|capture| AudioPlayback::new().map(|playback| (capture, playback)));
                let (capture, playback) = match devices {
                    Ok(devices) => devices,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(playback.interrupt_handle()));
                AudioThread {
                    capture,
                    playback,
                    temp,
                    active: None,
                    next_id: 0,
                }
                .run(&inbox);
            })?;

        let interrupt = ready_rx
            .recv()
            .map_err(|_| Error::Audio("audio thread exited during startup".to_string()))??;

        Ok(Self {
            commands,
            interrupt,
        })
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| Error::Audio("audio thread stopped".to_string()))?;
        rx.await
            .map_err(|_| Error::Audio("audio thread dropped the request".to_string()))?
    }
}

#[async_trait]
impl AudioAdapter for DeviceAudioAdapter {
    async fn start_recording(&self) -> Result<RecordingToken> {
        self.request(|reply| Command::StartRecording { reply }).await
    }

    async fn stop_recording(&self, token: RecordingToken) -> Result<PathBuf> {
        self.request(|reply| Command::StopRecording { token, reply })
            .await
    }

    async fn play(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        self.request(|reply| Command::Play { path, reply }).await
    }

    async fn stop(&self) -> Result<()> {
        // Playback blocks the audio thread, so the flag is raised from here
        self.interrupt.store(true, Ordering::SeqCst);
        self.commands
            .send(Command::Abort)
            .map_err(|_| Error::Audio("audio thread stopped".to_string()))
    }
}

struct AudioThread {
    capture: AudioCapture,
    playback: AudioPlayback,
    temp: TempAudioDir,
    active: Option<RecordingToken>,
    next_id: u64,
}

impl AudioThread {
    fn run(mut self, inbox: &mpsc::Receiver<Command>) {
        while let Ok(command) = inbox.recv() {
            match command {
                Command::StartRecording { reply } => {
                    let _ = reply.send(self.start_recording());
                }
                Command::StopRecording { token, reply } => {
                    let _ = reply.send(self.stop_recording(token));
                }
                Command::Play { path, reply } => {
                    let result = read_wav(&path).and_then(|audio| self.playback.play(&audio));
                    let _ = reply.send(result);
                }
                Command::Abort => {
                    if self.active.take().is_some() {
                        self.capture.abort();
                        tracing::debug!("recording aborted");
                    }
                }
            }
        }
        tracing::debug!("audio thread exiting");
    }

    fn start_recording(&mut self) -> Result<RecordingToken> {
        if self.active.is_some() {
            return Err(Error::Audio("a recording is already in progress".to_string()));
        }
        self.capture.start()?;
        self.next_id += 1;
        let token = RecordingToken::new(self.next_id);
        self.active = Some(token);
        Ok(token)
    }

    fn stop_recording(&mut self, token: RecordingToken) -> Result<PathBuf> {
        if self.active != Some(token) {
            return Err(Error::Audio(format!(
                "recording {} is not in progress",
                token.id()
            )));
        }
        self.active = None;

        let audio = self.capture.finish();
        if audio.is_empty() {
            return Err(Error::Audio("no audio captured".to_string()));
        }

        let file = self.temp.allocate("capture");
        write_wav(file.path(), &audio)?;
        tracing::debug!(
            path = %file.path().display(),
            secs = audio.duration_secs(),
            "recording saved"
        );
        Ok(file.into_path())
    }
}
