use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use parley::api::ApiServer;
use parley::audio::{AudioBuffer, AudioCapture, AudioPlayback, DeviceAudioAdapter, read_wav};
use parley::engine::ModelKind;
use parley::session::CloneMode;
use parley::translation::{OutputMode, TranslationInput, supported_languages};
use parley::voice::{ProfileOptions, QualityTier, SynthesisOptions, VoiceSource};
use parley::{Config, Runtime};

/// Parley - real-time voice translation and voice cloning
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Port for the HTTP control API (overrides config)
    #[arg(long, env = "PARLEY_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control API (default)
    Serve,
    /// Translate text or a WAV file
    Translate {
        /// Text to translate
        text: Option<String>,
        /// WAV file to translate instead of text
        #[arg(long, conflicts_with = "text")]
        audio: Option<PathBuf>,
        /// Source language code, or "auto"
        #[arg(long, default_value = "auto")]
        from: String,
        /// Target language code
        #[arg(long)]
        to: String,
        /// Play the translated speech
        #[arg(long)]
        speak: bool,
        /// Speak in this profile's cloned voice (implies --speak)
        #[arg(long)]
        profile: Option<String>,
    },
    /// List supported languages
    Languages,
    /// Manage voice profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// Run a live translated call on the default audio devices until Ctrl-C
    Call {
        /// Source language code, or "auto"
        #[arg(long)]
        from: Option<String>,
        /// Target language code
        #[arg(long)]
        to: Option<String>,
        /// Speak translations in a stock voice instead of the caller's
        #[arg(long)]
        no_preserve_voice: bool,
        /// Clone from this profile instead of the active one
        #[arg(long, conflicts_with = "sample_clone")]
        profile: Option<String>,
        /// Clone directly from each captured sample
        #[arg(long)]
        sample_clone: bool,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Load, unload, or inspect model sessions
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Create a profile from one or more WAV samples
    Create {
        name: String,
        #[arg(required = true)]
        samples: Vec<PathBuf>,
        #[arg(long, default_value = "en")]
        language: String,
        #[arg(long, default_value = "standard")]
        quality: QualityTier,
    },
    /// List profiles
    List,
    /// Make a profile the active one
    Activate { id: String },
    /// Delete a profile
    Delete { id: String },
    /// Compare two profiles' voices
    Compare { a: String, b: String },
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Load model weights
    Load { kind: ModelArg, path: PathBuf },
    /// Unload a model
    Unload { kind: ModelArg },
    /// Show which models are loaded
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelArg {
    Speech,
    Voice,
}

impl From<ModelArg> for ModelKind {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Speech => Self::Speech,
            ModelArg::Voice => Self::Voice,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Command::Serve);

    // Device checks and static listings need no runtime
    match command {
        Command::TestMic { duration } => return test_mic(duration).await,
        Command::TestSpeaker => return test_speaker().await,
        Command::Languages => {
            for language in supported_languages() {
                println!("{:<4} {:<5} {}", language.code, language.model_code, language.name);
            }
            return Ok(());
        }
        _ => {}
    }

    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");
    let runtime = Arc::new(Runtime::build(config)?);

    match command {
        Command::Serve => serve(runtime).await,
        Command::Translate {
            text,
            audio,
            from,
            to,
            speak,
            profile,
        } => translate(&runtime, text, audio, &from, &to, speak, profile).await,
        Command::Profile { command } => profile(&runtime, command).await,
        Command::Call {
            from,
            to,
            no_preserve_voice,
            profile,
            sample_clone,
        } => {
            let mut session = runtime.config().session_config();
            if let Some(from) = from {
                session.source_language = from;
            }
            if let Some(to) = to {
                session.target_language = to;
            }
            if no_preserve_voice {
                session.preserve_voice = false;
            }
            if let Some(profile) = profile {
                session.clone_mode = CloneMode::Profile(profile);
            } else if sample_clone {
                session.clone_mode = CloneMode::Sample;
            }
            call(&runtime, session).await
        }
        Command::Models { command } => models(&runtime, command).await,
        Command::TestMic { .. } | Command::TestSpeaker | Command::Languages => Ok(()),
    }
}

async fn serve(runtime: Arc<Runtime>) -> anyhow::Result<()> {
    runtime.load_configured_models().await;

    let port = runtime.config().server.port;
    tracing::info!(port, "parley ready");

    let server = ApiServer::new(runtime, port);
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }
    Ok(())
}

async fn translate(
    runtime: &Runtime,
    text: Option<String>,
    audio: Option<PathBuf>,
    from: &str,
    to: &str,
    speak: bool,
    profile: Option<String>,
) -> anyhow::Result<()> {
    let input = match (text, audio) {
        (Some(text), None) => TranslationInput::Text(text),
        (None, Some(path)) => TranslationInput::Audio(read_wav(&path)?),
        _ => anyhow::bail!("provide text or --audio"),
    };

    runtime.load_configured_models().await;
    let translator = runtime.translator();

    let (result, speech) = if let Some(profile) = profile {
        let (translation, cloned) = translator
            .translate_and_clone(
                runtime.queue(),
                &input,
                from,
                to,
                VoiceSource::Profile(profile),
                SynthesisOptions::default(),
            )
            .await?;
        println!("similarity: {:.3}", cloned.similarity);
        (translation.result, Some(cloned.audio))
    } else {
        let output = if speak { OutputMode::Speech } else { OutputMode::Text };
        let translation = translator.translate(&input, from, to, output).await?;
        (translation.result, translation.audio)
    };

    if !result.original_text.is_empty() {
        println!("{} > {}", result.source_language, result.original_text);
    }
    println!("{} > {}", result.target_language, result.translated_text);
    println!("({}, confidence {:.2})", result.backend, result.confidence);

    match speech {
        Some(speech) => play(speech).await?,
        None if speak => println!("no speech output available from {}", result.backend),
        None => {}
    }
    Ok(())
}

async fn profile(runtime: &Runtime, command: ProfileCommand) -> anyhow::Result<()> {
    let store = runtime.store();
    match command {
        ProfileCommand::Create {
            name,
            samples,
            language,
            quality,
        } => {
            runtime.load_configured_models().await;
            let options = ProfileOptions {
                language,
                quality,
                ..ProfileOptions::default()
            };
            let profile = store.create_profile(&name, &samples, options).await?;
            println!("created {} ({})", profile.id, profile.name);
        }
        ProfileCommand::List => {
            let profiles = store.list();
            if profiles.is_empty() {
                println!("no voice profiles");
            }
            for profile in profiles {
                let marker = if profile.active { "*" } else { " " };
                println!(
                    "{marker} {}  {}  [{}, {} samples, {:?}]",
                    profile.id,
                    profile.name,
                    profile.language,
                    profile.samples.len(),
                    profile.quality
                );
            }
        }
        ProfileCommand::Activate { id } => {
            store.set_active(&id)?;
            println!("activated {id}");
        }
        ProfileCommand::Delete { id } => {
            if store.delete(&id).await? {
                println!("deleted {id}");
            } else {
                println!("no profile {id}");
            }
        }
        ProfileCommand::Compare { a, b } => {
            println!("{:.4}", store.compare(&a, &b));
        }
    }
    Ok(())
}

async fn call(runtime: &Runtime, config: parley::SessionConfig) -> anyhow::Result<()> {
    runtime.load_configured_models().await;

    let audio = DeviceAudioAdapter::spawn(runtime.temp().clone())?;
    let session = runtime.call_session(config, Arc::new(audio));

    let mut states = session.subscribe();
    let watcher = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            tracing::debug!(%state, "call state");
        }
    });

    session.start()?;
    session.connected()?;
    println!("call {} active, press Ctrl-C to hang up", session.id());

    tokio::signal::ctrl_c().await?;
    session.stop().await;
    watcher.abort();

    let stats = session.stats();
    println!(
        "call ended: {} cycles, {} failed, {} ticks skipped",
        stats.completed.load(std::sync::atomic::Ordering::Relaxed),
        stats.failed.load(std::sync::atomic::Ordering::Relaxed),
        stats.skipped_ticks.load(std::sync::atomic::Ordering::Relaxed),
    );
    Ok(())
}

async fn models(runtime: &Runtime, command: ModelsCommand) -> anyhow::Result<()> {
    match command {
        ModelsCommand::Load { kind, path } => {
            let kind = ModelKind::from(kind);
            runtime.load_model(kind, &path).await?;
            println!("{kind} model loaded");
        }
        ModelsCommand::Unload { kind } => {
            let kind = ModelKind::from(kind);
            runtime.unload_model(kind).await?;
            println!("{kind} model unloaded");
        }
        ModelsCommand::Status => {
            for status in runtime.model_status().await {
                let state = if status.loaded { "loaded" } else { "not loaded" };
                println!("{:<7} {:<16} {state}", status.kind.as_str(), status.name);
            }
        }
    }
    Ok(())
}

/// Play a buffer on the default output device
async fn play(audio: AudioBuffer) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || AudioPlayback::new()?.play(&audio)).await??;
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;
    println!("Sample rate: {} Hz", parley::audio::SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let buffer = capture.peek();
        let energy = buffer.rms();
        let peak = buffer.samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        // Clear buffer each second
        capture.clear();
    }

    capture.abort();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = parley::audio::PLAYBACK_SAMPLE_RATE;
    let frequency = 440.0_f32;
    let num_samples = sample_rate as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);
    play(AudioBuffer::new(samples, sample_rate)).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}
