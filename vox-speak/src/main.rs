//! vox-speak - command-line entry point
//!
//! Renders text to a WAV file, to a directory of WAV blocks, or straight to
//! an audio device.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vox_common::config::TomlConfig;
use vox_speak::engine::{SynthesisEngine, ToneEngine};
use vox_speak::pipeline;
use vox_speak::playback::{CpalOutput, PlaybackScheduler};

/// Command-line arguments for vox-speak
#[derive(Parser, Debug)]
#[command(name = "vox-speak")]
#[command(about = "Stream synthesized speech to WAV files or an audio device")]
#[command(version)]
struct Args {
    /// Config file (default: platform config dir)
    #[arg(short, long, global = true, env = "VOX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (overrides the config file)
    #[arg(long, global = true, env = "VOX_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render text to a WAV file
    Render {
        /// Text to speak
        text: String,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long, default_value = "default", env = "VOX_VOICE")]
        voice: String,
    },

    /// Render text as one WAV file per stream event
    Blocks {
        /// Text to speak
        text: String,

        /// Directory receiving 0000.wav, 0001.wav, ...
        #[arg(short, long)]
        dir: PathBuf,

        #[arg(short, long, default_value = "default", env = "VOX_VOICE")]
        voice: String,
    },

    /// Speak text through an audio output device
    Play {
        /// Text to speak
        text: String,

        #[arg(short, long, default_value = "default", env = "VOX_VOICE")]
        voice: String,

        /// Output device name (overrides the config file)
        #[arg(short, long, env = "VOX_OUTPUT_DEVICE")]
        device: Option<String>,
    },

    /// List audio output devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vox_speak={level},vox_common={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "vox-speak {} (rev {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("VOX_GIT_REVISION"),
        env!("VOX_BUILD_TIMESTAMP")
    );

    let engine = ToneEngine::new(config.audio.sample_rate);

    match args.command {
        Command::Render {
            text,
            output,
            voice,
        } => {
            let summary = pipeline::render_to_file(&engine, &text, &voice, &output, &config.audio)
                .with_context(|| format!("Failed to render {}", output.display()))?;
            println!(
                "{}: {} frames, {:.2}s",
                output.display(),
                summary.total_frames(),
                summary.duration().as_secs_f64()
            );
        }

        Command::Blocks { text, dir, voice } => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;

            let summary = pipeline::render_blocks(&engine, &text, &voice, &config.audio, |index, block| {
                let path = dir.join(format!("{:04}.wav", index));
                std::fs::write(&path, block)?;
                Ok(())
            })
            .context("Failed to render blocks")?;
            println!("{}: {} events", dir.display(), summary.events);
        }

        Command::Play {
            text,
            voice,
            device,
        } => {
            let device_name = device.or_else(|| config.output.device.clone());
            let output = CpalOutput::open(device_name.as_deref(), config.output.buffer_size)
                .context("Failed to open audio output")?;
            let scheduler = PlaybackScheduler::from_config(Arc::new(output), &config.audio);
            let engine: Arc<dyn SynthesisEngine> = Arc::new(engine);

            tokio::select! {
                result = pipeline::play(engine, &text, &voice, &scheduler, &config.audio) => {
                    let completion = result.context("Playback failed")?;
                    info!(
                        "Played {} buffers (session {})",
                        completion.rendered_buffers, completion.session_id
                    );
                }
                // A failed signal listener disables this branch; playback continues
                Ok(()) = signal::ctrl_c() => {
                    warn!("Interrupted, stopping playback");
                    scheduler.stop();
                }
            }
        }

        Command::Devices => {
            let devices = CpalOutput::list_devices().context("Failed to list audio devices")?;
            if devices.is_empty() {
                bail!("No audio output devices found");
            }
            for name in devices {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
