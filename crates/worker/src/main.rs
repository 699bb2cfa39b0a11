use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use comfyfront_core::task::LIPSYNC_DEFAULT_RESOLUTION;
use comfyfront_pipeline::tasks::lipsync::{self, LipsyncRequest};
use comfyfront_pipeline::tasks::speech::DEFAULT_VOICE_STYLE;
use comfyfront_pipeline::tasks::MediaInput;
use comfyfront_pipeline::{Orchestrator, PipelineConfig};

/// Run transcription, speech and lipsync jobs against a ComfyUI engine.
///
/// Engine location and directories come from the environment (see
/// `PipelineConfig::from_env`); a `.env` file is read if present.
#[derive(Parser)]
#[command(name = "comfyfront-worker")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the engine answers
    Health,

    /// Transcribe an audio file and print the text
    Transcribe {
        /// Audio file to transcribe
        audio: PathBuf,
    },

    /// Synthesize speech and print the output file path
    Speak {
        text: String,

        #[arg(long, default_value = DEFAULT_VOICE_STYLE)]
        voice_style: String,
    },

    /// Generate a talking-head video and print the output file path
    Lipsync {
        /// Portrait image
        image: PathBuf,

        /// Driving audio
        audio: PathBuf,

        /// Resolution tier: 256, 512 or 768
        #[arg(long, default_value = LIPSYNC_DEFAULT_RESOLUTION)]
        resolution: String,

        /// Sampler seed; -1 keeps the template's seed
        #[arg(long, default_value_t = lipsync::KEEP_TEMPLATE_SEED, allow_negative_numbers = true)]
        seed: i64,

        #[arg(long, default_value_t = lipsync::DEFAULT_STEPS)]
        steps: u32,

        #[arg(long, default_value = lipsync::DEFAULT_PROMPT)]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = PipelineConfig::from_env().context("failed to load configuration")?;
    tracing::debug!(
        engine = %config.engine_base_url,
        input_dir = %config.input_dir.display(),
        output_dir = %config.output_dir.display(),
        "Loaded configuration",
    );
    let orchestrator = Orchestrator::new(config).context("failed to create orchestrator")?;

    match cli.command {
        Commands::Health => {
            let url = &orchestrator.config().engine_base_url;
            if !orchestrator.engine_alive().await {
                anyhow::bail!("ComfyUI at {url} is not reachable");
            }
            println!("ComfyUI at {url} is up");
        }
        Commands::Transcribe { audio } => {
            let text = orchestrator
                .transcribe(&MediaInput::file(audio))
                .await
                .context("transcription failed")?;
            println!("{text}");
        }
        Commands::Speak { text, voice_style } => {
            let path = orchestrator
                .synthesize_speech(&text, &voice_style)
                .await
                .context("speech synthesis failed")?;
            println!("{}", path.display());
        }
        Commands::Lipsync {
            image,
            audio,
            resolution,
            seed,
            steps,
            prompt,
        } => {
            let request = LipsyncRequest::new(MediaInput::file(image), MediaInput::file(audio))
                .with_resolution(resolution)
                .with_seed(seed)
                .with_steps(steps)
                .with_prompt(prompt);
            let path = orchestrator
                .generate_lipsync(&request)
                .await
                .context("lipsync generation failed")?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(std::io::stderr).boxed()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "comfyfront_worker=debug,comfyfront_pipeline=debug,comfyfront_comfyui=debug".into()
            }),
        )
        .with(fmt_layer)
        .init();
}
