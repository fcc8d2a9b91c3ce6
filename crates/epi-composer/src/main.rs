//! Episode composer binary.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use epi_composer::{ComposerConfig, ComposerError, DefaultComposer};
use epi_models::Script;
use epi_timeline::validate_json_composition;

#[derive(Parser)]
#[command(name = "epi-composer")]
#[command(about = "Compose episode timelines from scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the classified frame totals of a script
    Meta {
        /// Script JSON file
        script: PathBuf,
    },
    /// Compose a script into a frame-exact timeline
    Compose {
        /// Script JSON file
        script: PathBuf,
        /// Target duration in frames
        #[arg(short, long)]
        duration: u64,
        /// Output frame rate (overrides EPI_FPS)
        #[arg(long)]
        fps: Option<f64>,
    },
    /// Suggest where to cut the script for a target duration
    Cuts {
        /// Script JSON file
        script: PathBuf,
        /// Target duration in frames
        #[arg(short, long)]
        duration: u64,
    },
    /// Validate a stored composition
    Validate {
        /// Composition JSON file
        composition: PathBuf,
        /// Expected duration in frames
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Clear the persisted metadata cache
    ClearCache,
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("epi=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

async fn read_script(path: &Path) -> anyhow::Result<Script> {
    let script: Script = read_json(path).await?;
    script
        .validate()
        .with_context(|| format!("invalid script {}", path.display()))?;
    Ok(script)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fail(err: &ComposerError, target: u64) -> ! {
    match err.remediation(target) {
        Some(remediation) => eprintln!("error: {}\nhint: {}", err, remediation),
        None => eprintln!("error: {}", err),
    }
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let mut config = ComposerConfig::from_env();
    if let Commands::Compose { fps: Some(fps), .. } = &cli.command {
        config.fps = *fps;
    }

    match cli.command {
        Commands::Validate {
            composition,
            duration,
        } => {
            let value: serde_json::Value = read_json(&composition).await?;
            let violations: Vec<String> = validate_json_composition(&value, duration)
                .iter()
                .map(|v| v.to_string())
                .collect();
            print_json(&violations)?;
            if !violations.is_empty() {
                std::process::exit(1);
            }
        }
        Commands::Meta { script } => {
            let script = read_script(&script).await?;
            let composer = DefaultComposer::from_config(config).await?;
            let meta = composer.episode_meta(&script).await?;
            print_json(&meta.totals)?;
        }
        Commands::Compose {
            script, duration, ..
        } => {
            let script = read_script(&script).await?;
            let composer = DefaultComposer::from_config(config).await?;
            match composer.compose(&script, duration).await {
                Ok(composed) => {
                    info!(
                        required_rate = composed.solution.acceleration.required_rate,
                        "Composition ready"
                    );
                    print_json(&composed.composition)?;
                }
                Err(e) => {
                    error!("Composition failed: {}", e);
                    fail(&e, duration);
                }
            }
        }
        Commands::Cuts { script, duration } => {
            let script = read_script(&script).await?;
            let composer = DefaultComposer::from_config(config).await?;
            match composer.suggest_cuts(&script, duration).await {
                Ok(cuts) => print_json(&cuts)?,
                Err(e) => fail(&e, duration),
            }
        }
        Commands::ClearCache => {
            let composer = DefaultComposer::from_config(config).await?;
            composer.clear_caches().await?;
            if let Some(path) = composer.cache().path() {
                info!(path = %path.display(), "Metadata cache cleared");
            }
        }
    }

    Ok(())
}
