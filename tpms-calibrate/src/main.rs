use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tpms_core::{
    Batch, CalibrationConfig, Evaluation, Hypothesis, RuleFamily, RuleRegistry, evaluate, render,
    render_measurements, render_no_conclusion,
};
use tpms_calibrate::{BatchFile, Config, Overrides};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tpms-calibrate")]
#[command(about = "Find which bytes of a captured sensor frame encode a known value, and at what scale")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "tpms-calibrate.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Test every extraction rule against a batch and rank scale hypotheses
    Analyze {
        /// Batch file with [[measurement]] tables
        batch: PathBuf,

        #[command(flatten)]
        overrides: Overrides,

        /// Also write the full evaluation as JSON to stdout
        #[arg(long)]
        json: bool,
    },
    /// Parse a batch and dump its frames
    Parse {
        /// Batch file with [[measurement]] tables
        batch: PathBuf,
    },
    /// List the extraction rules enumerated for a frame length
    Rules {
        #[arg(long)]
        frame_len: usize,

        /// Rule family to enumerate; repeatable, defaults to the configured families
        #[arg(long = "family")]
        families: Vec<RuleFamily>,
    },
}

#[derive(Serialize)]
struct JsonReport<'a> {
    evaluation: &'a Evaluation,
    ranked: Vec<Hypothesis<'a>>,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "tpms_calibrate=warn,tpms_core=warn".to_owned());
    // logs share stderr with the report, so keep them free of timestamps and colour
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };

    match cli.command {
        Command::Analyze {
            batch,
            overrides,
            json,
        } => analyze(&batch, &config.calibration(&overrides), json),
        Command::Parse { batch } => {
            let Some(batch) = load_batch(&batch)? else {
                return Ok(());
            };
            eprint!("{}", render_measurements(&batch));
            Ok(())
        }
        Command::Rules {
            frame_len,
            families,
        } => {
            let registry = if families.is_empty() {
                RuleRegistry::with_families(config.rules.families.iter().copied())
            } else {
                RuleRegistry::with_families(families)
            };
            for rule in registry.rules(frame_len) {
                println!("{rule}");
            }
            Ok(())
        }
    }
}

/// Loads and validates a batch. `None` means the file holds no measurements.
fn load_batch(path: &Path) -> color_eyre::Result<Option<Batch>> {
    info!(path = ?path, "Loading batch");

    match BatchFile::load(path)?.into_batch() {
        Ok(batch) => {
            info!(
                measurements = batch.len(),
                frame_len = batch.frame_len(),
                "Batch loaded"
            );
            Ok(Some(batch))
        }
        Err(err) if err.is_no_conclusion() => {
            warn!(%err, "Nothing to analyze");
            eprintln!("NO CONCLUSION: {err}");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn analyze(path: &Path, calibration: &CalibrationConfig, json: bool) -> color_eyre::Result<()> {
    let Some(batch) = load_batch(path)? else {
        return Ok(());
    };

    let evaluation = match evaluate(&batch, calibration) {
        Ok(evaluation) => evaluation,
        Err(err) if err.is_no_conclusion() => {
            warn!(%err, "Calibration cannot proceed");
            eprint!("{}", render_no_conclusion(&batch, &err));
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let ranked = evaluation.ranked();
    info!(
        rules = evaluation.rules.len(),
        discriminating = evaluation.discriminating_count(),
        hypotheses = ranked.len(),
        "Analysis complete"
    );
    if let Some(best) = ranked.first() {
        info!(
            rule = %best.rule,
            scale = best.fit.scale,
            total_error = best.fit.total_error,
            "Best hypothesis"
        );
    }

    eprint!("{}", render(&batch, &evaluation));

    if json {
        let report = JsonReport {
            evaluation: &evaluation,
            ranked,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
