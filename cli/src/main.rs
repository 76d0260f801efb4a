//! skirmish - replay combat telemetry captures through the session detector
//! and rate engines.
//!
//! Usage:
//!   skirmish replay <capture.jsonl | -> [--scope player|group] [--json]
//!   skirmish config [--write]
//!
//! Logging goes to stderr and follows `RUST_LOG` (default `info`).

mod capture;
mod replay;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use skirmish_core::engine::ConsumerScope;
use skirmish_core::{default_config_path, load_or_default, save_config};
use skirmish_types::PipelineConfig;
use skirmish_types::formatting::{format_duration, format_rate, format_share, format_total};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::filter::EnvFilter;

use crate::capture::parse_line;
use crate::replay::{Replay, SessionReport};

#[derive(Parser)]
#[command(version, about = "Replay combat telemetry captures")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a JSON-lines capture through the pipeline
    Replay {
        /// Capture file, or `-` for stdin
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = Scope::Player)]
        scope: Scope,
        /// One JSON report per line instead of a table
        #[arg(long)]
        json: bool,
        /// Use `.` for thousands and `,` for decimals
        #[arg(long)]
        european: bool,
        /// Stop at the first malformed line instead of skipping it
        #[arg(long)]
        strict: bool,
    },
    /// Print the effective config as TOML
    Config {
        /// Write the effective config back to the config path
        #[arg(long)]
        write: bool,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scope {
    Player,
    Group,
}

impl From<Scope> for ConsumerScope {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Player => ConsumerScope::Player,
            Scope::Group => ConsumerScope::Group,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), String> {
    init_logging();
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(default_config_path);
    let config = match &config_path {
        Some(path) => load_or_default(path).map_err(|e| e.to_string())?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Replay {
            path,
            scope,
            json,
            european,
            strict,
        } => {
            let reader = open_capture(&path).await?;
            let options = PrintOptions { json, european };
            run_replay(reader, &config, scope.into(), strict, &options).await
        }
        Commands::Config { write } => {
            let text = toml::to_string_pretty(&config).map_err(|e| e.to_string())?;
            println!("{text}");
            if write {
                let path = config_path.ok_or("no config directory available")?;
                save_config(&path, &config).map_err(|e| e.to_string())?;
                eprintln!("wrote {}", path.display());
            }
            Ok(())
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_capture(path: &Path) -> Result<Box<dyn AsyncBufRead + Unpin>, String> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

async fn run_replay(
    reader: Box<dyn AsyncBufRead + Unpin>,
    config: &PipelineConfig,
    scope: ConsumerScope,
    strict: bool,
    options: &PrintOptions,
) -> Result<(), String> {
    let mut replay = Replay::new(config, scope);
    let mut lines = reader.lines();
    let mut number = 0;
    let mut skipped = 0;

    while let Some(text) = lines.next_line().await.map_err(|e| e.to_string())? {
        number += 1;
        match parse_line(number, &text) {
            Ok(Some(line)) => {
                for report in replay.apply(line) {
                    print_report(&report, options)?;
                }
            }
            Ok(None) => {}
            Err(err) if strict => return Err(err.to_string()),
            Err(err) => {
                skipped += 1;
                tracing::warn!("[REPLAY] skipping {}", err);
            }
        }
    }

    for report in replay.finish() {
        print_report(&report, options)?;
    }

    let stats = replay.pipeline().detector().stats();
    tracing::info!(
        "[REPLAY] {} lines applied, {} skipped; {} sessions stored, {} discarded",
        replay.applied(),
        skipped,
        stats.sessions_stored,
        stats.sessions_discarded
    );
    Ok(())
}

struct PrintOptions {
    json: bool,
    european: bool,
}

fn print_report(report: &SessionReport, options: &PrintOptions) -> Result<(), String> {
    if options.json {
        let line = serde_json::to_string(report).map_err(|e| e.to_string())?;
        println!("{line}");
        return Ok(());
    }

    let eu = options.european;
    let s = &report.summary;
    println!(
        "Session {} | {} | {} | {} events in {} segments",
        s.hash,
        s.zone,
        format_duration(s.duration),
        s.event_count,
        s.segment_count
    );
    println!(
        "  DPS {} (peak {})   HPS {} (peak {})",
        format_rate(report.damage.value, eu),
        format_rate(report.damage.peak, eu),
        format_rate(report.healing.value, eu),
        format_rate(report.healing.peak, eu),
    );
    println!(
        "  {:<20} {:>12} {:>8} {:>8} {:>12} {:>8}",
        "Source", "Damage", "Share", "DPS", "Healing", "HPS"
    );
    for source in &s.sources {
        println!(
            "  {:<20} {:>12} {:>8} {:>8} {:>12} {:>8}",
            source.name,
            format_total(source.damage.round() as i64, eu),
            format_share(source.damage, s.total_damage, eu),
            format_rate(source.dps, eu),
            format_total(source.healing.round() as i64, eu),
            format_rate(source.hps, eu),
        );
    }
    println!();
    Ok(())
}
