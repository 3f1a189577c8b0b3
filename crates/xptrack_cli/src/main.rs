//! Tracker inspection CLI.
//!
//! # Responsibility
//! - Probe `xptrack_core` linkage (`ping`).
//! - Inspect and prune a tracker database without touching the upstream
//!   source: list characters, show one history, remove one character.

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use xptrack_core::{
    init_from_config, open_db, AcquisitionError, CharacterDetail, CharacterRecord,
    CharacterSnapshotInput, CharacterSource, ConfigError, Database, DbError, LoggingError,
    TrackerConfig, TrackerError, TrackerService,
};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error("cannot open `{}`: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: DbError,
    },
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("cannot encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_invalid",
            Self::Logging(_) => "logging_init_failed",
            Self::Open { .. } => "db_open_failed",
            Self::Tracker(err) => err.code(),
            Self::Json(_) => "json_encode_failed",
        }
    }
}

/// Source for a read-only host: every acquisition is refused.
struct OfflineSource;

#[async_trait]
impl CharacterSource for OfflineSource {
    async fn acquire(
        &self,
        _name: &str,
        _world: &str,
    ) -> Result<CharacterSnapshotInput, AcquisitionError> {
        Err(AcquisitionError::Unavailable(
            "the CLI has no acquisition source".to_string(),
        ))
    }
}

#[derive(Debug, Parser)]
#[command(name = "xptrack", version, about = "Inspect a character progression database")]
struct Cli {
    /// Database file. Defaults to $XPTRACK_DB_PATH or a temp-dir file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Absolute directory for rolling log files.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core ping and version.
    Ping,
    /// List tracked characters.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one character with metrics and recent history.
    Show {
        id: Uuid,
        /// History window in days. Defaults to $XPTRACK_HISTORY_DAYS or 30.
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Stop tracking a character and erase its history.
    Remove { id: Uuid },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(
                "event=cli_exit module=cli status=error error_code={} error={err}",
                err.code()
            );
            eprintln!("xptrack: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Command::Ping = cli.command {
        println!("xptrack_core ping={}", xptrack_core::ping());
        println!("xptrack_core version={}", xptrack_core::core_version());
        return Ok(());
    }

    let mut config = TrackerConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(log_dir) = cli.log_dir {
        config.log.dir = Some(log_dir);
    }
    init_from_config(&config.log)?;

    let conn = open_db(&config.db_path).map_err(|source| CliError::Open {
        path: config.db_path.clone(),
        source,
    })?;
    let service = TrackerService::with_config(
        Database::new(conn),
        Arc::new(OfflineSource),
        &config,
    );

    match cli.command {
        Command::Ping => Ok(()),
        Command::List { json } => {
            let records = service.list_characters()?;
            if json {
                print_json(&records)
            } else {
                records.iter().for_each(print_record_line);
                Ok(())
            }
        }
        Command::Show { id, days, json } => {
            let detail = service.character_detail(id)?;
            let window = service.character_history(id, days)?;
            if json {
                print_json(&CharacterDetail {
                    history: window,
                    ..detail
                })
            } else {
                print_detail(&detail, &window);
                Ok(())
            }
        }
        Command::Remove { id } => {
            service.remove_character(id)?;
            println!("removed {id}");
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}

fn print_record_line(record: &CharacterRecord) {
    println!(
        "{}  {:<24} {:<12} lvl {:>4}  exp {:>14}  {}",
        record.id,
        record.name,
        record.world,
        record.level(),
        format_number(record.experience()),
        record.last_updated().format("%Y-%m-%d %H:%M")
    );
}

fn print_detail(detail: &CharacterDetail, window: &[xptrack_core::CharacterSnapshot]) {
    print_record_line(&detail.record);
    println!(
        "daily exp {}  total levels {:+}  total exp {:+}",
        format_number(detail.metrics.daily_experience),
        detail.metrics.total.level,
        detail.metrics.total.experience
    );
    for snapshot in window {
        println!(
            "  {}  lvl {:>4}  exp {:>14}  deaths {}",
            snapshot.observed_at.format("%Y-%m-%d %H:%M"),
            snapshot.level,
            format_number(snapshot.experience),
            snapshot.deaths
        );
    }
}

/// Groups digits by thousands with `.`, as the game site displays them.
fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    grouped
}
