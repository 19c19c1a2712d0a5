mod models;
mod repo;
mod service;
mod utils;

use crate::models::config::{setup_settings, Settings, SettingsOverrides};
use crate::models::config_validator::validate_config;
use crate::models::event::Severity;
use crate::models::outcome::{DatabaseOutcome, DumpOutcome, PruneOutcome};
use crate::repo::sqlite::{EventFilter, SqliteEventLog};
use crate::service::backup::{run_backups, BackupContext};
use crate::service::dump::PgDump;
use crate::service::event_log::ensure_event_source;
use crate::utils::progress::create_progress_bar;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "RustyPgBackUp")]
#[command(about = "Dumps PostgreSQL databases and rotates the archives", long_about = None)]
struct Cli {
    /// Optional JSON file with settings; flags take precedence
    #[arg(short = 'c', long = "config", env = "PGBACKUP_CONFIG", global = true)]
    config_file: Option<PathBuf>,

    #[arg(
        short = 'l',
        long = "log-level",
        default_value = "info",
        env = "LOG_LEVEL",
        global = true
    )]
    log_level: String,

    /// SQLite file holding the application event log
    #[arg(long = "event-log", env = "PGBACKUP_EVENT_LOG", global = true)]
    event_log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump each database and prune expired archives
    Backup(BackupArgs),

    /// Show recent entries from the event log
    Events(EventsArgs),
}

#[derive(Args)]
struct BackupArgs {
    /// Databases to back up, processed in the order given
    #[arg(required = true, num_args = 1..)]
    databases: Vec<String>,

    /// Days an archive is kept after its last access [default: 14]
    #[arg(short = 'r', long = "retention", env = "PGBACKUP_RETENTION_DAYS")]
    retention_days: Option<u32>,

    /// [default: postgres]
    #[arg(short = 'u', long = "user", env = "PGBACKUP_USER")]
    user: Option<String>,

    /// [default: localhost]
    #[arg(short = 'H', long = "host", env = "PGBACKUP_HOST")]
    host: Option<String>,

    /// [default: 5432]
    #[arg(short = 'p', long = "port", env = "PGBACKUP_PORT")]
    port: Option<u16>,

    /// Event source name [default: "Postgres Backup"]
    #[arg(short = 's', long = "source", env = "PGBACKUP_SOURCE")]
    event_source: Option<String>,

    #[arg(long = "pg-dump", env = "PGBACKUP_PG_DUMP")]
    pg_dump_path: Option<PathBuf>,

    /// Directory holding one subdirectory per database [default: .]
    #[arg(short = 'd', long = "backup-root", env = "PGBACKUP_ROOT")]
    backup_root: Option<PathBuf>,

    /// Cron expression (with seconds) for repeated runs
    #[arg(long = "schedule", env = "PGBACKUP_SCHEDULE")]
    schedule: Option<String>,

    /// Run a single pass even when a schedule is configured
    #[arg(short = 'o', long = "once")]
    once: bool,

    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    #[arg(short = 'v', long = "validate-only")]
    validate_only: bool,
}

impl BackupArgs {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            retention_days: self.retention_days,
            user: self.user.clone(),
            host: self.host.clone(),
            port: self.port,
            event_source: self.event_source.clone(),
            pg_dump_path: self.pg_dump_path.clone(),
            backup_root: self.backup_root.clone(),
            event_log_file: None,
            schedule: self.schedule.clone(),
        }
    }
}

#[derive(Args)]
struct EventsArgs {
    /// Only events written under this source
    #[arg(short = 's', long = "source")]
    source: Option<String>,

    /// information or error
    #[arg(long = "level")]
    level: Option<String>,

    #[arg(short = 'n', long = "limit", default_value_t = 20)]
    limit: usize,

    #[arg(long = "json")]
    json: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(&args.log_level);

    let mut settings =
        setup_settings(args.config_file.as_deref()).context("Failed to load configuration")?;
    if let Some(event_log_file) = args.event_log_file {
        settings.event_log_file = event_log_file;
    }

    match args.command {
        Commands::Backup(backup_args) => backup_main(settings, backup_args),
        Commands::Events(events_args) => events_main(&settings, events_args),
    }
}

fn parse_log_level(level: &str) -> log::LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    }
}

fn init_logging(level: &str) {
    env_logger::Builder::from_default_env()
        .filter_level(parse_log_level(level))
        .format_timestamp_secs()
        .init();
}

fn backup_main(mut settings: Settings, args: BackupArgs) -> Result<()> {
    info!("RustyPgBackUp starting...");
    settings.apply(args.overrides());
    debug!("Resolved settings: {:?}", &settings);

    validate_config(&settings, &args.databases).context("Invalid configuration")?;
    if args.validate_only {
        info!("Configuration is valid. Exiting (--validate-only mode).");
        return Ok(());
    }

    let event_log = SqliteEventLog::open(&settings.event_log_file)
        .context("Failed to open the event log")?;
    ensure_event_source(&event_log, &settings.event_source)
        .context("Failed to register the event source")?;

    let dump_tool = PgDump::new(settings.pg_dump_path.clone());
    let ctx = BackupContext {
        settings: &settings,
        event_log: &event_log,
        dump_tool: &dump_tool,
    };

    match settings.schedule.as_deref() {
        Some(schedule) if !args.once => {
            run_scheduled(&ctx, &args.databases, schedule, args.quiet)
        }
        _ => run_once(&ctx, &args.databases, args.quiet),
    }
}

fn run_once(ctx: &BackupContext, databases: &[String], quiet: bool) -> Result<()> {
    let progress = if !quiet {
        Some(create_progress_bar(databases.len() as u64, "Backing up"))
    } else {
        None
    };

    let outcomes = run_backups(ctx, databases, progress.as_ref()).context("Backup run failed")?;

    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }

    log_summary(&outcomes);
    Ok(())
}

fn log_summary(outcomes: &[DatabaseOutcome]) {
    for outcome in outcomes {
        let dump = match &outcome.dump {
            DumpOutcome::Completed { archive, .. } => format!("dumped to {}", archive.display()),
            DumpOutcome::Failed { detail } => format!("dump failed ({})", detail),
        };
        let prune = match outcome.prune {
            PruneOutcome::Deleted { total, deleted } => {
                format!("pruned {} of {} files", deleted, total)
            }
            PruneOutcome::Skipped { total, aged } => {
                format!("kept all {} files ({} expired)", total, aged)
            }
        };
        info!("{}: {}, {}", outcome.database, dump, prune);
    }

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o.dump, DumpOutcome::Failed { .. }))
        .count();
    if failed > 0 {
        warn!(
            "{} of {} dumps failed; see the event log",
            failed,
            outcomes.len()
        );
    } else {
        info!("Backup run completed for {} databases", outcomes.len());
    }
}

fn run_scheduled(
    ctx: &BackupContext,
    databases: &[String],
    schedule_str: &str,
    quiet: bool,
) -> Result<()> {
    use cron::Schedule;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    let schedule = Schedule::from_str(schedule_str).context("Invalid cron expression")?;

    info!(
        "Starting scheduled backup mode with schedule: {}",
        schedule_str
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping scheduler...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    if ctx.settings.run_on_startup {
        info!("Running initial backup on startup...");
        if let Err(e) = run_once(ctx, databases, quiet) {
            warn!("Initial backup failed: {:#}", e);
        }
    }

    while running.load(Ordering::SeqCst) {
        let Some(next) = schedule.upcoming(Local).next() else {
            warn!("No upcoming scheduled times found");
            break;
        };
        info!(
            "Next backup scheduled for: {}",
            next.format("%Y-%m-%d %H:%M:%S %Z")
        );

        // Sleep in short steps so Ctrl+C is noticed promptly.
        while running.load(Ordering::SeqCst) && Local::now() < next {
            std::thread::sleep(std::cmp::min(
                time_until(next),
                Duration::from_secs(1),
            ));
        }

        if running.load(Ordering::SeqCst) {
            info!("Running scheduled backup...");
            if let Err(e) = run_once(ctx, databases, quiet) {
                warn!("Scheduled backup failed: {:#}", e);
            }
        }
    }

    info!("Scheduler stopped");
    Ok(())
}

fn time_until(next: DateTime<Local>) -> std::time::Duration {
    (next - Local::now())
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(0))
}

fn events_main(settings: &Settings, args: EventsArgs) -> Result<()> {
    let severity = match args.level.as_deref() {
        None => None,
        Some(level) => match Severity::parse(level) {
            Some(severity) => Some(severity),
            None => bail!("Unknown level '{}': use information or error", level),
        },
    };

    let event_log = SqliteEventLog::open(&settings.event_log_file)
        .context("Failed to open the event log")?;
    let rows = event_log
        .query_events(&EventFilter {
            source: args.source,
            severity,
            limit: Some(args.limit),
        })
        .context("Failed to read events")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).context("Failed to serialize events")?
        );
        return Ok(());
    }

    if rows.is_empty() {
        println!("No events found");
    }
    for row in rows {
        let when = DateTime::from_timestamp(row.timestamp, 0)
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| row.timestamp.to_string());
        println!(
            "{} {:<11} {} [{}] {}",
            when, row.level, row.event_id, row.source, row.message
        );
    }
    Ok(())
}
