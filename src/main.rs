use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::{debug, warn};

use readyrs::config::{StorageBackend, CONFIG_KEYS};
use readyrs::export::{self, ExportFormat};
use readyrs::logging::init_logging;
use readyrs::{
    AppConfig, BaselinePhase, Classifier, Clock, Command, Energy, Evaluation, Followed, HrvSource,
    HrvSourceKind, ReadyError, SessionState, WriteBehind,
};

/// ReadyRS - daily readiness from HRV
///
/// Compares today's heart-rate-variability reading against a rolling,
/// outlier-resistant personal baseline and issues one training command:
/// REST, BUILD or PERFORM.
#[derive(Parser)]
#[command(name = "readyrs")]
#[command(version)]
#[command(about = "HRV readiness tracker", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Treat this date as today (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", global = true)]
    today: Option<NaiveDate>,

    /// Override the configured storage backend (file, sqlite, memory)
    #[arg(long, value_name = "BACKEND", global = true)]
    store: Option<StorageBackend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit today's HRV reading and get a command
    Submit {
        /// HRV in milliseconds
        value: String,
    },

    /// Add or correct the reading for a past day
    Add {
        /// HRV in milliseconds
        value: String,

        #[arg(short, long)]
        date: NaiveDate,
    },

    /// Remove the reading for a day
    Remove {
        #[arg(short, long)]
        date: NaiveDate,
    },

    /// Show today's command, pending questions and the baseline window
    Status,

    /// Report whether you followed a command (defaults to yesterday's)
    Followed {
        answer: Followed,

        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Report your energy level (defaults to today)
    Energy {
        level: Energy,

        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// Show or update your name and HRV source
    Profile {
        #[arg(short, long)]
        name: Option<String>,

        /// whoop, apple, oura, garmin, welltory or other
        #[arg(short, long)]
        source: Option<HrvSourceKind>,

        /// Label for an `other` source
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Export history and compliance log
    Export {
        /// Output file path (defaults to readyrs_hrv_<name>_<date>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short = 'f', long, default_value = "csv")]
        format: ExportFormat,
    },

    /// Empty history and compliance log, keep the profile
    Clear,

    /// Delete all saved data
    Reset,

    /// Manage configuration
    Config {
        /// List all configuration options
        #[arg(short, long)]
        list: bool,

        /// Set configuration value (key=value)
        #[arg(short, long)]
        set: Option<String>,

        /// Get configuration value
        #[arg(short, long)]
        get: Option<String>,
    },
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "HRV (ms)")]
    hrv: String,
    #[tabled(rename = "Command")]
    command: String,
    #[tabled(rename = "Followed")]
    followed: String,
    #[tabled(rename = "Energy")]
    energy: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(AppConfig::default_config_path);
    let (mut config, config_error) = match AppConfig::try_load(&config_path) {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    let mut log_config = config.logging.clone();
    log_config.level = log_config.level.more_verbose(cli.verbose);
    if let Err(e) = init_logging(&log_config) {
        eprintln!("{}", format!("Logging disabled: {}", e).dimmed());
    }

    match &config_error {
        Some(e) => warn!(
            path = %config_path.display(),
            error = %format!("{:#}", e),
            "Invalid config, using defaults"
        ),
        None => debug!(path = %config_path.display(), "Configuration loaded"),
    }

    if let Commands::Config { list, set, get } = &cli.command {
        return run_config(&config, &config_path, *list, set.as_deref(), get.as_deref());
    }

    if let Some(backend) = cli.store {
        config.storage.backend = backend;
    }

    let classifier = config.classifier()?;
    let today = cli.today.unwrap_or_else(|| config.clock().today());
    let store = config.session_store()?;
    debug!(?store, backend = %config.storage.backend, %today, "Session store ready");

    let writer = WriteBehind::spawn(store.backend(), store.key());

    if let Commands::Reset = cli.command {
        writer.delete();
        let stats = writer.shutdown().await;
        debug!(?stats, "Writer finished");
        println!("{}", "✓ All saved data deleted".yellow().bold());
        return Ok(());
    }

    let mut state = store.load();
    let loaded = state.clone();
    state.refresh_today(&classifier, today);

    let outcome = run_command(cli.command, &mut state, &classifier, today);

    if state != loaded {
        writer.save(&state);
    }
    let stats = writer.shutdown().await;
    debug!(?stats, "Writer finished");

    outcome
}

fn run_command(
    command: Commands,
    state: &mut SessionState,
    classifier: &Classifier,
    today: NaiveDate,
) -> Result<()> {
    match command {
        Commands::Submit { value } => {
            let value = parse_reading(&value)?;
            let evaluation = state
                .submit_reading(classifier, today, value)
                .map_err(user_error)?;
            print_evaluation(&evaluation, classifier);
            print_progress(state, classifier);
        }

        Commands::Add { value, date } => {
            let value = parse_reading(&value)?;
            let refreshed = state
                .backfill_reading(classifier, date, value, today)
                .map_err(user_error)?;
            println!("{}", format!("✓ Reading for {} saved: {} ms", date, value).green());
            if let Some(evaluation) = refreshed {
                println!("  Today's command is now {}", colorize(evaluation.command()));
            }
        }

        Commands::Remove { date } => {
            let (removed, refreshed) = state.remove_reading(classifier, date, today);
            match removed {
                Some(reading) => println!(
                    "{}",
                    format!("✓ Removed reading for {} ({} ms)", reading.date, reading.value).green()
                ),
                None => println!("{}", format!("No reading stored for {}", date).yellow()),
            }
            if let Some(evaluation) = refreshed {
                println!("  Today's command is now {}", colorize(evaluation.command()));
            }
        }

        Commands::Status => print_status(state, classifier, today),

        Commands::Followed { answer, date } => {
            let date = match date {
                Some(date) => date,
                None => today.pred_opt().context("No day before today")?,
            };
            if state.record_followed(date, answer) {
                println!("{}", format!("✓ Recorded '{}' for {}", answer, date).green());
            } else {
                println!("{}", format!("No command was issued on {}", date).yellow());
            }
        }

        Commands::Energy { level, date } => {
            let date = date.unwrap_or(today);
            if state.record_energy(date, level) {
                println!("{}", format!("✓ Energy '{}' recorded for {}", level, date).green());
            } else {
                println!("{}", format!("No command was issued on {}", date).yellow());
            }
        }

        Commands::Profile {
            name,
            source,
            label,
        } => {
            if let Some(name) = name {
                state.set_user_name(name);
            }
            if let Some(kind) = source {
                state.set_source(Some(HrvSource::new(kind, label)));
            }
            println!("{}", "Profile".cyan().bold());
            let name = if state.user_name.is_empty() {
                "(not set)"
            } else {
                state.user_name.as_str()
            };
            println!("  Name:   {}", name);
            match &state.source {
                Some(source) => println!("  Source: {}", source.label),
                None => println!("  Source: (not set)"),
            }
        }

        Commands::Export { output, format } => {
            let output = output.unwrap_or_else(|| {
                PathBuf::from(export::default_file_name(&state.user_name, today, format))
            });
            export::export_state(state, format, &output)
                .with_context(|| format!("Failed to export to {}", output.display()))?;
            println!(
                "{}",
                format!("✓ Exported {} days to {}", export::day_records(state).len(), output.display())
                    .green()
            );
        }

        Commands::Clear => {
            state.clear();
            println!("{}", "✓ History and compliance log cleared".yellow().bold());
        }

        // Handled before the session is loaded
        Commands::Reset | Commands::Config { .. } => {}
    }

    Ok(())
}

fn parse_reading(input: &str) -> Result<f64> {
    input
        .trim()
        .parse::<f64>()
        .map_err(|_| user_error(ReadyError::invalid_reading(input)))
}

fn user_error(e: ReadyError) -> anyhow::Error {
    anyhow::anyhow!(e.user_message())
}

fn colorize(command: Command) -> ColoredString {
    match command {
        Command::Rest => command.as_str().red().bold(),
        Command::Build => command.as_str().yellow().bold(),
        Command::Perform => command.as_str().green().bold(),
        Command::Learning => command.as_str().blue().bold(),
    }
}

fn print_evaluation(evaluation: &Evaluation, classifier: &Classifier) {
    let command = evaluation.command();
    let prescription = command.prescription();

    println!();
    println!("  {}", colorize(command));
    println!("  {}", prescription.prescription);
    for line in prescription.guidance {
        println!("    • {}", line);
    }

    if let Some(days) = evaluation.days_needed() {
        println!();
        println!(
            "  {}",
            format!("Learning your baseline: {} more day{} needed", days, plural(days)).blue()
        );
        return;
    }

    if let (Some(stats), Some(z)) = (evaluation.stats(), evaluation.z_score()) {
        let t = classifier.thresholds();
        let (low, high) = stats.build_range(t.rest, t.perform);
        println!();
        println!("  Baseline: {:.1} ms   MAD: {:.1}   z: {:+.2}", stats.median, stats.mad, z);
        println!("  BUILD range: {}-{} ms", low, high);
    }

    if let Some(days) = evaluation.days_until_full().filter(|_| evaluation.is_preview()) {
        println!(
            "  {}",
            format!(
                "Preview: {} more day{} for full accuracy",
                days,
                plural(days)
            )
            .dimmed()
        );
    }
}

fn print_progress(state: &SessionState, classifier: &Classifier) {
    let progress = state.baseline_progress_for(classifier);
    let text = format!(
        "Baseline {}/{}: {}",
        progress.count,
        progress.capacity,
        progress.message()
    );
    match progress.phase {
        BaselinePhase::Full => println!("  {}", text.green()),
        _ => println!("  {}", text.dimmed()),
    }
}

fn print_status(state: &SessionState, classifier: &Classifier, today: NaiveDate) {
    println!("{}", format!("Status for {}", today).cyan().bold());

    match state.evaluate_today(classifier, today) {
        Some(evaluation) => print_evaluation(&evaluation, classifier),
        None => println!("  No reading yet today. Run `readyrs submit <ms>`."),
    }

    if let Some(entry) = state.pending_compliance(today) {
        println!(
            "  {} Did you follow {} on {}? Run `readyrs followed yes|partial|no`.",
            "?".yellow().bold(),
            colorize(entry.command),
            entry.date
        );
    }
    if state.pending_energy(today).is_some() {
        println!(
            "  {} How is your energy today? Run `readyrs energy low|normal|high|skipped`.",
            "?".yellow().bold()
        );
    }

    println!();
    print_progress(state, classifier);

    if state.history.is_empty() {
        return;
    }

    let rows: Vec<HistoryRow> = export::day_records(state)
        .into_iter()
        .rev()
        .map(|record| HistoryRow {
            date: record.date.to_string(),
            hrv: record.hrv.map_or("-".to_string(), |v| v.to_string()),
            command: record.command.map_or("-".to_string(), |c| c.to_string()),
            followed: record.followed.map_or("-".to_string(), |f| f.to_string()),
            energy: record.energy.map_or("-".to_string(), |e| e.to_string()),
        })
        .collect();

    println!();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn run_config(
    config: &AppConfig,
    config_path: &Path,
    list: bool,
    set: Option<&str>,
    get: Option<&str>,
) -> Result<()> {
    if let Some(key_value) = set {
        let (key, value) = key_value
            .split_once('=')
            .with_context(|| format!("Expected key=value, got {}", key_value))?;
        AppConfig::update_file(config_path, key.trim(), value.trim())?;
        println!("{}", format!("✓ {} = {}", key.trim(), value.trim()).green());
    } else if let Some(key) = get {
        println!("{}", config.get_value(key)?);
    } else if list {
        println!("{}", format!("Configuration ({})", config_path.display()).cyan().bold());
        for key in CONFIG_KEYS {
            println!("  {} = {}", key, config.get_value(key)?);
        }
    } else {
        println!("Use --list, --get <key> or --set <key=value>");
    }
    Ok(())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}
