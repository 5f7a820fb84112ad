//! Parlance CLI entry point.
//!
//! Provides `classify`, `diagnose`, `patterns`, and `report` subcommands
//! over the built-in or configured pattern set. No model is wired in, so
//! inputs that reach the model tier come back degraded.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, warn};

use parlance::classifier::{ClassificationContext, UrgencyLevel};
use parlance::config::ParlanceConfig;
use parlance::IntentService;

/// Parlance: tiered intent classifier.
#[derive(Parser)]
#[command(name = "parlance", version, about)]
struct Cli {
    /// Config file (overrides `PARLANCE_CONFIG`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write JSON logs to this directory (overrides `PARLANCE_LOG_DIR`).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Write JSON logs to `~/.parlance/logs`.
    #[arg(long, global = true, conflicts_with = "log_dir")]
    log_file: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Classify one utterance and print the result as JSON.
    Classify {
        /// Utterance to classify.
        text: String,
        /// The utterance continues an ongoing conversation.
        #[arg(long)]
        prior_turn: bool,
        /// Known entity name (repeatable).
        #[arg(long = "entity")]
        entities: Vec<String>,
        /// Speaker identifier.
        #[arg(long)]
        speaker: Option<String>,
        /// Room the utterance came from.
        #[arg(long)]
        room: Option<String>,
        /// Caller-asserted urgency.
        #[arg(long, value_enum)]
        urgency: Option<UrgencyArg>,
    },
    /// Explain how every pattern fares against an utterance.
    Diagnose {
        /// Utterance to diagnose.
        text: String,
        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Inspect the loaded patterns.
    Patterns {
        /// Pattern subcommand.
        #[command(subcommand)]
        action: PatternsCommand,
    },
    /// Classify one utterance per line of a file and print the health report.
    Report {
        /// File with one utterance per line.
        file: PathBuf,
    },
}

/// Pattern inspection subcommands.
#[derive(Subcommand)]
enum PatternsCommand {
    /// List groups with total and enabled counts.
    List,
    /// Print one pattern definition as JSON.
    Show {
        /// Group name.
        group: String,
        /// Pattern name.
        name: String,
    },
    /// Check that every pattern matches its own examples.
    Check,
}

/// Urgency levels accepted on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum UrgencyArg {
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl From<UrgencyArg> for UrgencyLevel {
    fn from(value: UrgencyArg) -> Self {
        match value {
            UrgencyArg::None => Self::None,
            UrgencyArg::Low => Self::Low,
            UrgencyArg::Medium => Self::Medium,
            UrgencyArg::High => Self::High,
            UrgencyArg::Critical => Self::Critical,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut logging = parlance::logging::LoggingOptions::from_env();
    if let Some(dir) = &cli.log_dir {
        logging.dir = Some(dir.clone());
    } else if cli.log_file {
        logging.dir = Some(parlance::logging::default_logs_dir()?);
    }
    let _logging_guard = parlance::logging::init(&logging)?;

    let config = load_config(cli.config.as_deref())?;
    let service = IntentService::from_config(&config).context("failed to start service")?;

    match cli.command {
        Command::Classify {
            text,
            prior_turn,
            entities,
            speaker,
            room,
            urgency,
        } => {
            let context = ClassificationContext {
                prior_turn,
                entity_names: entities,
                speaker,
                room,
                urgency_hint: urgency.map(UrgencyLevel::from),
            };
            handle_classify(&service, &text, context).await
        }
        Command::Diagnose { text, json } => handle_diagnose(&service, &text, json),
        Command::Patterns { action } => handle_patterns(&service, action),
        Command::Report { file } => handle_report(&service, &file).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<ParlanceConfig> {
    match path {
        Some(path) => {
            let mut config = ParlanceConfig::load_from(path)?;
            config.apply_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => ParlanceConfig::load(),
    }
}

async fn handle_classify(
    service: &IntentService,
    text: &str,
    context: ClassificationContext,
) -> anyhow::Result<()> {
    let result = service
        .classify(text, context)
        .await
        .context("invalid classification context")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn handle_diagnose(service: &IntentService, text: &str, json: bool) -> anyhow::Result<()> {
    let report = service.diagnose(text);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.summary());
    }
    Ok(())
}

fn handle_patterns(service: &IntentService, action: PatternsCommand) -> anyhow::Result<()> {
    match action {
        PatternsCommand::List => {
            for stats in service.store().stats() {
                println!("{}\t{}\t{} enabled", stats.group, stats.total, stats.enabled);
            }
            Ok(())
        }
        PatternsCommand::Show { group, name } => {
            let definition = service
                .get_pattern(&group, &name)
                .with_context(|| format!("no pattern {group}.{name}"))?;
            println!("{}", serde_json::to_string_pretty(&definition)?);
            Ok(())
        }
        PatternsCommand::Check => {
            let failures = service.store().verify_examples();
            for failure in &failures {
                println!(
                    "{}.{}: example {:?} does not match",
                    failure.group, failure.name, failure.example
                );
            }
            if failures.is_empty() {
                println!("all pattern examples match");
                Ok(())
            } else {
                anyhow::bail!("{} pattern example(s) failed", failures.len())
            }
        }
    }
}

async fn handle_report(service: &IntentService, file: &std::path::Path) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let mut classified: usize = 0;
    for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match service.classify(line, ClassificationContext::default()).await {
            Ok(_) => classified = classified.saturating_add(1),
            Err(e) => warn!(line, error = %e, "skipping line"),
        }
    }
    debug!(classified, "report input processed");
    println!("{}", serde_json::to_string_pretty(&service.health_report())?);
    Ok(())
}
