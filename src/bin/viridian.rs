#![forbid(unsafe_code)]
//! Command-line front end for a local Viridian ledger

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use viridian::config::{load_config_from, Config};
use viridian::factory::Factory;
use viridian::model::{Organization, Person, User};
use viridian::notify::{LogNotifier, VerificationDispatcher};
use viridian::persistence::{Database, RecordKey, RecordStore};
use viridian::runtime::{add_participant as insert_participant, load_history, Runtime};
use viridian::transaction::Transaction;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ParticipantKind {
    User,
    Person,
    Organization,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates the ledger database
    Init,
    /// Adds a participant from a JSON file
    AddParticipant {
        #[arg(value_enum)]
        kind: ParticipantKind,
        file: PathBuf,
    },
    /// Submits a transaction from a JSON file
    Submit { file: PathBuf },
    /// Prints one record, e.g. `show Person alice`
    Show { record_type: String, id: String },
    /// Lists record identifiers of one type
    List { record_type: String },
    /// Prints committed transactions
    History,
    /// Sends pending verification emails
    Dispatch,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let config = load_config_from(&cli.config)?;

    match &cli.command {
        Commands::Init => {
            open_store(&config)?;
            println!(
                "{} {}",
                "Ledger ready at".bright_green(),
                config.database.path.bright_white()
            );
        }
        Commands::AddParticipant { kind, file } => add_participant(&config, *kind, file)?,
        Commands::Submit { file } => submit(&config, file)?,
        Commands::Show { record_type, id } => show(&config, record_type, id)?,
        Commands::List { record_type } => list(&config, record_type)?,
        Commands::History => history(&config)?,
        Commands::Dispatch => dispatch(&config)?,
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>, Box<dyn std::error::Error>> {
    let path = Path::new(&config.database.path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Arc::new(Database::open(&config.database.path)?))
}

fn factory(config: &Config) -> Factory {
    Factory::new(config.network.namespace.clone())
}

fn add_participant(
    config: &Config,
    kind: ParticipantKind,
    file: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(file)?;
    let store = open_store(config)?;
    let factory = factory(config);

    let id = match kind {
        ParticipantKind::User => {
            let user: User = serde_json::from_str(&json)?;
            insert_participant(store.as_ref(), &factory, &user)?;
            user.name
        }
        ParticipantKind::Person => {
            let person: Person = serde_json::from_str(&json)?;
            insert_participant(store.as_ref(), &factory, &person)?;
            person.user.name
        }
        ParticipantKind::Organization => {
            let org: Organization = serde_json::from_str(&json)?;
            insert_participant(store.as_ref(), &factory, &org)?;
            org.user.name
        }
    };

    println!("{} {}", "Participant added:".bright_green(), id.bright_white());
    Ok(())
}

fn submit(config: &Config, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let tx: Transaction = serde_json::from_str(&std::fs::read_to_string(file)?)?;
    let runtime = Runtime::from_config(config)?;

    match runtime.submit(&tx) {
        Ok(receipt) => {
            println!(
                "{} {} ({})",
                "Committed".bright_green().bold(),
                receipt.transaction_id.bright_white(),
                receipt.transaction_type
            );
            for uri in &receipt.created {
                println!("  {} {}", "+".bright_green(), uri);
            }
            for uri in &receipt.updated {
                println!("  {} {}", "~".bright_yellow(), uri);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "Rejected:".bright_red().bold(), e);
            Err(e.into())
        }
    }
}

fn show(config: &Config, record_type: &str, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let key = RecordKey::new(format!("{}.{}", config.network.namespace, record_type), id);

    match store.get(&key)? {
        Some(record) => {
            let value: serde_json::Value = serde_json::from_str(&record.data)?;
            println!("{} (version {})", key.to_uri().bright_cyan(), record.version);
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        None => println!("{} {}", "Not found:".yellow(), key.to_uri()),
    }
    Ok(())
}

fn list(config: &Config, record_type: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let qualified = format!("{}.{}", config.network.namespace, record_type);
    let records = store.list(&qualified)?;

    if records.is_empty() {
        println!("{}", format!("No {} records.", record_type).yellow());
    }
    for (id, record) in records {
        println!("{} {} (v{})", "•".bright_yellow(), id.bright_white(), record.version);
    }
    Ok(())
}

fn history(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let records = load_history(store.as_ref(), &factory(config))?;
    if records.is_empty() {
        println!("{}", "No transactions committed yet.".yellow());
    }
    for record in records {
        println!(
            "{} {} {} ({} created, {} updated)",
            record.timestamp.to_rfc3339().bright_black(),
            record.transaction_type.bright_cyan(),
            record.transaction_id.bright_white(),
            record.created.len(),
            record.updated.len()
        );
    }
    Ok(())
}

fn dispatch(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let notifier = Arc::new(LogNotifier::new(config.notifications.sender.clone()));
    let dispatcher = VerificationDispatcher::new(store, factory(config), notifier);

    let report = dispatcher.dispatch_pending(Utc::now())?;
    println!(
        "{} sent {}, skipped {}, failed {}",
        "Verification notices:".bright_cyan(),
        report.sent.to_string().bright_green(),
        report.skipped,
        report.failed.to_string().bright_red()
    );
    Ok(())
}
