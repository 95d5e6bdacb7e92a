//! Mill Ledger CLI
//!
//! Imports DO sheets and reports remaining lifting against the PostgreSQL
//! ledger.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use mill_ledger::ingest::{ingest_file, Candidate, Ingestion};
use mill_ledger::store::LedgerStore;
use mill_ledger::{BulkCommitCoordinator, DoBalance, DoKey, LedgerConfig, LiftingFilter, PgLedgerStore};

#[derive(Parser, Debug)]
#[command(name = "mill-ledger")]
#[command(about = "DO imports and lifting reports for the mill ledger")]
#[command(version = "0.1.0")]
struct Cli {
    /// Database connection URL (overrides the config file)
    #[arg(long)]
    database_url: Option<String>,

    /// Configuration file (default: config/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read a DO sheet (.xlsx, .xls, .ods or .csv) and show its candidates
    Import {
        file: PathBuf,

        /// Commit the valid candidates as one batch
        #[arg(long)]
        commit: bool,
    },

    /// Remaining balance of one DO
    Balance {
        committee_center: String,
        do_number: String,
    },

    /// Remaining lifting across DOs
    Lifting {
        /// Only DOs of this committee center
        #[arg(long)]
        committee: Option<String>,

        /// Only DOs with quantity left to lift
        #[arg(long)]
        open_only: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Create the ledger tables if they don't exist
    InitSchema,
}

fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<LedgerConfig> {
    let mut config = match &cli.config {
        Some(path) => LedgerConfig::load_from(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => LedgerConfig::load().context("loading configuration")?,
    };
    if let Some(url) = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok())
    {
        config.database.url = url;
    }
    Ok(config)
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    match &cli.command {
        Commands::Import { file, commit } => handle_import(&config, file, *commit),
        Commands::Balance {
            committee_center,
            do_number,
        } => {
            let store = open_store(&config)?;
            let balance = store.remaining_balance(&DoKey::new(committee_center.as_str(), do_number.as_str()))?;
            println!("{}", format_balance(&balance));
            Ok(())
        }
        Commands::Lifting {
            committee,
            open_only,
            json,
        } => {
            let store = open_store(&config)?;
            let mut filter = LiftingFilter::default();
            if let Some(committee) = committee {
                filter = filter.committee(committee.as_str());
            }
            if *open_only {
                filter = filter.open_only();
            }
            let balances = store.remaining_lifting(&filter)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&balances)?);
            } else {
                print_lifting(&balances);
            }
            Ok(())
        }
        Commands::InitSchema => {
            open_store(&config)?.init_schema()?;
            println!("{} ledger schema ready", "✓".green());
            Ok(())
        }
    }
}

fn open_store(config: &LedgerConfig) -> Result<PgLedgerStore> {
    PgLedgerStore::connect(config).context("connecting to the ledger database")
}

fn handle_import(config: &LedgerConfig, file: &Path, commit: bool) -> Result<()> {
    let ingestion = ingest_file(file, &config.import)
        .with_context(|| format!("importing {}", file.display()))?;
    print_ingestion(&ingestion);

    if !commit {
        println!("\nRun again with --commit to store the valid rows.");
        return Ok(());
    }

    let store = open_store(config)?;
    let report = BulkCommitCoordinator::new(&store).commit(&ingestion)?;
    println!(
        "\n{} committed {} DO entries ({} invalid rows skipped)",
        "✓".green(),
        report.committed.len(),
        report.skipped_invalid
    );
    Ok(())
}

fn print_ingestion(ingestion: &Ingestion) {
    println!("\nDO candidates ({}):", ingestion.candidates.len());
    for candidate in &ingestion.candidates {
        println!("{}", format_candidate(candidate));
    }
    println!(
        "\nSummary: {} valid, {} invalid",
        ingestion.valid_count(),
        ingestion.invalid_count()
    );
    if ingestion.truncated {
        println!("{} the sheet was truncated at the configured row limit", "!".yellow());
    }
}

fn format_candidate(candidate: &Candidate) -> String {
    let mark = if candidate.valid {
        "✓".green()
    } else {
        "✗".red()
    };
    let entry = &candidate.entry;
    let mut line = format!(
        "  {} row {}: {} total {}",
        mark,
        candidate.row,
        entry.key(),
        entry.total()
    );
    if !candidate.notes.is_empty() {
        line.push_str(&format!(" ({})", candidate.notes.join("; ")));
    }
    line
}

fn format_balance(balance: &DoBalance) -> String {
    format!(
        "{}: entitlement {}, consumed {}, remaining {} (version {})",
        balance.key, balance.entitlement, balance.consumed, balance.remaining, balance.version
    )
}

fn print_lifting(balances: &[DoBalance]) {
    if balances.is_empty() {
        println!("No DO entries match.");
        return;
    }
    println!("\nRemaining lifting ({} DOs):", balances.len());
    for balance in balances {
        let mark = if balance.is_open() {
            "⏳".normal()
        } else {
            "✓".green()
        };
        println!("  {} {}", mark, format_balance(balance));
    }
    let remaining: rust_decimal::Decimal = balances.iter().map(|b| b.remaining).sum();
    println!("\nTotal remaining: {}", remaining);
}
