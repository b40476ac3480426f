use anyhow::Context;
use clap::{Parser, Subcommand};
use configuration::{Config, LogLevel, init_tracing, load_config};
use database::{DbRepository, PgAuditSink, connect, run_migrations};
use engine::TradingCore;
use events::{AuditSink, TracingAuditSink};
use ledger::{InstrumentRegistry, PriceBook};
use risk::SimpleMarginValidator;
use std::path::PathBuf;
use std::sync::Arc;

mod journal;
mod report;

/// The main entry point for the Bourse ledger tools.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    let mut config = load_config(&cli.config).context("loading configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    // Held until exit so the file appender flushes.
    let _log_guard = init_tracing(&config.logging)?;

    // Execute the appropriate command
    match cli.command {
        Commands::Replay(args) => handle_replay(args, &config).await,
        Commands::Migrate => handle_migrate(&config).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Order execution and position accounting core.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Missing is fine.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `[logging] level`.
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a JSON command journal to a fresh ledger and print the books.
    Replay(ReplayArgs),
    /// Apply the database migrations.
    Migrate,
}

#[derive(Parser)]
struct ReplayArgs {
    /// The journal file: a JSON array of commands.
    #[arg(long)]
    journal: PathBuf,

    /// Also persist the audit trail to PostgreSQL (requires DATABASE_URL).
    #[arg(long)]
    audit_db: bool,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_replay(args: ReplayArgs, config: &Config) -> anyhow::Result<()> {
    let commands = journal::load(&args.journal)?;
    tracing::info!(commands = commands.len(), journal = %args.journal.display(), "replaying journal");

    let mut writer = None;
    let audit: Arc<dyn AuditSink> = if args.audit_db {
        let pool = connect(&config.database).await?;
        run_migrations(&pool).await?;
        let repository = DbRepository::new(pool);
        let (sink, handle) = PgAuditSink::spawn(repository.clone());
        writer = Some((handle, repository));
        Arc::new(sink)
    } else {
        Arc::new(TracingAuditSink)
    };

    let catalog = Arc::new(InstrumentRegistry::new());
    let prices = Arc::new(PriceBook::new());
    let core = TradingCore::new(
        config,
        catalog.clone(),
        prices.clone(),
        Arc::new(SimpleMarginValidator::new()),
        audit,
    );

    let mut replayer = journal::Replayer::new(&core, &catalog, &prices);
    let summary = replayer.run(commands).await;
    println!(
        "Replayed {} command(s): {} applied, {} failed",
        summary.applied + summary.failed,
        summary.applied,
        summary.failed
    );

    report::print_books(&core, replayer.accounts()).await?;

    if let Some((writer, repository)) = writer {
        // The core owns the last sink handle; dropping it closes the queue.
        drop(replayer);
        drop(core);
        let written = writer.await.context("audit writer panicked")?;
        let stored = repository.count_audit_events().await?;
        println!("Persisted {written} audit event(s); {stored} stored in total");
    }
    Ok(())
}

async fn handle_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = connect(&config.database).await?;
    run_migrations(&pool).await?;
    println!("Database schema is up to date.");
    Ok(())
}
