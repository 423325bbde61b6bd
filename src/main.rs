//! WolfStore - Replicated Object Store
//!
//! Runs the interactive store shell, or inspects the persisted state.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfstore::config::StoreConfig;
use wolfstore::engine::ReplicationEngine;
use wolfstore::metadata::MetadataStore;
use wolfstore::shell::Shell;

/// WolfStore - Replicated Object Store
#[derive(Parser)]
#[command(name = "wolfstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolfstore.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive shell (default)
    Shell,

    /// List stored files and their replica nodes
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfstore.toml")]
        output: PathBuf,

        /// Number of storage nodes
        #[arg(long, default_value_t = 4)]
        nodes: usize,
    },

    /// Validate configuration file
    Validate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = StoreConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    init_logging(level, &config.logging.format);

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => run_shell(config),
        Commands::List { json } => run_list(&config, json),
        Commands::Init { output, nodes } => run_init(output, nodes),
        Commands::Validate => run_validate(&cli.config),
    }
}

/// Initialize logging. Logs go to stderr so shell output stays readable.
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "compact" {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

/// Run the interactive shell on stdin/stdout
fn run_shell(config: StoreConfig) -> anyhow::Result<()> {
    let engine = ReplicationEngine::open(&config).context("failed to open store")?;
    println!("[STORE] Initialized with {} nodes.", engine.nodes().len());

    let work_dir = std::env::current_dir()?;
    let mut shell = Shell::new(engine, config, work_dir);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    shell.run(stdin.lock(), &mut stdout)?;
    Ok(())
}

/// Print the persisted metadata
fn run_list(config: &StoreConfig, json: bool) -> anyhow::Result<()> {
    let metadata = MetadataStore::open(config.metadata_path(), config.node_count());
    let records = metadata.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("(Empty) No files stored.");
        return Ok(());
    }

    println!("FILES IN STORE:");
    for record in records {
        println!(" - {} → Nodes: {}", record.filename, record.replicas);
    }
    Ok(())
}

/// Write a default configuration file
fn run_init(output: PathBuf, nodes: usize) -> anyhow::Result<()> {
    if output.exists() {
        anyhow::bail!("configuration file {:?} already exists", output);
    }

    let mut config = StoreConfig::default();
    config.cluster.nodes = nodes;
    config.validate()?;
    config.save(&output)?;

    println!("Configuration written to {:?}", output);
    Ok(())
}

/// Validate a configuration file
fn run_validate(path: &Path) -> anyhow::Result<()> {
    let config = StoreConfig::from_file(path)
        .with_context(|| format!("invalid configuration {:?}", path))?;

    println!("Configuration is valid:");
    println!("  nodes:              {}", config.cluster.nodes);
    println!("  replication factor: {}", config.cluster.replication_factor);
    println!("  metadata file:      {:?}", config.metadata_path());
    Ok(())
}
