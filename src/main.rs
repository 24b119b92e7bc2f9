//! policy-harvest main entry point
//!
//! This is the command-line interface for the policy listing harvester.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use policy_harvest::config::{load_config_with_hash, Config};
use policy_harvest::crawler::{select_modules, Coordinator, RunOptions};
use policy_harvest::listing::page_url;
use policy_harvest::output::{format_run_summary, load_statistics, print_statistics};
use policy_harvest::policy::DedupPolicy;
use policy_harvest::storage::open_storage;
use policy_harvest::RunMode;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;

/// Pages per module walked in test mode
const TEST_MODE_PAGES: u32 = 2;

/// policy-harvest: incremental archiver for government policy listings
///
/// Walks each configured module's listing, archives documents not seen in
/// earlier runs, and stops a module once it runs into enough known ones.
#[derive(Parser, Debug)]
#[command(name = "policy-harvest")]
#[command(version)]
#[command(about = "Incremental archiver for government policy listings", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Scan mode for every module (default: each module's configured mode)
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Only process this module (repeatable)
    #[arg(long = "module", value_name = "ID")]
    modules: Vec<String>,

    /// Walk at most two listing pages per module
    #[arg(long, conflicts_with = "max_pages")]
    test_mode: bool,

    /// Walk at most N listing pages per module
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    max_pages: Option<u32>,

    /// Validate config and show what would be harvested without network access
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Remove stale lock files left by a crashed run
    #[arg(long)]
    break_locks: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Full,
    Incremental,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => RunMode::Full,
            ModeArg::Incremental => RunMode::Incremental,
        }
    }
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            mode: self.mode.map(RunMode::from),
            modules: self.modules.clone(),
            max_pages: if self.test_mode {
                Some(TEST_MODE_PAGES)
            } else {
                self.max_pages
            },
            break_locks: self.break_locks,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::from(2);
        }
    };

    let options = cli.run_options();
    let result = if cli.dry_run {
        handle_dry_run(&config, &options).map(|_| true)
    } else if cli.stats {
        handle_stats(&config).map(|_| true)
    } else {
        handle_harvest(config, options, &config_hash, cli.quiet).await
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("policy_harvest=info,warn"),
            1 => EnvFilter::new("policy_harvest=debug,info"),
            2 => EnvFilter::new("policy_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the planned scan
fn handle_dry_run(config: &Config, options: &RunOptions) -> anyhow::Result<()> {
    println!("=== policy-harvest Dry Run ===\n");

    println!("Fetch Configuration:");
    println!("  Attempts per request: {}", config.fetch.retry_times);
    println!(
        "  Retry backoff: {}-{}ms",
        config.fetch.retry_delay_ms[0], config.fetch.retry_delay_ms[1]
    );
    println!(
        "  Request delay: {}-{}ms",
        config.fetch.request_delay_ms[0], config.fetch.request_delay_ms[1]
    );
    println!("  Max file size: {} bytes", config.fetch.max_file_size);

    println!("\nUser Agent:");
    println!(
        "  {}/{} (+{}; {})",
        config.user_agent.crawler_name,
        config.user_agent.crawler_version,
        config.user_agent.contact_url,
        config.user_agent.contact_email
    );

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir);
    println!("  Database: {}", config.output.database_path);

    let modules = select_modules(config, &options.modules)?;
    println!("\nModules ({}):", modules.len());
    for module in &modules {
        let mode = options.mode_for(module);
        let first_page = page_url(module, 1)
            .with_context(|| format!("module '{}' has an unusable listing-url", module.id))?;
        let max_pages = options.max_pages.or(module.max_pages);

        println!("  - {} ({})", module.id, module.display_name());
        println!("    Mode: {}", mode);
        println!("    First page: {}", first_page);
        println!(
            "    Stop rule: {}",
            DedupPolicy::for_module(module, mode).rule_description()
        );
        if let Some(max) = max_pages {
            println!("    Page limit: {}", max);
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    let module_ids: Vec<String> = config.modules.iter().map(|m| m.id.clone()).collect();
    let stats = load_statistics(&storage, &module_ids)?;

    print_statistics(&stats);

    Ok(())
}

/// Handles a harvest run; returns whether the run succeeded
async fn handle_harvest(
    config: Config,
    options: RunOptions,
    config_hash: &str,
    quiet: bool,
) -> anyhow::Result<bool> {
    let mut coordinator = Coordinator::new(config, options, config_hash)?;

    let interrupt = coordinator.interrupt_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing the current document (Ctrl+C again to abort)");
            interrupt.store(true, Ordering::SeqCst);
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::error!("Second interrupt, aborting");
                std::process::exit(130);
            }
        }
    });

    let summary = coordinator.run().await?;

    if !quiet {
        println!("{}", format_run_summary(&summary));
    }

    Ok(summary.is_success())
}
