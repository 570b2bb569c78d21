//! Capacity dashboard CLI
//!
//! Reconciles approved cloud capacity from an approval sheet against live
//! LKE clusters and renders the result per account.

mod client;
mod commands;
mod config;
mod output;
mod sources;

use anyhow::{Context, Result};
use capdash_lib::{
    AccountDirectory, AccountKey, CapacityService, InventoryFetcher, InventoryProvider,
    MemoryStore, ReconcileLogger, ReconcileMetrics,
};
use clap::{Parser, Subcommand};
use commands::{debug, report};
use output::{print_info, print_warning, OutputFormat};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Capacity dashboard CLI
#[derive(Parser)]
#[command(name = "capdash")]
#[command(author, version, about = "Capacity dashboard: approved vs. live cluster capacity", long_about = None)]
pub struct Cli {
    /// Approval sheet exported as CSV
    #[arg(long, global = true, env = "CAPDASH_APPROVALS")]
    pub approvals: Option<PathBuf>,

    /// Inventory snapshot JSON; the live API is queried when omitted
    #[arg(long, global = true)]
    pub inventory: Option<PathBuf>,

    /// Configuration file (default: ~/.config/capdash/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Print Prometheus metrics to stderr after the command
    #[arg(long, global = true)]
    pub emit_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Full per-account report
    Report(AccountFilter),

    /// Approved vs. current capacity per region
    Compare(AccountFilter),

    /// Live capacity above approval
    Unapproved(AccountFilter),

    /// Live clusters and their profiles
    Clusters(AccountFilter),

    /// Re-render the report periodically until Ctrl-C
    Watch {
        /// Seconds between refreshes
        #[arg(long, default_value_t = 60)]
        interval: u64,

        #[command(flatten)]
        filter: AccountFilter,
    },

    /// Debug and troubleshooting commands
    #[command(subcommand)]
    Debug(DebugCommands),
}

#[derive(clap::Args)]
pub struct AccountFilter {
    /// Only show this account (repeatable)
    #[arg(long = "account", short)]
    pub accounts: Vec<String>,
}

#[derive(Subcommand)]
pub enum DebugCommands {
    /// Classify a cluster of one instance type
    Classify {
        /// Instance type, e.g. g6-dedicated-8
        instance_type: String,

        /// Node count
        #[arg(long, default_value_t = 1)]
        nodes: u32,
    },

    /// Apply the profile decision table
    Profile {
        /// Largest node memory in GB
        memory_gb: u32,

        /// Total node count
        nodes: u32,
    },

    /// Normalise a region label or API slug
    Region {
        raw: String,
    },

    /// Normalise an account name
    Account {
        raw: String,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn build_service(cli: &Cli, settings: &config::Settings) -> Result<CapacityService> {
    let normalizer = settings.normalizer()?;
    let classifier = settings.classifier();
    let timeout = Duration::from_secs(settings.fetch_timeout_secs);

    let (provider, directory): (Arc<dyn InventoryProvider>, AccountDirectory) = match &cli.inventory {
        Some(path) => {
            let snapshot = sources::SnapshotProvider::load(path)?;
            let mut directory = settings.directory(&normalizer);
            if directory.is_empty() {
                directory = AccountDirectory::from_entries(
                    &normalizer,
                    snapshot.account_names().into_iter().map(|name| (name, String::new())),
                );
            }
            let provider: Arc<dyn InventoryProvider> = Arc::new(snapshot);
            (provider, directory)
        }
        None => {
            let directory = settings.directory(&normalizer);
            if directory.is_empty() {
                anyhow::bail!(
                    "No accounts configured; add [[accounts]] to the config file or pass --inventory"
                );
            }
            for account in directory.accounts().iter().filter(|a| a.token().is_empty()) {
                warn!(
                    account = %account.name,
                    env = %config::token_env_var(&account.name),
                    "No API token for account"
                );
            }
            let provider: Arc<dyn InventoryProvider> =
                Arc::new(client::LinodeClient::new(&settings.api_url, timeout)?);
            (provider, directory)
        }
    };

    info!(accounts = directory.len(), "Accounts loaded");

    let service = CapacityService::new(
        normalizer,
        classifier,
        directory,
        InventoryFetcher::new(provider, timeout),
        Arc::new(MemoryStore::new()),
    )
    .with_cache_ttl(Duration::from_secs(settings.cache_ttl_secs))
    .with_logger(ReconcileLogger::new("cli"));

    match &cli.approvals {
        Some(path) => {
            let rows = sources::read_approvals(path)?;
            let ingest = service
                .sync_approvals(&rows)
                .await
                .context("Failed to load approvals")?;

            if cli.format == OutputFormat::Table {
                print_info(&format!(
                    "Loaded {} approval record(s) from {} row(s)",
                    ingest.records.len(),
                    rows.len()
                ));
                if !ingest.rejected.is_empty() {
                    print_warning(&format!("Skipped {} approval row(s)", ingest.rejected.len()));
                }
                for account in ingest.unknown_accounts() {
                    print_warning(&format!("Approvals reference unknown account {}", account));
                }
            }
        }
        None => {
            if cli.format == OutputFormat::Table {
                print_warning("No approval sheet given; every live cluster counts as unapproved");
            }
        }
    }

    Ok(service)
}

fn account_keys(service: &CapacityService, filter: &AccountFilter) -> Vec<AccountKey> {
    filter
        .accounts
        .iter()
        .map(|raw| service.normalizer().normalize_account(raw))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (settings, config_error) = match config::Settings::load(cli.config.as_deref()) {
        Ok(settings) => (settings, None),
        Err(e) => (config::Settings::default(), Some(e)),
    };

    init_tracing(cli.verbose, settings.log_json);
    if let Some(e) = config_error {
        warn!(error = %format!("{:#}", e), "Ignoring unreadable configuration, using defaults");
    }

    match &cli.command {
        Commands::Debug(debug_cmd) => {
            let normalizer = settings.normalizer()?;
            match debug_cmd {
                DebugCommands::Classify { instance_type, nodes } => {
                    debug::classify(&settings.classifier(), instance_type, *nodes, cli.format)?;
                }
                DebugCommands::Profile { memory_gb, nodes } => {
                    debug::profile(*memory_gb, *nodes, cli.format)?;
                }
                DebugCommands::Region { raw } => {
                    debug::region(&normalizer, raw, cli.format)?;
                }
                DebugCommands::Account { raw } => {
                    debug::account(&normalizer, raw, cli.format)?;
                }
            }
        }
        Commands::Report(filter) => {
            let service = build_service(&cli, &settings).await?;
            report::show_report(&service, &account_keys(&service, filter), cli.format).await?;
        }
        Commands::Compare(filter) => {
            let service = build_service(&cli, &settings).await?;
            report::show_comparison(&service, &account_keys(&service, filter), cli.format).await?;
        }
        Commands::Unapproved(filter) => {
            let service = build_service(&cli, &settings).await?;
            report::show_unapproved(&service, &account_keys(&service, filter), cli.format).await?;
        }
        Commands::Clusters(filter) => {
            let service = build_service(&cli, &settings).await?;
            report::show_clusters(&service, &account_keys(&service, filter), cli.format).await?;
        }
        Commands::Watch { interval, filter } => {
            let service = build_service(&cli, &settings).await?;
            let every = Duration::from_secs((*interval).max(1));
            report::watch(&service, &account_keys(&service, filter), cli.format, every).await?;
        }
    }

    // Stderr keeps JSON output on stdout parseable
    if cli.emit_metrics {
        eprint!("{}", ReconcileMetrics::new().render());
    }

    Ok(())
}
