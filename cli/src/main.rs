//! polyrpc CLI: find a working Polygon RPC endpoint from the terminal.
//!
//! Usage:
//! ```bash
//! # Walk the candidate list and bind the first endpoint that answers
//! polyrpc select
//!
//! # Show the candidate list for mainnet
//! polyrpc --network mainnet candidates
//!
//! # Probe one endpoint
//! polyrpc probe --url https://polygon-rpc.com
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use polyrpc_core::{
    ConnectionManager, ConnectionOptions, HealthProbe, InitOutcome, JsonFileConfig,
    NetworkMode, ProbeOutcome, ProcessEnv, RpcTransport, DEFAULT_PROBE_TIMEOUT,
};
use polyrpc_http::global::{CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH};
use polyrpc_http::HttpTransportFactory;

#[derive(Parser)]
#[command(
    name = "polyrpc",
    about = "Find a working Polygon RPC endpoint",
    long_about = "
polyrpc probes the configured endpoint and the built-in public endpoints for
the selected network, in priority order, and reports which one it would use.

ENVIRONMENT VARIABLES:
  POLYGON_RPC_URL           Mainnet endpoint override
  POLYGON_TESTNET_RPC_URL   Amoy testnet endpoint override
  POLYRPC_CONFIG            Settings file (default: polyrpc.json)
  RUST_LOG                  Log filter (default: info)
",
    version
)]
struct Cli {
    /// Settings file (JSON, camelCase keys)
    #[arg(long, global = true, env = CONFIG_PATH_VAR, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the network mode from the settings file
    #[arg(long, global = true, value_enum)]
    network: Option<NetworkArg>,

    /// Per-probe timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Emit JSON logs
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select an endpoint the way the provider does at startup
    Select,

    /// Print the ordered candidate list
    Candidates,

    /// Probe a single endpoint
    Probe {
        /// RPC endpoint URL
        #[arg(long)]
        url: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum NetworkArg {
    Testnet,
    Mainnet,
}

impl From<NetworkArg> for NetworkMode {
    fn from(arg: NetworkArg) -> Self {
        match arg {
            NetworkArg::Testnet => NetworkMode::Testnet,
            NetworkArg::Mainnet => NetworkMode::Mainnet,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match &cli.command {
        Commands::Select => cmd_select(&cli).await,
        Commands::Candidates => cmd_candidates(&cli),
        Commands::Probe { url } => cmd_probe(&cli, url).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn build_manager(cli: &Cli) -> Result<ConnectionManager> {
    let config = JsonFileConfig::new(&cli.config);
    config
        .load()
        .with_context(|| format!("invalid settings file {}", cli.config.display()))?;

    let mut manager = ConnectionManager::new(
        Arc::new(HttpTransportFactory::default()),
        Arc::new(config),
    )
    .with_env(ProcessEnv);
    if let Some(network) = cli.network {
        manager = manager.with_network_mode(network.into());
    }
    if let Some(ms) = cli.timeout_ms {
        manager = manager.with_probe_timeout(Duration::from_millis(ms));
    }
    Ok(manager)
}

async fn cmd_select(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli)?;
    let mode = manager.network_mode();

    let outcome = manager.initialize().await;
    let verified = match &outcome {
        InitOutcome::Verified { .. } | InitOutcome::Reused { .. } => "verified",
        InitOutcome::AlreadyInitialized { .. } => "cached",
        InitOutcome::Unverified { .. } => "UNVERIFIED fallback",
        InitOutcome::Unbound => anyhow::bail!("no provider could be constructed"),
    };

    let provider = manager.get().context("provider missing after initialize")?;
    println!("Network:  {}", mode.display_name());
    println!("Endpoint: {}", provider.url());
    println!("Status:   {verified}");
    match provider.chain_id().await {
        Ok(id) => println!("Chain id: {id} (expected {})", mode.expected_chain_id()),
        Err(e) => println!("Chain id: unavailable ({e})"),
    }
    Ok(())
}

fn cmd_candidates(cli: &Cli) -> Result<()> {
    let manager = build_manager(cli)?;
    println!("Candidates for {}:\n", manager.network_mode().display_name());
    for (i, url) in manager.candidates().iter().enumerate() {
        println!("  {:>2}. {url}", i + 1);
    }
    Ok(())
}

async fn cmd_probe(cli: &Cli, url: &str) -> Result<()> {
    let timeout = cli
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_PROBE_TIMEOUT);
    let probe = HealthProbe::new(
        Arc::new(HttpTransportFactory::default()),
        ConnectionOptions::default(),
        timeout,
    );

    println!("Probing {url}...");
    match probe.probe(url).await {
        ProbeOutcome::Reachable { chain_id, latency } => {
            println!("  Status:   OK");
            println!("  Chain id: {chain_id}");
            println!("  Latency:  {}ms", latency.as_millis());
            Ok(())
        }
        ProbeOutcome::Failed(reason) => anyhow::bail!("{url} unavailable: {reason}"),
    }
}
