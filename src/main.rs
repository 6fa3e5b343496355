use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcp_sentinel::catalog::ToolCatalog;
use mcp_sentinel::discovery::{DiscoveryConfig, DiscoveryScanner};
use mcp_sentinel::domain::Endpoint;
use mcp_sentinel::monitoring::MonitoringSupervisor;
use mcp_sentinel::persistence::{InMemoryPersistence, PersistencePort};
use mcp_sentinel::protocol::ProtocolClient;
use mcp_sentinel::security::{credential_scanner, prompt_injection};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// A thin manual smoke-testing entrypoint over the sentinel core — not the
/// REST façade, and not responsible for auth or multi-tenant routing.
#[derive(Parser)]
#[command(name = "mcp-sentinel")]
#[command(about = "MCP Sentinel Core: discover, watch, and scan MCP endpoints")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the local network for reachable MCP servers
    Discover,
    /// Watch one endpoint's health in a continuous monitoring loop
    Watch {
        url: String,
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
    },
    /// Run the prompt-injection classifier and credential scanner over a file
    ScanText { file: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,mcp_sentinel=debug".parse().unwrap());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Discover => run_discover().await,
        Commands::Watch { url, interval_secs } => run_watch(url, interval_secs).await,
        Commands::ScanText { file } => run_scan_text(file),
    }
}

async fn run_discover() -> Result<()> {
    let client = Arc::new(ProtocolClient::new(http_client()));
    let scanner = DiscoveryScanner::new(client);
    let found = scanner.scan(&DiscoveryConfig::default()).await;

    println!("discovered {} MCP server(s):", found.len());
    for server in found {
        println!("  {} ({})", server.url, server.server_info.name);
    }
    Ok(())
}

async fn run_watch(url: String, interval_secs: u64) -> Result<()> {
    let client = Arc::new(ProtocolClient::new(http_client()));
    let persistence: Arc<dyn PersistencePort> = Arc::new(InMemoryPersistence::new());
    let catalog = ToolCatalog::new(client.clone(), persistence.clone());

    let tenant_id = Uuid::new_v4();
    let endpoint = Endpoint::new(tenant_id, &url, url.clone());
    let endpoint = persistence.create_endpoint(endpoint).await?;

    if let Ok(tools) = catalog.discover_tools(&endpoint).await {
        println!("discovered {} tool(s) on {}", tools.len(), url);
    }

    let supervisor = MonitoringSupervisor::new(client, persistence);
    supervisor.watch(endpoint.clone(), Duration::from_secs(interval_secs));

    println!("watching {url} every {interval_secs}s — press Ctrl+C to stop");
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    supervisor.stop(&endpoint.url);
    Ok(())
}

fn run_scan_text(file: String) -> Result<()> {
    let text = std::fs::read_to_string(&file).with_context(|| format!("reading {file}"))?;

    let injection = prompt_injection::classify(&text);
    println!(
        "prompt-injection: score={} bucket={:?} matches={}",
        injection.score,
        injection.bucket,
        injection.matches.len()
    );
    for rec in &injection.recommendations {
        println!("  recommendation: {rec}");
    }

    let credentials = credential_scanner::scan_text(&text);
    println!(
        "credential scan: risk_score={} exposures={}",
        credentials.risk_score,
        credentials.exposures.len()
    );
    for exposure in &credentials.exposures {
        println!("  {} ({:?}): {}", exposure.credential_type, exposure.severity, exposure.masked);
    }

    Ok(())
}
