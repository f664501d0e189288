//! Chainpulse - live status monitor for an EVM network.
//!
//! This is the main binary that can run different roles of the chainpulse
//! system.

use clap::Parser;
use std::collections::HashSet;

use chainpulse_core::board::{refresh_channel, StatusCell};
use chainpulse_core::config::Config;
use chainpulse_core::tracing_setup;
use chainpulse_core::types::{NetworkSnapshot, RpcSnapshot};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "chainpulse")]
#[command(version)]
#[command(about = "Live status monitor for an EVM network", long_about = None)]
struct Cli {
    /// Comma-separated list of roles to run: web, checker-rpc, checker-stats, or all
    /// Examples: --roles web  |  --roles all  |  --roles web,checker-rpc
    #[arg(long, default_value = "all")]
    roles: String,

    /// JSON-RPC endpoint of the monitored node (overrides RPC_URL)
    #[arg(long)]
    rpc_url: Option<String>,

    /// Block explorer base URL (overrides EXPLORER_URL)
    #[arg(long)]
    explorer_url: Option<String>,

    /// Dashboard bind port (overrides BIND_PORT)
    #[arg(long)]
    port: Option<u16>,
}

const VALID_ROLES: &[&str] = &["web", "checker-rpc", "checker-stats", "all"];

/// A future that never completes (used as placeholder in select! when a role is disabled)
async fn pending_forever() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    std::future::pending::<()>().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_setup::init();

    let cli = Cli::parse();

    // Parse comma-separated roles into a set
    let mut roles: HashSet<String> = cli
        .roles
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    // Validate roles
    for role in &roles {
        if !VALID_ROLES.contains(&role.as_str()) {
            eprintln!("Unknown role: {}", role);
            eprintln!("Valid roles: web, checker-rpc, checker-stats, all");
            std::process::exit(1);
        }
    }

    // If "all" is specified, expand to all individual roles
    if roles.contains("all") {
        roles.remove("all");
        roles.insert("web".to_string());
        roles.insert("checker-rpc".to_string());
        roles.insert("checker-stats".to_string());
    }

    if roles.is_empty() {
        eprintln!("No roles specified");
        std::process::exit(1);
    }

    info!("Starting chainpulse with roles: {:?}", roles);

    // Resolve config: env first, CLI flags take precedence
    let mut config = Config::from_env();
    if let Some(rpc_url) = cli.rpc_url {
        config.chain.rpc_url = rpc_url;
    }
    if let Some(explorer_url) = cli.explorer_url {
        config.chain.explorer_url = explorer_url;
    }
    if let Some(port) = cli.port {
        config.web.bind_port = port;
    }
    info!(
        chain = %config.chain.name,
        chain_id = config.chain.chain_id,
        rpc_url = %config.chain.rpc_url,
        "Monitoring target"
    );

    let run_web = roles.contains("web");
    let run_rpc = roles.contains("checker-rpc");
    let run_stats = roles.contains("checker-stats");

    // One cell per widget plus the manual-refresh channel; roles running in
    // this process share them.
    let rpc_cell: StatusCell<RpcSnapshot> = StatusCell::new();
    let stats_cell: StatusCell<NetworkSnapshot> = StatusCell::new();
    let (refresh_handle, refresh_rx) = refresh_channel();

    if run_web {
        info!("Starting web server...");
    }
    if run_rpc {
        info!("Starting RPC checker...");
    }
    if run_stats {
        info!("Starting stats checker...");
    }

    // Use tokio::select! to run all enabled roles concurrently
    // Each branch will only be active if the role is enabled
    let web_rpc_cell = rpc_cell.clone();
    let web_stats_cell = stats_cell.clone();
    let checker_rpc_cell = rpc_cell.clone();
    let checker_stats_cell = stats_cell.clone();
    tokio::select! {
        result = chainpulse_web::run(&config, web_rpc_cell, web_stats_cell, refresh_handle), if run_web => {
            match result {
                Ok(()) => info!("Web server completed"),
                Err(e) => error!("Web server error: {}", e),
            }
        }
        result = chainpulse_checker_rpc::run(&config, checker_rpc_cell, refresh_rx), if run_rpc => {
            match result {
                Ok(()) => info!("RPC checker completed"),
                Err(e) => error!("RPC checker error: {}", e),
            }
        }
        result = chainpulse_checker_stats::run(&config, checker_stats_cell), if run_stats => {
            match result {
                Ok(()) => info!("Stats checker completed"),
                Err(e) => error!("Stats checker error: {}", e),
            }
        }
        // Fallback that never triggers - ensures select! compiles when all conditions are false
        _ = pending_forever(), if !run_web && !run_rpc && !run_stats => {
            unreachable!("No roles were enabled");
        }
    }

    // Stop late checker cycles from touching the board while we unwind.
    rpc_cell.close().await;
    stats_cell.close().await;

    Ok(())
}
