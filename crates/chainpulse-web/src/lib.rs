//! Chainpulse Web - HTTP dashboard and JSON API for the chainpulse monitor.
//!
//! Renders the latest readings from the status board and exposes them as
//! JSON, plus the EIP-3085 parameter document wallets need to add the
//! monitored network.

use actix_files as fs;
use actix_web::{
    get,
    middleware::Logger,
    post,
    web::{self, Redirect},
    App, HttpResponse, HttpServer, Result,
};
use askama::Template;
use chrono::{DateTime, Utc};
use qrcode::{render::svg, QrCode};
use serde::Serialize;
use tracing::{error, info, warn};

use chainpulse_core::board::{CellState, RefreshHandle, StatusCell};
use chainpulse_core::config::{ChainConfig, Config};
use chainpulse_core::types::{NetworkSnapshot, RpcSnapshot};

// =============================================================================
// Display formatting
// =============================================================================

/// Group digits in threes: 1000 becomes "1,000".
fn group_digits(n: u128) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.chars().rev().collect()
}

/// Block time in seconds with one decimal: 2000 ms becomes "2.0s".
fn format_block_time(ms: f64) -> String {
    format!("{:.1}s", ms / 1000.0)
}

/// Utilization fraction as a percentage: 0.42 becomes "42.00%".
fn format_fraction_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Progress-bar width for a fraction, clamped to [0, 100].
fn bar_width(fraction: f64) -> String {
    format!("{:.2}", (fraction * 100.0).clamp(0.0, 100.0))
}

/// Wei to gwei with two decimals.
fn format_gwei(wei: u128) -> String {
    format!("{:.2}", wei as f64 / 1e9)
}

/// Shorten a hash to its leading characters for table display.
fn short_hash(hash: &str) -> String {
    if hash.chars().count() <= 10 {
        return hash.to_string();
    }
    let prefix: String = hash.chars().take(10).collect();
    format!("{}...", prefix)
}

/// A gas tier from the explorer oracle, or a placeholder while it warms up.
fn format_gas_tier(tier: Option<f64>) -> String {
    match tier {
        Some(gwei) => format!("{}", gwei),
        None => "--".to_string(),
    }
}

fn relative_age(t: DateTime<Utc>) -> String {
    let secs = (Utc::now() - t).num_seconds().max(0);
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

// =============================================================================
// View models
// =============================================================================

struct ChainView {
    name: String,
    chain_id: String,
    chain_id_hex: String,
    rpc_url: String,
    explorer_url: String,
}

impl ChainView {
    fn build(chain: &ChainConfig) -> Self {
        Self {
            name: chain.name.clone(),
            chain_id: chain.chain_id.to_string(),
            chain_id_hex: chain.chain_id_hex(),
            rpc_url: chain.rpc_url.clone(),
            explorer_url: chain.explorer_url.clone(),
        }
    }
}

struct ChainIdView {
    decimal: String,
    hex: String,
    matches: bool,
}

struct BlockView {
    number: String,
    time: String,
    hash: String,
    hash_short: String,
    gas_used: String,
    gas_limit: String,
}

struct SyncView {
    current: String,
    highest: String,
    percent: String,
    width: String,
}

/// Everything the RPC widget renders, preformatted.
struct RpcView {
    loading: bool,
    status_text: &'static str,
    status_class: &'static str,
    response_time: String,
    chain_id: Option<ChainIdView>,
    gas_price: Option<String>,
    block: Option<BlockView>,
    sync: Option<SyncView>,
    last_checked: Option<String>,
}

impl RpcView {
    fn build(state: &CellState<RpcSnapshot>, expected_chain_id: u64) -> Self {
        let snapshot = match &state.snapshot {
            Some(snapshot) => snapshot,
            None => {
                return Self {
                    loading: state.loading,
                    status_text: "Checking",
                    status_class: "checking",
                    response_time: "--".into(),
                    chain_id: None,
                    gas_price: None,
                    block: None,
                    sync: None,
                    last_checked: None,
                };
            }
        };

        let (status_text, status_class): (&'static str, &'static str) = if !snapshot.online {
            ("Offline", "offline")
        } else if snapshot.syncing == Some(true) {
            ("Syncing", "syncing")
        } else {
            ("Online", "online")
        };

        let chain_id = snapshot.chain_id.as_ref().map(|hex| ChainIdView {
            decimal: snapshot
                .chain_id_decimal()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".into()),
            hex: hex.clone(),
            matches: snapshot.chain_id_decimal() == Some(expected_chain_id),
        });

        let block = snapshot.latest_block.as_ref().map(|block| BlockView {
            number: group_digits(block.number as u128),
            time: block.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            hash: block.hash.clone(),
            hash_short: short_hash(&block.hash),
            gas_used: group_digits(block.gas_used as u128),
            gas_limit: group_digits(block.gas_limit as u128),
        });

        let sync = snapshot.sync_progress.as_ref().map(|progress| SyncView {
            current: group_digits(progress.current_block as u128),
            highest: group_digits(progress.highest_block as u128),
            percent: format!("{:.2}%", progress.percent()),
            width: format!("{:.2}", progress.percent()),
        });

        Self {
            loading: state.loading,
            status_text,
            status_class,
            response_time: format!("{}ms", snapshot.response_time_ms),
            chain_id,
            gas_price: snapshot.gas_price_wei.map(format_gwei),
            block,
            sync,
            last_checked: Some(relative_age(snapshot.checked_at)),
        }
    }
}

struct StatsCards {
    total_blocks: String,
    avg_block_time: String,
    total_transactions: String,
    transactions_today: String,
    total_addresses: String,
    utilization: String,
    utilization_width: String,
    gas_slow: String,
    gas_average: String,
    gas_fast: String,
    gas_used_today: String,
    coin_price: Option<String>,
    market_cap: Option<String>,
}

/// Everything the stats widget renders. `cards` stays populated across a
/// failed poll: the stale reading is shown alongside the error banner.
struct StatsView {
    loading: bool,
    error: Option<String>,
    cards: Option<StatsCards>,
}

impl StatsView {
    fn build(state: &CellState<NetworkSnapshot>) -> Self {
        let cards = state.snapshot.as_ref().map(|snapshot| StatsCards {
            total_blocks: group_digits(snapshot.total_blocks as u128),
            avg_block_time: format_block_time(snapshot.average_block_time),
            total_transactions: group_digits(snapshot.total_transactions as u128),
            transactions_today: group_digits(snapshot.transactions_today as u128),
            total_addresses: group_digits(snapshot.total_addresses as u128),
            utilization: format_fraction_percent(snapshot.network_utilization_percentage),
            utilization_width: bar_width(snapshot.network_utilization_percentage),
            gas_slow: format_gas_tier(snapshot.gas_prices.slow),
            gas_average: format_gas_tier(snapshot.gas_prices.average),
            gas_fast: format_gas_tier(snapshot.gas_prices.fast),
            gas_used_today: group_digits(snapshot.gas_used_today),
            coin_price: snapshot.coin_price.clone(),
            market_cap: snapshot.market_cap.clone(),
        });

        Self {
            loading: state.loading,
            error: state.error.clone(),
            cards,
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
struct DashboardTemplate {
    chain: ChainView,
    rpc: RpcView,
    stats: StatsView,
    qr_svg: String,
}

// =============================================================================
// JSON API payloads
// =============================================================================

#[derive(Serialize)]
struct ApiCell<T: Serialize> {
    snapshot: Option<T>,
    error: Option<String>,
    loading: bool,
}

impl<T: Serialize> ApiCell<T> {
    fn from_state(state: CellState<T>) -> Self {
        Self {
            snapshot: state.snapshot,
            error: state.error,
            loading: state.loading,
        }
    }
}

#[derive(Serialize)]
struct ChainSummary {
    name: String,
    chain_id: u64,
    chain_id_hex: String,
    rpc_url: String,
    explorer_url: String,
}

#[derive(Serialize)]
struct StatusResponse {
    chain: ChainSummary,
    rpc: ApiCell<RpcSnapshot>,
    stats: ApiCell<NetworkSnapshot>,
    generated_at: DateTime<Utc>,
}

/// The `wallet_addEthereumChain` request parameter (EIP-3085) for the
/// monitored network, served for wallets and frontends to consume.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddChainParams {
    chain_id: String,
    chain_name: String,
    native_currency: NativeCurrency,
    rpc_urls: Vec<String>,
    block_explorer_urls: Vec<String>,
}

#[derive(Serialize)]
struct NativeCurrency {
    name: String,
    symbol: String,
    decimals: u8,
}

impl AddChainParams {
    fn build(chain: &ChainConfig) -> Self {
        Self {
            chain_id: chain.chain_id_hex(),
            chain_name: chain.name.clone(),
            native_currency: NativeCurrency {
                name: chain.currency_name.clone(),
                symbol: chain.currency_symbol.clone(),
                decimals: chain.currency_decimals,
            },
            rpc_urls: vec![chain.rpc_url.clone()],
            block_explorer_urls: vec![chain.explorer_url.clone()],
        }
    }
}

// =============================================================================
// Routes
// =============================================================================

#[derive(Clone)]
struct AppState {
    chain: ChainConfig,
    rpc_cell: StatusCell<RpcSnapshot>,
    stats_cell: StatusCell<NetworkSnapshot>,
    refresh: RefreshHandle,
    qr_svg: String,
}

#[get("/")]
async fn dashboard(state: web::Data<AppState>) -> Result<HttpResponse> {
    let rpc_state = state.rpc_cell.read().await;
    let stats_state = state.stats_cell.read().await;

    let template = DashboardTemplate {
        chain: ChainView::build(&state.chain),
        rpc: RpcView::build(&rpc_state, state.chain.chain_id),
        stats: StatsView::build(&stats_state),
        qr_svg: state.qr_svg.clone(),
    };

    let html = template.render().map_err(|e| {
        error!("Template render error: {}", e);
        actix_web::error::ErrorInternalServerError("Template error")
    })?;

    Ok(HttpResponse::Ok().content_type("text/html").body(html))
}

#[post("/refresh")]
async fn refresh_now(state: web::Data<AppState>) -> Redirect {
    if !state.refresh.request() {
        warn!("Manual refresh requested but no RPC checker is listening");
    }
    Redirect::to("/").see_other()
}

#[get("/api/v0/status.json")]
async fn status_api(state: web::Data<AppState>) -> HttpResponse {
    let response = StatusResponse {
        chain: ChainSummary {
            name: state.chain.name.clone(),
            chain_id: state.chain.chain_id,
            chain_id_hex: state.chain.chain_id_hex(),
            rpc_url: state.chain.rpc_url.clone(),
            explorer_url: state.chain.explorer_url.clone(),
        },
        rpc: ApiCell::from_state(state.rpc_cell.read().await),
        stats: ApiCell::from_state(state.stats_cell.read().await),
        generated_at: Utc::now(),
    };
    HttpResponse::Ok().json(response)
}

#[get("/api/v0/chain.json")]
async fn chain_params(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(AddChainParams::build(&state.chain))
}

#[get("/healthz")]
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// Run the web server.
///
/// This is the main entry point for the web service.
pub async fn run(
    config: &Config,
    rpc_cell: StatusCell<RpcSnapshot>,
    stats_cell: StatusCell<NetworkSnapshot>,
    refresh: RefreshHandle,
) -> std::io::Result<()> {
    let chain = config.chain.clone();

    // Rendered once; the endpoint URL never changes at runtime.
    let qr_svg = match QrCode::new(chain.rpc_url.as_bytes()) {
        Ok(code) => code
            .render()
            .min_dimensions(160, 160)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#FFFFFF"))
            .build(),
        Err(e) => {
            warn!("Failed to render RPC endpoint QR code: {}", e);
            String::new()
        }
    };

    let state = AppState {
        chain,
        rpc_cell,
        stats_cell,
        refresh,
        qr_svg,
    };

    let bind_address = config.web.bind_address.clone();
    let bind_port = config.web.bind_port;
    info!("Starting dashboard at http://{}:{}", bind_address, bind_port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("\"%r\" %s %b %Ts"))
            .app_data(web::Data::new(state.clone()))
            .service(fs::Files::new("/static", "./static"))
            .service(dashboard)
            .service(refresh_now)
            .service(status_api)
            .service(chain_params)
            .service(health_check)
    })
    .bind((bind_address, bind_port))?
    .run()
    .await
}
