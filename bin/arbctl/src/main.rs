use std::process::ExitCode;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use adapter::ExchangeAccountAdapter;
use common::{Config, Connector, CredentialStore, Diagnostic, TradingMode};
use okx::OkxConnector;
use paper::PaperExchange;

#[tokio::main]
async fn main() -> ExitCode {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(
        mode = %cfg.trading_mode,
        account_id = cfg.account_id,
        coin = cfg.coin.as_deref().unwrap_or("-"),
        "arbctl starting"
    );

    match run(cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cfg: Config) -> anyhow::Result<()> {
    // ── Exchange connection (injected based on TRADING_MODE) ─────────────────
    let connector: Box<dyn Connector> = match cfg.trading_mode {
        TradingMode::Live => {
            let store = CredentialStore::load(&cfg.credentials_path)
                .with_context(|| format!("loading credentials from {}", cfg.credentials_path))?;
            info!("Live mode, using OKX REST client");
            Box::new(OkxConnector::new(store, cfg.http_timeout))
        }
        TradingMode::Paper => {
            info!("Paper mode, using simulated exchange");
            Box::new(PaperExchange::with_btc_market())
        }
    };

    let (outcome, forwarded) = drive(&cfg, connector.as_ref()).await;
    debug!(forwarded, "Diagnostics drained");
    outcome
}

/// Runs the adapter session and forwards its diagnostics to the log.
/// Returns the session outcome and how many diagnostics were forwarded.
async fn drive(cfg: &Config, connector: &dyn Connector) -> (anyhow::Result<()>, usize) {
    // ── Diagnostics ──────────────────────────────────────────────────────────
    let (diag_tx, mut diag_rx) = mpsc::unbounded_channel::<Diagnostic>();
    let diag_task = tokio::spawn(async move {
        let mut forwarded = 0;
        while let Some(diagnostic) = diag_rx.recv().await {
            warn!("{diagnostic}");
            forwarded += 1;
        }
        forwarded
    });

    // The adapter owns the only sender, so the drain ends once `operate`
    // returns on any path.
    let outcome = operate(cfg, connector, diag_tx).await;
    let forwarded = diag_task.await.unwrap_or_default();
    (outcome, forwarded)
}

async fn operate(
    cfg: &Config,
    connector: &dyn Connector,
    diag_tx: mpsc::UnboundedSender<Diagnostic>,
) -> anyhow::Result<()> {
    // ── Adapter ──────────────────────────────────────────────────────────────
    let mut builder = ExchangeAccountAdapter::builder(cfg.account_id)
        .margin_cooldown(cfg.margin_cooldown)
        .diagnostics(diag_tx);
    if let Some(coin) = &cfg.coin {
        builder = builder.coin(coin.clone());
    }
    let adapter = builder.connect(connector)?.await;

    // ── Account preconditions (failure exits with status 1) ──────────────────
    adapter.check_account_level().await?;
    adapter.check_position_mode().await?;

    // ── Report ───────────────────────────────────────────────────────────────
    info!(usdt = adapter.usdt_balance().await?, "USDT balance");

    if adapter.coin().is_some() && adapter.exists() {
        report_pair(&adapter).await?;
    } else if cfg.coin.is_some() {
        warn!("Coin does not resolve on the exchange, pair report skipped");
    }
    Ok(())
}

async fn report_pair(adapter: &ExchangeAccountAdapter) -> anyhow::Result<()> {
    let (spot_info, swap_info) = adapter.instrument_pair()?;
    info!(
        spot = %spot_info.instrument_id,
        swap = %swap_info.instrument_id,
        contract_value = swap_info.contract_value,
        tick_size = swap_info.tick_size,
        "Instruments"
    );

    let spot = adapter.spot_position(None).await?;
    let swap = adapter.swap_position(None).await?;
    let margin = adapter.swap_balance().await?;
    info!(spot, swap, net = spot - swap, margin, "Positions");

    if adapter.swap_holding(None).await?.is_some() {
        info!(leverage = adapter.get_leverage().await?, "Isolated leverage");
    }

    let (spot_ticker, swap_ticker) = adapter.get_tickers().await?;
    let basis = if spot_ticker.last > 0.0 {
        (swap_ticker.last - spot_ticker.last) / spot_ticker.last
    } else {
        0.0
    };
    info!(
        spot_last = spot_ticker.last,
        swap_last = swap_ticker.last,
        basis_pct = basis * 100.0,
        "Tickers"
    );

    let swap_id = adapter.swap_instrument_id().unwrap_or_default();
    let orders = adapter.trade().pending_orders(swap_id).await?;
    info!(count = orders.len(), "Pending swap orders");
    Ok(())
}
