use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use common::{
    AccountApi, AccountConfig, Capabilities, CoinAccount, CoinDetail, Connector, Error, Holding,
    InstrumentInfo, InstrumentKind, LeverageInfo, MarginDirection, MarginMode, PendingOrder,
    PositionMode, PositionSide, PublicApi, Result, Ticker, TradeApi,
};

/// Code the simulator answers with for unknown instrument ids.
pub const UNKNOWN_INSTRUMENT: &str = "51001";

/// Simulated exchange for paper trading and tests.
///
/// Every piece of account and market state is scripted through the setters.
/// No request ever leaves the process. Clones share state, so a test can keep
/// one handle while the adapter owns another.
#[derive(Clone, Default)]
pub struct PaperExchange {
    state: Arc<RwLock<PaperState>>,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct PaperState {
    config: Option<AccountConfig>,
    /// Ignore `set_position_mode` requests.
    pin_position_mode: bool,
    instruments: HashMap<(InstrumentKind, String), InstrumentInfo>,
    tickers: HashMap<String, Ticker>,
    balances: HashMap<String, Vec<CoinDetail>>,
    positions: Vec<Holding>,
    leverage: HashMap<String, f64>,
    orders: Vec<PendingOrder>,
    /// Error returned by the next margin adjustment, then cleared.
    margin_error: Option<(String, String)>,
    /// Delay applied to every public call.
    latency: Duration,
}

#[derive(Default)]
struct Counters {
    margin_calls: AtomicUsize,
    instrument_calls: AtomicUsize,
    position_mode_switches: AtomicUsize,
}

impl PaperExchange {
    /// Account in single-currency margin tier, net position mode.
    pub fn new() -> Self {
        let exchange = Self::default();
        exchange.set_account_config(AccountConfig {
            level: "2".into(),
            position_mode: PositionMode::Net,
        });
        exchange
    }

    /// Seed BTC spot and swap instruments, tickers and a 1000 USDT balance.
    pub fn with_btc_market() -> Self {
        let exchange = Self::new();
        exchange.list_instrument(InstrumentInfo {
            instrument_id: "BTC-USDT".into(),
            kind: InstrumentKind::Spot,
            contract_value: 1.0,
            tick_size: 0.1,
            lot_size: 0.00000001,
            min_size: 0.00001,
        });
        exchange.list_instrument(InstrumentInfo {
            instrument_id: "BTC-USDT-SWAP".into(),
            kind: InstrumentKind::Swap,
            contract_value: 0.01,
            tick_size: 0.1,
            lot_size: 1.0,
            min_size: 1.0,
        });
        exchange.set_ticker(Ticker {
            instrument_id: "BTC-USDT".into(),
            last: 30_000.0,
            bid: 29_999.9,
            ask: 30_000.1,
            timestamp_ms: 1_700_000_000_000,
        });
        exchange.set_ticker(Ticker {
            instrument_id: "BTC-USDT-SWAP".into(),
            last: 30_010.0,
            bid: 30_009.9,
            ask: 30_010.1,
            timestamp_ms: 1_700_000_000_000,
        });
        exchange.set_balance("USDT", 1_000.0);
        exchange
    }

    pub fn set_account_config(&self, config: AccountConfig) {
        self.state.write().config = Some(config);
    }

    /// Make the simulated account refuse position mode changes.
    pub fn pin_position_mode(&self) {
        self.state.write().pin_position_mode = true;
    }

    pub fn list_instrument(&self, info: InstrumentInfo) {
        self.state
            .write()
            .instruments
            .insert((info.kind, info.instrument_id.clone()), info);
    }

    pub fn set_ticker(&self, ticker: Ticker) {
        self.state
            .write()
            .tickers
            .insert(ticker.instrument_id.clone(), ticker);
    }

    /// Replace the balance details of `coin` with a single entry.
    pub fn set_balance(&self, coin: &str, available_equity: f64) {
        self.state.write().balances.insert(
            coin.to_string(),
            vec![CoinDetail {
                currency: coin.to_string(),
                available_equity,
            }],
        );
    }

    pub fn open_position(&self, holding: Holding) {
        self.state.write().positions.push(holding);
    }

    pub fn set_leverage(&self, instrument_id: &str, lever: f64) {
        self.state
            .write()
            .leverage
            .insert(instrument_id.to_string(), lever);
    }

    pub fn add_pending_order(&self, order: PendingOrder) {
        self.state.write().orders.push(order);
    }

    /// Fail the next margin adjustment with an exchange error.
    pub fn fail_next_margin(&self, code: &str, message: &str) {
        self.state.write().margin_error = Some((code.to_string(), message.to_string()));
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state.write().latency = latency;
    }

    /// Margin adjustment requests received, including failed ones.
    pub fn margin_calls(&self) -> usize {
        self.counters.margin_calls.load(Ordering::SeqCst)
    }

    pub fn instrument_calls(&self) -> usize {
        self.counters.instrument_calls.load(Ordering::SeqCst)
    }

    pub fn position_mode_switches(&self) -> usize {
        self.counters.position_mode_switches.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = self.state.read().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Connector for PaperExchange {
    fn connect(&self, account_id: u32) -> Result<Capabilities> {
        info!(account_id, "Connecting paper exchange");
        Ok(Capabilities::from_client(Arc::new(self.clone())))
    }
}

#[async_trait]
impl AccountApi for PaperExchange {
    async fn account_config(&self) -> Result<AccountConfig> {
        self.state
            .read()
            .config
            .clone()
            .ok_or_else(|| Error::exchange("50001", "account config unavailable"))
    }

    async fn set_position_mode(&self, mode: PositionMode) -> Result<()> {
        self.counters
            .position_mode_switches
            .fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write();
        if state.pin_position_mode {
            debug!(%mode, "Paper position mode pinned, ignoring switch");
            return Ok(());
        }
        if let Some(config) = state.config.as_mut() {
            config.position_mode = mode;
        }
        Ok(())
    }

    async fn coin_account(&self, coin: &str) -> Result<CoinAccount> {
        let details = self.state.read().balances.get(coin).cloned().unwrap_or_default();
        Ok(CoinAccount { details })
    }

    async fn positions(&self, instrument_id: &str) -> Result<Vec<Holding>> {
        Ok(self
            .state
            .read()
            .positions
            .iter()
            .filter(|h| h.instrument_id == instrument_id)
            .cloned()
            .collect())
    }

    async fn leverage(&self, instrument_id: &str, margin_mode: MarginMode) -> Result<LeverageInfo> {
        let lever = self
            .state
            .read()
            .leverage
            .get(instrument_id)
            .copied()
            .unwrap_or(1.0);
        Ok(LeverageInfo { lever, margin_mode })
    }

    async fn adjust_margin(
        &self,
        instrument_id: &str,
        position_side: PositionSide,
        direction: MarginDirection,
        amount: f64,
    ) -> Result<bool> {
        self.counters.margin_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.write();
        if let Some((code, message)) = state.margin_error.take() {
            return Err(Error::exchange(code, message));
        }

        let Some(holding) = state
            .positions
            .iter_mut()
            .find(|h| h.instrument_id == instrument_id && h.margin_mode == MarginMode::Isolated)
        else {
            return Err(Error::exchange("51000", format!("no isolated position on {instrument_id}")));
        };

        match direction {
            MarginDirection::Add => holding.margin += amount,
            MarginDirection::Reduce => {
                if amount > holding.margin {
                    return Ok(false);
                }
                holding.margin -= amount;
            }
        }
        debug!(
            instrument_id,
            side = %position_side,
            %direction,
            amount,
            margin = holding.margin,
            "Paper margin adjusted"
        );
        Ok(true)
    }
}

#[async_trait]
impl TradeApi for PaperExchange {
    async fn pending_orders(&self, instrument_id: &str) -> Result<Vec<PendingOrder>> {
        Ok(self
            .state
            .read()
            .orders
            .iter()
            .filter(|o| o.instrument_id == instrument_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PublicApi for PaperExchange {
    async fn instrument(&self, kind: InstrumentKind, instrument_id: &str) -> Result<InstrumentInfo> {
        self.counters.instrument_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        self.state
            .read()
            .instruments
            .get(&(kind, instrument_id.to_string()))
            .cloned()
            .ok_or_else(|| {
                Error::exchange(
                    UNKNOWN_INSTRUMENT,
                    format!("Instrument ID {instrument_id} does not exist"),
                )
            })
    }

    async fn ticker(&self, instrument_id: &str) -> Result<Ticker> {
        self.simulate_latency().await;
        self.state
            .read()
            .tickers
            .get(instrument_id)
            .cloned()
            .ok_or_else(|| {
                Error::exchange(UNKNOWN_INSTRUMENT, format!("No ticker for {instrument_id}"))
            })
    }
}
