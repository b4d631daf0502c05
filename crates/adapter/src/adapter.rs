use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use common::{
    spot_instrument_id, swap_instrument_id, AccountApi, Capabilities, Connector, Diagnostic,
    Error, InstrumentInfo, InstrumentKind, PublicApi, Result, TradeApi,
};

use crate::margin::DEFAULT_MARGIN_COOLDOWN;

/// Resolution state of the spot/swap instrument pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruments {
    /// Built inside a running runtime; waiting for `finalize`.
    Pending,
    Ready {
        spot: InstrumentInfo,
        swap: InstrumentInfo,
    },
    /// No coin, or the coin's instruments could not be resolved.
    Disabled,
}

/// Spot balance, swap position and isolated margin for one `<coin>-USDT` pair.
///
/// Construction never fails because of the market: an unknown coin leaves the
/// adapter disabled (`exists() == false`). Inside a tokio runtime the
/// constructor cannot block, so the instrument lookups are deferred until the
/// adapter is awaited:
///
/// ```ignore
/// let adapter = ExchangeAccountAdapter::new(Some("BTC"), 3, &connector)?.await;
/// ```
pub struct ExchangeAccountAdapter {
    account_id: u32,
    coin: Option<String>,
    spot_instrument_id: Option<String>,
    swap_instrument_id: Option<String>,
    instruments: RwLock<Instruments>,
    pub(crate) account: Arc<dyn AccountApi>,
    trade: Arc<dyn TradeApi>,
    pub(crate) public: Arc<dyn PublicApi>,
    pub(crate) margin_cooldown: Duration,
    diagnostics: Option<mpsc::UnboundedSender<Diagnostic>>,
}

/// Collects construction options before the capability handles are created.
pub struct AdapterBuilder {
    account_id: u32,
    coin: Option<String>,
    margin_cooldown: Duration,
    diagnostics: Option<mpsc::UnboundedSender<Diagnostic>>,
}

impl AdapterBuilder {
    pub fn new(account_id: u32) -> Self {
        Self {
            account_id,
            coin: None,
            margin_cooldown: DEFAULT_MARGIN_COOLDOWN,
            diagnostics: None,
        }
    }

    pub fn coin(mut self, coin: impl Into<String>) -> Self {
        self.coin = Some(coin.into());
        self
    }

    /// How long a rate-limited margin transfer holds the caller.
    pub fn margin_cooldown(mut self, cooldown: Duration) -> Self {
        self.margin_cooldown = cooldown;
        self
    }

    pub fn diagnostics(mut self, tx: mpsc::UnboundedSender<Diagnostic>) -> Self {
        self.diagnostics = Some(tx);
        self
    }

    /// Create capability handles for the account, then build.
    pub fn connect(self, connector: &dyn Connector) -> Result<ExchangeAccountAdapter> {
        let capabilities = connector.connect(self.account_id)?;
        Ok(self.build(capabilities))
    }

    /// Build on existing handles. Outside a runtime this resolves the
    /// instrument pair before returning.
    pub fn build(self, capabilities: Capabilities) -> ExchangeAccountAdapter {
        let coin = self.coin.filter(|c| !c.is_empty());
        let initial = if coin.is_some() {
            Instruments::Pending
        } else {
            Instruments::Disabled
        };

        let adapter = ExchangeAccountAdapter {
            account_id: self.account_id,
            spot_instrument_id: coin.as_deref().map(spot_instrument_id),
            swap_instrument_id: coin.as_deref().map(swap_instrument_id),
            coin,
            instruments: RwLock::new(initial),
            account: capabilities.account,
            trade: capabilities.trade,
            public: capabilities.public,
            margin_cooldown: self.margin_cooldown,
            diagnostics: self.diagnostics,
        };

        if adapter.is_pending() && tokio::runtime::Handle::try_current().is_err() {
            adapter.resolve_blocking();
        }
        adapter
    }
}

impl ExchangeAccountAdapter {
    pub fn new(coin: Option<&str>, account_id: u32, connector: &dyn Connector) -> Result<Self> {
        let builder = AdapterBuilder::new(account_id);
        match coin {
            Some(coin) => builder.coin(coin).connect(connector),
            None => builder.connect(connector),
        }
    }

    pub fn builder(account_id: u32) -> AdapterBuilder {
        AdapterBuilder::new(account_id)
    }

    /// Resolve the instrument pair if construction deferred it.
    /// Awaiting the adapter directly does the same.
    pub async fn finalize(self) -> Self {
        if self.is_pending() {
            let outcome = self.lookup_instruments().await;
            self.settle(outcome);
        }
        self
    }

    fn resolve_blocking(&self) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                self.settle(Err(Error::Io(e)));
                return;
            }
        };
        let outcome = runtime.block_on(self.lookup_instruments());
        self.settle(outcome);
    }

    /// Both lookups are issued together and joined; either failing fails the pair.
    async fn lookup_instruments(&self) -> Result<(InstrumentInfo, InstrumentInfo)> {
        let (Some(spot_id), Some(swap_id)) = (
            self.spot_instrument_id.as_deref(),
            self.swap_instrument_id.as_deref(),
        ) else {
            return Err(Error::NoCoin);
        };
        debug!(spot = spot_id, swap = swap_id, "Resolving instruments");
        tokio::try_join!(
            self.public.instrument(InstrumentKind::Spot, spot_id),
            self.public.instrument(InstrumentKind::Swap, swap_id),
        )
    }

    fn settle(&self, outcome: Result<(InstrumentInfo, InstrumentInfo)>) {
        let coin = self.coin.clone().unwrap_or_default();
        match outcome {
            Ok((spot, swap)) => {
                info!(coin = %coin, account_id = self.account_id, "Instruments resolved");
                *self.instruments.write() = Instruments::Ready { spot, swap };
            }
            Err(e) => {
                warn!(coin = %coin, error = %e, "Instrument lookup failed, adapter disabled");
                *self.instruments.write() = Instruments::Disabled;
                self.notify(Diagnostic::NonexistentSymbol { coin });
            }
        }
    }

    pub(crate) fn notify(&self, diagnostic: Diagnostic) {
        if let Some(tx) = &self.diagnostics {
            let _ = tx.send(diagnostic);
        }
    }

    pub fn account_id(&self) -> u32 {
        self.account_id
    }

    pub fn coin(&self) -> Option<&str> {
        self.coin.as_deref()
    }

    pub fn spot_instrument_id(&self) -> Option<&str> {
        self.spot_instrument_id.as_deref()
    }

    pub fn swap_instrument_id(&self) -> Option<&str> {
        self.swap_instrument_id.as_deref()
    }

    pub(crate) fn own_coin(&self) -> Result<&str> {
        self.coin.as_deref().ok_or(Error::NoCoin)
    }

    pub(crate) fn own_swap_id(&self) -> Result<&str> {
        self.swap_instrument_id.as_deref().ok_or(Error::NoCoin)
    }

    pub(crate) fn own_spot_id(&self) -> Result<&str> {
        self.spot_instrument_id.as_deref().ok_or(Error::NoCoin)
    }

    /// False once the pair is known not to resolve. Still true while pending.
    pub fn exists(&self) -> bool {
        !matches!(*self.instruments.read(), Instruments::Disabled)
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.instruments.read(), Instruments::Pending)
    }

    pub fn instruments(&self) -> Instruments {
        self.instruments.read().clone()
    }

    pub fn spot_info(&self) -> Option<InstrumentInfo> {
        match &*self.instruments.read() {
            Instruments::Ready { spot, .. } => Some(spot.clone()),
            _ => None,
        }
    }

    pub fn swap_info(&self) -> Option<InstrumentInfo> {
        match &*self.instruments.read() {
            Instruments::Ready { swap, .. } => Some(swap.clone()),
            _ => None,
        }
    }

    /// Both snapshots, or `MissingMetadata` when the pair is not resolved.
    pub fn instrument_pair(&self) -> Result<(InstrumentInfo, InstrumentInfo)> {
        match &*self.instruments.read() {
            Instruments::Ready { spot, swap } => Ok((spot.clone(), swap.clone())),
            _ => Err(Error::MissingMetadata(
                self.coin.clone().unwrap_or_else(|| "<none>".into()),
            )),
        }
    }

    /// Replace the cached swap snapshot with a fresher copy of the same instrument.
    pub(crate) fn refresh_swap_info(&self, fresh: &InstrumentInfo) {
        if let Instruments::Ready { swap, .. } = &mut *self.instruments.write() {
            if swap.instrument_id == fresh.instrument_id {
                *swap = fresh.clone();
            }
        }
    }

    pub fn account(&self) -> &Arc<dyn AccountApi> {
        &self.account
    }

    /// Order endpoints. Not used by the adapter itself.
    pub fn trade(&self) -> &Arc<dyn TradeApi> {
        &self.trade
    }

    pub fn public(&self) -> &Arc<dyn PublicApi> {
        &self.public
    }
}

impl IntoFuture for ExchangeAccountAdapter {
    type Output = Self;
    type IntoFuture = Pin<Box<dyn Future<Output = Self> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.finalize())
    }
}

impl std::fmt::Debug for ExchangeAccountAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeAccountAdapter")
            .field("account_id", &self.account_id)
            .field("coin", &self.coin)
            .field("instruments", &*self.instruments.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paper::PaperExchange;

    fn diagnostics() -> (
        mpsc::UnboundedSender<Diagnostic>,
        mpsc::UnboundedReceiver<Diagnostic>,
    ) {
        mpsc::unbounded_channel()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Diagnostic>) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        while let Ok(d) = rx.try_recv() {
            out.push(d);
        }
        out
    }

    #[test]
    fn no_coin_is_disabled_without_lookups() {
        let exchange = PaperExchange::with_btc_market();
        let adapter = ExchangeAccountAdapter::new(None, 3, &exchange).unwrap();

        assert!(!adapter.exists());
        assert_eq!(adapter.instruments(), Instruments::Disabled);
        assert!(adapter.spot_info().is_none());
        assert!(adapter.swap_info().is_none());
        assert!(adapter.spot_instrument_id().is_none());
        assert_eq!(exchange.instrument_calls(), 0);
    }

    #[test]
    fn blocking_construction_resolves_before_returning() {
        let exchange = PaperExchange::with_btc_market();
        let adapter = ExchangeAccountAdapter::new(Some("BTC"), 3, &exchange).unwrap();

        assert!(adapter.exists());
        assert!(!adapter.is_pending());
        assert_eq!(adapter.spot_info().unwrap().instrument_id, "BTC-USDT");
        assert_eq!(adapter.swap_info().unwrap().instrument_id, "BTC-USDT-SWAP");
        assert_eq!(exchange.instrument_calls(), 2);
    }

    #[test]
    fn blocking_construction_of_unknown_coin_disables_with_one_diagnostic() {
        let exchange = PaperExchange::with_btc_market();
        let (tx, mut rx) = diagnostics();
        let adapter = ExchangeAccountAdapter::builder(3)
            .coin("NOPE")
            .diagnostics(tx)
            .connect(&exchange)
            .unwrap();

        assert!(!adapter.exists());
        assert!(adapter.spot_info().is_none());
        assert!(adapter.swap_info().is_none());
        assert_eq!(
            drain(&mut rx),
            vec![Diagnostic::NonexistentSymbol { coin: "NOPE".into() }]
        );
    }

    #[test]
    fn half_listed_pair_is_disabled() {
        let exchange = PaperExchange::new();
        exchange.list_instrument(InstrumentInfo {
            instrument_id: "ETH-USDT".into(),
            kind: InstrumentKind::Spot,
            contract_value: 1.0,
            tick_size: 0.01,
            lot_size: 0.000001,
            min_size: 0.001,
        });
        let adapter = ExchangeAccountAdapter::new(Some("ETH"), 3, &exchange).unwrap();
        assert!(!adapter.exists());
        assert!(adapter.spot_info().is_none());
    }

    #[tokio::test]
    async fn construction_inside_runtime_defers_until_awaited() {
        let exchange = PaperExchange::with_btc_market();
        let adapter = ExchangeAccountAdapter::new(Some("BTC"), 3, &exchange).unwrap();

        assert!(adapter.exists());
        assert!(adapter.is_pending());
        assert!(adapter.spot_info().is_none());
        assert!(matches!(
            adapter.instrument_pair(),
            Err(Error::MissingMetadata(_))
        ));
        assert_eq!(exchange.instrument_calls(), 0);

        let adapter = adapter.await;
        assert!(adapter.exists());
        assert!(adapter.spot_info().is_some());
        assert!(adapter.swap_info().is_some());
        assert_eq!(exchange.instrument_calls(), 2);
    }

    #[tokio::test]
    async fn awaiting_unknown_coin_disables_with_one_diagnostic() {
        let exchange = PaperExchange::with_btc_market();
        let (tx, mut rx) = diagnostics();
        let adapter = ExchangeAccountAdapter::builder(3)
            .coin("NOPE")
            .diagnostics(tx)
            .connect(&exchange)
            .unwrap()
            .finalize()
            .await;

        assert!(!adapter.exists());
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn awaiting_twice_does_not_repeat_lookups() {
        let exchange = PaperExchange::with_btc_market();
        let adapter = ExchangeAccountAdapter::new(Some("BTC"), 3, &exchange)
            .unwrap()
            .await;
        let adapter = adapter.await;
        assert!(adapter.exists());
        assert_eq!(exchange.instrument_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn instrument_lookups_run_concurrently() {
        let exchange = PaperExchange::with_btc_market();
        exchange.set_latency(Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        let adapter = ExchangeAccountAdapter::new(Some("BTC"), 3, &exchange)
            .unwrap()
            .await;

        assert!(adapter.exists());
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn connector_errors_propagate_from_construction() {
        struct NoAccounts;
        impl Connector for NoAccounts {
            fn connect(&self, account_id: u32) -> Result<Capabilities> {
                Err(Error::Credentials(format!("no credentials for account {account_id}")))
            }
        }
        let err = ExchangeAccountAdapter::new(Some("BTC"), 7, &NoAccounts).unwrap_err();
        assert!(matches!(err, Error::Credentials(_)));
    }
}
