use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    AccountConfig, CoinAccount, Holding, InstrumentInfo, InstrumentKind, LeverageInfo,
    MarginDirection, MarginMode, PendingOrder, PositionMode, PositionSide, Result, Ticker,
};

/// Private account endpoints: balances, positions, leverage and margin.
///
/// `OkxClient` implements this against the exchange.
/// `PaperExchange` implements this in memory.
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn account_config(&self) -> Result<AccountConfig>;

    async fn set_position_mode(&self, mode: PositionMode) -> Result<()>;

    /// Balance details for one currency.
    async fn coin_account(&self, coin: &str) -> Result<CoinAccount>;

    /// All open positions on one instrument, in every margin mode.
    async fn positions(&self, instrument_id: &str) -> Result<Vec<Holding>>;

    async fn leverage(&self, instrument_id: &str, margin_mode: MarginMode)
        -> Result<LeverageInfo>;

    /// Move margin into or out of an isolated position.
    /// `Ok(false)` means the exchange accepted the call but reported no transfer.
    async fn adjust_margin(
        &self,
        instrument_id: &str,
        position_side: PositionSide,
        direction: MarginDirection,
        amount: f64,
    ) -> Result<bool>;
}

/// Order endpoints.
#[async_trait]
pub trait TradeApi: Send + Sync {
    async fn pending_orders(&self, instrument_id: &str) -> Result<Vec<PendingOrder>>;
}

/// Unauthenticated market metadata.
#[async_trait]
pub trait PublicApi: Send + Sync {
    async fn instrument(&self, kind: InstrumentKind, instrument_id: &str)
        -> Result<InstrumentInfo>;

    async fn ticker(&self, instrument_id: &str) -> Result<Ticker>;
}

/// The three handles an adapter owns for its whole life.
#[derive(Clone)]
pub struct Capabilities {
    pub account: Arc<dyn AccountApi>,
    pub trade: Arc<dyn TradeApi>,
    pub public: Arc<dyn PublicApi>,
}

impl Capabilities {
    /// One client serving all three roles.
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: AccountApi + TradeApi + PublicApi + 'static,
    {
        Self {
            account: client.clone(),
            trade: client.clone(),
            public: client,
        }
    }
}

/// Builds capability handles for an account id.
pub trait Connector: Send + Sync {
    fn connect(&self, account_id: u32) -> Result<Capabilities>;
}
