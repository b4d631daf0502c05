use serde::{Deserialize, Serialize};

use crate::precision::round_to;

/// Quote currency every pair is settled in.
pub const QUOTE_CURRENCY: &str = "USDT";

/// Instrument family as understood by the public metadata endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentKind {
    Spot,
    Swap,
}

impl std::fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentKind::Spot => write!(f, "SPOT"),
            InstrumentKind::Swap => write!(f, "SWAP"),
        }
    }
}

/// `BTC` -> `BTC-USDT`.
pub fn spot_instrument_id(coin: &str) -> String {
    format!("{coin}-{QUOTE_CURRENCY}")
}

/// `BTC` -> `BTC-USDT-SWAP`.
pub fn swap_instrument_id(coin: &str) -> String {
    format!("{coin}-{QUOTE_CURRENCY}-SWAP")
}

/// Exchange-published contract parameters for one tradable symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub instrument_id: String,
    pub kind: InstrumentKind,
    /// Base-currency amount per contract. Spot instruments report `1.0`.
    pub contract_value: f64,
    pub tick_size: f64,
    pub lot_size: f64,
    pub min_size: f64,
}

impl InstrumentInfo {
    pub fn round_price(&self, price: f64) -> f64 {
        round_to(price, self.tick_size)
    }

    pub fn round_size(&self, size: f64) -> f64 {
        round_to(size, self.lot_size)
    }
}

/// Top-of-book snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub instrument_id: String,
    pub last: f64,
    pub bid: f64,
    pub ask: f64,
    /// Exchange timestamp in milliseconds.
    pub timestamp_ms: u64,
}

/// How long and short exposure on one instrument is booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionMode {
    /// Single signed position per instrument.
    #[serde(rename = "net_mode")]
    Net,
    #[serde(rename = "long_short_mode")]
    LongShort,
}

impl std::fmt::Display for PositionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionMode::Net => write!(f, "net_mode"),
            PositionMode::LongShort => write!(f, "long_short_mode"),
        }
    }
}

/// Account-wide settings relevant to contract trading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Trading tier: "1" simple, "2" single-currency margin, "3" multi-currency
    /// margin, "4" portfolio margin.
    pub level: String,
    pub position_mode: PositionMode,
}

impl AccountConfig {
    /// The simple tier only trades spot.
    pub fn allows_contracts(&self) -> bool {
        self.level != "1"
    }
}

/// Balance detail for one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinDetail {
    pub currency: String,
    pub available_equity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoinAccount {
    pub details: Vec<CoinDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    Cross,
    Isolated,
}

impl std::fmt::Display for MarginMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarginMode::Cross => write!(f, "cross"),
            MarginMode::Isolated => write!(f, "isolated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Net,
    Long,
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Net => write!(f, "net"),
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

/// Direction of an isolated-margin transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginDirection {
    Add,
    Reduce,
}

impl std::fmt::Display for MarginDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarginDirection::Add => write!(f, "add"),
            MarginDirection::Reduce => write!(f, "reduce"),
        }
    }
}

/// One open swap position as reported by the account endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub instrument_id: String,
    pub margin_mode: MarginMode,
    /// Signed contract count. Negative is short in net mode.
    pub size: f64,
    /// Margin currently held by the position, in USDT.
    pub margin: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeverageInfo {
    pub lever: f64,
    pub margin_mode: MarginMode,
}

/// Working order, surfaced through the trade capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub order_id: String,
    pub instrument_id: String,
    pub side: String,
    pub price: f64,
    pub size: f64,
}

/// Live exchange or the exchange's simulated-trading environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Live,
    Sandbox,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Live => write!(f, "live"),
            Environment::Sandbox => write!(f, "sandbox"),
        }
    }
}

/// Whether the binary talks to the exchange or to the in-memory simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

/// Human-facing notices produced by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Instrument metadata for the coin could not be resolved.
    NonexistentSymbol { coin: String },
    /// Position mode was not net and a switch was requested.
    PositionModeSwitched { from: PositionMode },
    MarginTransferred {
        direction: MarginDirection,
        amount: f64,
    },
    TransferFailed {
        code: Option<String>,
        message: String,
    },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::NonexistentSymbol { coin } => {
                write!(f, "{coin} does not exist on the exchange")
            }
            Diagnostic::PositionModeSwitched { from } => {
                write!(f, "position mode was {from}, switched to net_mode")
            }
            Diagnostic::MarginTransferred { direction, amount } => match direction {
                MarginDirection::Add => write!(f, "added {amount} {QUOTE_CURRENCY} margin"),
                MarginDirection::Reduce => write!(f, "reduced {amount} {QUOTE_CURRENCY} margin"),
            },
            Diagnostic::TransferFailed { code, message } => match code {
                Some(code) => write!(f, "margin transfer failed ({code}): {message}"),
                None => write!(f, "margin transfer failed: {message}"),
            },
        }
    }
}
