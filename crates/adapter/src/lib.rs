pub mod adapter;
pub mod checks;
pub mod margin;
pub mod queries;

pub use adapter::{AdapterBuilder, ExchangeAccountAdapter, Instruments};
pub use margin::{DEFAULT_MARGIN_COOLDOWN, RATE_LIMIT_CODE};
