pub mod config;
pub mod error;
pub mod exchange;
pub mod precision;
pub mod types;

pub use config::{Config, CredentialProvider, CredentialStore, Credentials};
pub use error::{Error, Result};
pub use exchange::{AccountApi, Capabilities, Connector, PublicApi, TradeApi};
pub use precision::round_to;
pub use types::*;
