use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The exchange answered with a non-zero business code.
    #[error("Exchange API error {code}: {message}")]
    Exchange { code: String, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    /// Account settings that downstream position math depends on cannot be satisfied.
    #[error("Account precondition failed: {0}")]
    Precondition(String),

    #[error("Instrument metadata not resolved for {0}")]
    MissingMetadata(String),

    #[error("Adapter was constructed without a coin")]
    NoCoin,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn exchange(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Exchange {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Exchange business code, if this error came from the exchange.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Exchange { code, .. } => Some(code),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
