pub mod auth;
pub mod connector;
pub mod rest;

pub use auth::Signer;
pub use connector::OkxConnector;
pub use rest::{OkxClient, INSTRUMENT_NOT_FOUND};
