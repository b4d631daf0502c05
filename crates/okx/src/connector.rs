use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use common::{Capabilities, Connector, CredentialProvider, Result};

use crate::OkxClient;

/// Connects account ids to OKX clients through a credential provider.
pub struct OkxConnector<P> {
    provider: P,
    timeout: Duration,
}

impl<P: CredentialProvider> OkxConnector<P> {
    pub fn new(provider: P, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

impl<P: CredentialProvider> Connector for OkxConnector<P> {
    fn connect(&self, account_id: u32) -> Result<Capabilities> {
        let credentials = self.provider.credentials(account_id)?;
        info!(
            account_id,
            environment = %credentials.environment,
            "Connecting OKX client"
        );
        let client = OkxClient::new(credentials, self.timeout)?;
        Ok(Capabilities::from_client(Arc::new(client)))
    }
}
