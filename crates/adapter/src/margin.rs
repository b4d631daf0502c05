use std::time::Duration;

use tracing::{debug, error, info, warn};

use common::{Diagnostic, MarginDirection, PositionSide};

use crate::ExchangeAccountAdapter;

/// Exchange code for "margin adjusted too frequently".
pub const RATE_LIMIT_CODE: &str = "58110";

pub const DEFAULT_MARGIN_COOLDOWN: Duration = Duration::from_secs(600);

impl ExchangeAccountAdapter {
    /// Move `amount` USDT into the isolated swap position.
    pub async fn add_margin(&self, amount: f64) -> bool {
        self.transfer_margin(MarginDirection::Add, amount).await
    }

    /// Move `amount` USDT out of the isolated swap position.
    pub async fn reduce_margin(&self, amount: f64) -> bool {
        self.transfer_margin(MarginDirection::Reduce, amount).await
    }

    /// Returns whether the transfer happened. A rate-limit rejection holds the
    /// caller for the configured cool-down before returning. Never retries.
    async fn transfer_margin(&self, direction: MarginDirection, amount: f64) -> bool {
        if amount.is_nan() || amount <= 0.0 {
            return false;
        }
        let Ok(swap_id) = self.own_swap_id() else {
            debug!(%direction, "Margin transfer on adapter without a coin");
            return false;
        };

        match self
            .account
            .adjust_margin(swap_id, PositionSide::Net, direction, amount)
            .await
        {
            Ok(true) => {
                info!(instrument = swap_id, %direction, amount, "Margin transferred");
                self.notify(Diagnostic::MarginTransferred { direction, amount });
                true
            }
            Ok(false) => {
                warn!(instrument = swap_id, %direction, amount, "Exchange reported no margin transfer");
                false
            }
            Err(e) => {
                error!(instrument = swap_id, %direction, amount, error = %e, "Margin transfer failed");
                self.notify(Diagnostic::TransferFailed {
                    code: e.code().map(str::to_owned),
                    message: e.to_string(),
                });
                if e.code() == Some(RATE_LIMIT_CODE) {
                    warn!(
                        cooldown_secs = self.margin_cooldown.as_secs(),
                        "Margin transfers rate limited, cooling down"
                    );
                    tokio::time::sleep(self.margin_cooldown).await;
                }
                false
            }
        }
    }
}
