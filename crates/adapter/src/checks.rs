use tracing::{error, info, warn};

use common::{Diagnostic, Error, PositionMode, Result};

use crate::ExchangeAccountAdapter;

impl ExchangeAccountAdapter {
    /// Contract trading needs an account tier above the simple (spot-only) one.
    pub async fn check_account_level(&self) -> Result<()> {
        let config = self.account.account_config().await?;
        if !config.allows_contracts() {
            error!(level = %config.level, "Account tier does not allow contract trading");
            return Err(Error::Precondition(format!(
                "account level {} cannot trade swaps; upgrade the account mode",
                config.level
            )));
        }
        Ok(())
    }

    /// Position math assumes one net position per swap instrument. Switches the
    /// account to net mode if needed and verifies the switch took.
    pub async fn check_position_mode(&self) -> Result<()> {
        let config = self.account.account_config().await?;
        if config.position_mode != PositionMode::Net {
            warn!(mode = %config.position_mode, "Position mode is not net, switching");
            self.account.set_position_mode(PositionMode::Net).await?;
            self.notify(Diagnostic::PositionModeSwitched {
                from: config.position_mode,
            });
        }

        let config = self.account.account_config().await?;
        if config.position_mode != PositionMode::Net {
            error!(mode = %config.position_mode, "Failed to switch to net position mode");
            return Err(Error::Precondition(format!(
                "position mode is {} and could not be set to net_mode",
                config.position_mode
            )));
        }
        info!("Position mode is net");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::AccountConfig;
    use paper::PaperExchange;

    use super::*;

    async fn adapter_on(exchange: &PaperExchange) -> ExchangeAccountAdapter {
        ExchangeAccountAdapter::new(Some("BTC"), 3, exchange)
            .unwrap()
            .await
    }

    #[tokio::test]
    async fn simple_tier_is_a_precondition_failure() {
        let exchange = PaperExchange::with_btc_market();
        exchange.set_account_config(AccountConfig {
            level: "1".into(),
            position_mode: PositionMode::Net,
        });
        let adapter = adapter_on(&exchange).await;

        let err = adapter.check_account_level().await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[tokio::test]
    async fn margin_tiers_pass_level_check() {
        let exchange = PaperExchange::with_btc_market();
        let adapter = adapter_on(&exchange).await;
        adapter.check_account_level().await.unwrap();
    }

    #[tokio::test]
    async fn net_mode_needs_no_switch() {
        let exchange = PaperExchange::with_btc_market();
        let adapter = adapter_on(&exchange).await;

        adapter.check_position_mode().await.unwrap();
        assert_eq!(exchange.position_mode_switches(), 0);
    }

    #[tokio::test]
    async fn long_short_mode_is_switched_to_net() {
        let exchange = PaperExchange::with_btc_market();
        exchange.set_account_config(AccountConfig {
            level: "2".into(),
            position_mode: PositionMode::LongShort,
        });
        let adapter = adapter_on(&exchange).await;

        adapter.check_position_mode().await.unwrap();
        assert_eq!(exchange.position_mode_switches(), 1);
    }

    #[tokio::test]
    async fn refused_switch_is_a_precondition_failure() {
        let exchange = PaperExchange::with_btc_market();
        exchange.set_account_config(AccountConfig {
            level: "2".into(),
            position_mode: PositionMode::LongShort,
        });
        exchange.pin_position_mode();
        let adapter = adapter_on(&exchange).await;

        let err = adapter.check_position_mode().await.unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
        assert_eq!(exchange.position_mode_switches(), 1);
    }
}
