use common::{Holding, InstrumentKind, MarginMode, Result, Ticker, QUOTE_CURRENCY};

use crate::ExchangeAccountAdapter;

// Reads only. Empty answers from the exchange map to 0.0 / None.
impl ExchangeAccountAdapter {
    /// Available USDT.
    pub async fn usdt_balance(&self) -> Result<f64> {
        self.spot_position(Some(QUOTE_CURRENCY)).await
    }

    /// Available equity of `coin`, defaulting to the adapter's coin.
    pub async fn spot_position(&self, coin: Option<&str>) -> Result<f64> {
        let coin = match coin {
            Some(coin) => coin,
            None => self.own_coin()?,
        };
        let account = self.account.coin_account(coin).await?;
        Ok(account
            .details
            .first()
            .map_or(0.0, |detail| detail.available_equity))
    }

    /// The isolated-margin position on a swap instrument, if any. Cross-margin
    /// entries are ignored.
    pub async fn swap_holding(&self, instrument_id: Option<&str>) -> Result<Option<Holding>> {
        let instrument_id = match instrument_id {
            Some(id) => id,
            None => self.own_swap_id()?,
        };
        let positions = self.account.positions(instrument_id).await?;
        Ok(positions
            .into_iter()
            .find(|holding| holding.margin_mode == MarginMode::Isolated))
    }

    /// Swap exposure in base-currency units, sign flipped so a short hedge
    /// against a long spot holding reads positive.
    pub async fn swap_position(&self, instrument_id: Option<&str>) -> Result<f64> {
        let instrument_id = match instrument_id {
            Some(id) => id,
            None => self.own_swap_id()?,
        };
        let info = self
            .public
            .instrument(InstrumentKind::Swap, instrument_id)
            .await?;
        self.refresh_swap_info(&info);

        match self.swap_holding(Some(instrument_id)).await? {
            Some(holding) if holding.size != 0.0 => Ok(-holding.size * info.contract_value),
            _ => Ok(0.0),
        }
    }

    /// Margin held by the isolated swap position, in USDT.
    pub async fn swap_balance(&self) -> Result<f64> {
        Ok(self
            .swap_holding(None)
            .await?
            .map_or(0.0, |holding| holding.margin))
    }

    pub async fn get_leverage(&self) -> Result<u32> {
        let info = self
            .account
            .leverage(self.own_swap_id()?, MarginMode::Isolated)
            .await?;
        Ok(info.lever as u32)
    }

    /// Spot and swap tickers, fetched together.
    pub async fn get_tickers(&self) -> Result<(Ticker, Ticker)> {
        let spot_id = self.own_spot_id()?;
        let swap_id = self.own_swap_id()?;
        tokio::try_join!(self.public.ticker(spot_id), self.public.ticker(swap_id))
    }

    /// Whole swap contracts closest to (not above) `base_amount` of the coin.
    /// Needs the resolved swap snapshot.
    pub fn swap_contracts_for(&self, base_amount: f64) -> Result<f64> {
        let (_, swap) = self.instrument_pair()?;
        Ok(swap.round_size(base_amount / swap.contract_value))
    }
}
