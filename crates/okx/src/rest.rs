use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use common::{
    AccountApi, AccountConfig, CoinAccount, CoinDetail, Credentials, Error, Holding,
    InstrumentInfo, InstrumentKind, LeverageInfo, MarginDirection, MarginMode, PendingOrder,
    PositionMode, PositionSide, PublicApi, Result, Ticker, TradeApi,
};

use crate::auth::Signer;

const BASE_URL: &str = "https://www.okx.com";

/// Returned by the public instrument endpoint for an unknown instrument id.
pub const INSTRUMENT_NOT_FOUND: &str = "51001";

/// REST client for the OKX v5 API. Serves the account, trade and public
/// capabilities from one connection pool.
pub struct OkxClient {
    signer: Signer,
    http: Client,
    base_url: String,
}

impl OkxClient {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self> {
        Self::with_base_url(credentials, timeout, BASE_URL)
    }

    pub fn with_base_url(
        credentials: Credentials,
        timeout: Duration,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            signer: Signer::new(credentials),
            http,
            base_url: base_url.into(),
        })
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
        signed: bool,
    ) -> Result<Vec<T>> {
        let request_path = if query.is_empty() {
            path.to_string()
        } else {
            let qs = query
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("&");
            format!("{path}?{qs}")
        };
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let url = format!("{}{request_path}", self.base_url);

        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("Content-Type", "application/json");
        if signed {
            let ts = Signer::timestamp();
            let signature = self.signer.sign(&ts, method.as_str(), &request_path, &body);
            req = req
                .header("OK-ACCESS-KEY", self.signer.api_key())
                .header("OK-ACCESS-SIGN", signature)
                .header("OK-ACCESS-TIMESTAMP", ts)
                .header("OK-ACCESS-PASSPHRASE", self.signer.passphrase());
        }
        if self.signer.is_sandbox() {
            req = req.header("x-simulated-trading", "1");
        }
        if !body.is_empty() {
            req = req.body(body);
        }

        debug!(method = %method, path = %request_path, "OKX request");
        let resp = req.send().await.map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        // Business errors arrive with 4xx statuses too, so read the envelope first.
        match serde_json::from_str::<Envelope>(&text) {
            Ok(envelope) => envelope.into_data(),
            Err(_) if !status.is_success() => Err(Error::Http(format!("HTTP {status}: {text}"))),
            Err(e) => Err(Error::Json(e)),
        }
    }

    async fn private_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        self.request(Method::GET, path, query, None, true).await
    }

    async fn private_post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<Vec<T>> {
        self.request(Method::POST, path, &[], Some(body), true).await
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        self.request(Method::GET, path, query, None, false).await
    }
}

fn first<T>(data: Vec<T>, what: &str) -> Result<T> {
    data.into_iter()
        .next()
        .ok_or_else(|| Error::Other(format!("empty {what} response")))
}

#[async_trait]
impl AccountApi for OkxClient {
    async fn account_config(&self) -> Result<AccountConfig> {
        let raw: RawAccountConfig =
            first(self.private_get("/api/v5/account/config", &[]).await?, "account config")?;
        raw.try_into()
    }

    async fn set_position_mode(&self, mode: PositionMode) -> Result<()> {
        let _: Vec<serde_json::Value> = self
            .private_post(
                "/api/v5/account/set-position-mode",
                json!({ "posMode": mode.to_string() }),
            )
            .await?;
        Ok(())
    }

    async fn coin_account(&self, coin: &str) -> Result<CoinAccount> {
        let data: Vec<RawBalance> = self
            .private_get("/api/v5/account/balance", &[("ccy", coin)])
            .await?;
        // One balance object per account; no object means no holdings.
        let Some(balance) = data.into_iter().next() else {
            return Ok(CoinAccount::default());
        };
        let details = balance
            .details
            .into_iter()
            .map(|d| {
                Ok(CoinDetail {
                    currency: d.ccy,
                    available_equity: decimal(&d.avail_eq)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CoinAccount { details })
    }

    async fn positions(&self, instrument_id: &str) -> Result<Vec<Holding>> {
        let data: Vec<RawPosition> = self
            .private_get("/api/v5/account/positions", &[("instId", instrument_id)])
            .await?;
        data.into_iter().map(Holding::try_from).collect()
    }

    async fn leverage(&self, instrument_id: &str, margin_mode: MarginMode) -> Result<LeverageInfo> {
        let mode = margin_mode.to_string();
        let raw: RawLeverage = first(
            self.private_get(
                "/api/v5/account/leverage-info",
                &[("instId", instrument_id), ("mgnMode", mode.as_str())],
            )
            .await?,
            "leverage",
        )?;
        Ok(LeverageInfo {
            lever: decimal(&raw.lever)?,
            margin_mode: parse_margin_mode(&raw.mgn_mode)?,
        })
    }

    async fn adjust_margin(
        &self,
        instrument_id: &str,
        position_side: PositionSide,
        direction: MarginDirection,
        amount: f64,
    ) -> Result<bool> {
        let data: Vec<serde_json::Value> = self
            .private_post(
                "/api/v5/account/position/margin-balance",
                json!({
                    "instId": instrument_id,
                    "posSide": position_side.to_string(),
                    "type": direction.to_string(),
                    "amt": amount.to_string(),
                }),
            )
            .await?;
        Ok(!data.is_empty())
    }
}

#[async_trait]
impl TradeApi for OkxClient {
    async fn pending_orders(&self, instrument_id: &str) -> Result<Vec<PendingOrder>> {
        let data: Vec<RawOrder> = self
            .private_get("/api/v5/trade/orders-pending", &[("instId", instrument_id)])
            .await?;
        data.into_iter()
            .map(|o| {
                Ok(PendingOrder {
                    order_id: o.ord_id,
                    instrument_id: o.inst_id,
                    side: o.side,
                    price: decimal(&o.px)?,
                    size: decimal(&o.sz)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl PublicApi for OkxClient {
    async fn instrument(&self, kind: InstrumentKind, instrument_id: &str) -> Result<InstrumentInfo> {
        let kind_str = kind.to_string();
        let data: Vec<RawInstrument> = self
            .public_get(
                "/api/v5/public/instruments",
                &[("instType", kind_str.as_str()), ("instId", instrument_id)],
            )
            .await?;
        let raw = data.into_iter().next().ok_or_else(|| {
            Error::exchange(
                INSTRUMENT_NOT_FOUND,
                format!("Instrument ID {instrument_id} does not exist"),
            )
        })?;
        raw.into_info(kind)
    }

    async fn ticker(&self, instrument_id: &str) -> Result<Ticker> {
        let raw: RawTicker = first(
            self.public_get("/api/v5/market/ticker", &[("instId", instrument_id)])
                .await?,
            "ticker",
        )?;
        raw.try_into()
    }
}

/// OKX sends numbers as strings and uses `""` for "not applicable".
fn decimal(s: &str) -> Result<f64> {
    if s.is_empty() {
        return Ok(0.0);
    }
    s.parse::<f64>()
        .map_err(|e| Error::Other(format!("bad decimal '{s}': {e}")))
}

fn parse_margin_mode(s: &str) -> Result<MarginMode> {
    match s {
        "isolated" => Ok(MarginMode::Isolated),
        "cross" => Ok(MarginMode::Cross),
        other => Err(Error::Other(format!("unknown margin mode '{other}'"))),
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

/// `{"code": "0", "msg": "", "data": [...]}`. `data` is decoded only after
/// the code is checked because error responses carry a different shape.
#[derive(Deserialize)]
struct Envelope {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl Envelope {
    fn into_data<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        if self.code != "0" {
            return Err(Error::exchange(self.code, self.msg));
        }
        if self.data.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(self.data)?)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAccountConfig {
    acct_lv: String,
    pos_mode: String,
}

impl TryFrom<RawAccountConfig> for AccountConfig {
    type Error = Error;

    fn try_from(raw: RawAccountConfig) -> Result<Self> {
        let position_mode = match raw.pos_mode.as_str() {
            "net_mode" => PositionMode::Net,
            "long_short_mode" => PositionMode::LongShort,
            other => return Err(Error::Other(format!("unknown position mode '{other}'"))),
        };
        Ok(AccountConfig {
            level: raw.acct_lv,
            position_mode,
        })
    }
}

#[derive(Deserialize)]
struct RawBalance {
    #[serde(default)]
    details: Vec<RawBalanceDetail>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBalanceDetail {
    ccy: String,
    #[serde(default)]
    avail_eq: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    inst_id: String,
    mgn_mode: String,
    #[serde(default)]
    pos: String,
    #[serde(default)]
    margin: String,
}

impl TryFrom<RawPosition> for Holding {
    type Error = Error;

    fn try_from(raw: RawPosition) -> Result<Self> {
        Ok(Holding {
            instrument_id: raw.inst_id,
            margin_mode: parse_margin_mode(&raw.mgn_mode)?,
            size: decimal(&raw.pos)?,
            margin: decimal(&raw.margin)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLeverage {
    lever: String,
    mgn_mode: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrder {
    ord_id: String,
    inst_id: String,
    side: String,
    #[serde(default)]
    px: String,
    sz: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInstrument {
    inst_id: String,
    #[serde(default)]
    ct_val: String,
    tick_sz: String,
    lot_sz: String,
    min_sz: String,
}

impl RawInstrument {
    fn into_info(self, kind: InstrumentKind) -> Result<InstrumentInfo> {
        let contract_value = match decimal(&self.ct_val)? {
            v if v > 0.0 => v,
            _ => 1.0,
        };
        Ok(InstrumentInfo {
            instrument_id: self.inst_id,
            kind,
            contract_value,
            tick_size: decimal(&self.tick_sz)?,
            lot_size: decimal(&self.lot_sz)?,
            min_size: decimal(&self.min_sz)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTicker {
    inst_id: String,
    last: String,
    bid_px: String,
    ask_px: String,
    ts: String,
}

impl TryFrom<RawTicker> for Ticker {
    type Error = Error;

    fn try_from(raw: RawTicker) -> Result<Self> {
        Ok(Ticker {
            instrument_id: raw.inst_id,
            last: decimal(&raw.last)?,
            bid: decimal(&raw.bid_px)?,
            ask: decimal(&raw.ask_px)?,
            timestamp_ms: raw
                .ts
                .parse()
                .map_err(|e| Error::Other(format!("bad timestamp '{}': {e}", raw.ts)))?,
        })
    }
}
