// src/providers/wallet.rs
//! Address → native and token balances (Ethplorer-shaped API).

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::fetch::{FetchCore, FetchError, FetchRequest};
use crate::types::WalletBalance;

/// Balances below this are dropped as dust.
pub const DUST_THRESHOLD: f64 = 0.0001;
pub const NATIVE_SYMBOL: &str = "ETH";
pub const NATIVE_DECIMALS: u32 = 18;

#[derive(Debug, Deserialize)]
struct AddressInfo {
    #[serde(rename = "ETH")]
    eth: Option<NativeBalance>,
    #[serde(default)]
    tokens: Vec<TokenBalance>,
}

#[derive(Debug, Deserialize)]
struct NativeBalance {
    #[serde(rename = "rawBalance")]
    raw_balance: Option<Value>,
    balance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TokenBalance {
    #[serde(rename = "tokenInfo")]
    token_info: TokenInfo,
    #[serde(rename = "rawBalance")]
    raw_balance: Option<Value>,
    balance: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    symbol: Option<String>,
    decimals: Option<Value>,
}

/// Integer amount (string or number) scaled down by `10^decimals`.
pub fn scale_raw_balance(raw: &str, decimals: u32) -> Option<f64> {
    let raw = raw.trim();
    let units = match raw.parse::<u128>() {
        Ok(n) => n as f64,
        // scientific notation or fractional strings from loose upstreams
        Err(_) => raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)?,
    };
    let exp = i32::try_from(decimals).ok()?;
    Some(units / 10f64.powi(exp))
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decimals_of(v: Option<&Value>) -> Option<u32> {
    let s = value_as_string(v?)?;
    s.trim().parse::<u32>().ok().filter(|d| *d <= 36)
}

fn normalize_balances(info: AddressInfo) -> Vec<WalletBalance> {
    let mut out = Vec::new();

    if let Some(native) = info.eth {
        let amount = native
            .raw_balance
            .as_ref()
            .and_then(value_as_string)
            .and_then(|raw| scale_raw_balance(&raw, NATIVE_DECIMALS))
            .or(native.balance);
        if let Some(balance) = amount {
            out.push(WalletBalance {
                symbol: NATIVE_SYMBOL.to_string(),
                balance,
            });
        }
    }

    for token in info.tokens {
        let Some(symbol) = token
            .token_info
            .symbol
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
        else {
            continue;
        };
        let Some(decimals) = decimals_of(token.token_info.decimals.as_ref()) else {
            debug!(target: "wallet", %symbol, "token without decimals skipped");
            continue;
        };
        let raw = token
            .raw_balance
            .as_ref()
            .or(token.balance.as_ref())
            .and_then(value_as_string);
        if let Some(balance) = raw.and_then(|r| scale_raw_balance(&r, decimals)) {
            out.push(WalletBalance { symbol, balance });
        }
    }

    out.retain(|b| b.balance >= DUST_THRESHOLD);
    out
}

#[derive(Clone)]
pub struct WalletClient {
    core: FetchCore,
    base: String,
    api_key: String,
}

impl WalletClient {
    pub fn new(core: FetchCore, base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            core,
            base: base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Non-dust balances held by `address`; empty on failure.
    ///
    /// One attempt, no cache: balances must reflect the chain right now.
    pub async fn balances(&self, address: &str) -> Vec<WalletBalance> {
        let address = address.trim();
        if address.is_empty() {
            return Vec::new();
        }
        let url = format!(
            "{}/getAddressInfo/{}?apiKey={}",
            self.base,
            urlencoding::encode(address),
            urlencoding::encode(&self.api_key)
        );
        let req = FetchRequest::json(url).retries(1, 1000).cached(false);
        let res = self.core.fetch_json(req).await.and_then(|v| {
            serde_json::from_value::<AddressInfo>(v).map_err(|e| FetchError::Decode(e.to_string()))
        });
        match res {
            Ok(info) => normalize_balances(info),
            Err(e) => {
                warn!(target: "wallet", error = %e, "balance lookup failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decimal_conversion() {
        assert_eq!(scale_raw_balance("1000000000000000000", 18), Some(1.0));
        assert_eq!(scale_raw_balance("2500000", 6), Some(2.5));
        assert_eq!(scale_raw_balance("7", 0), Some(7.0));
        assert_eq!(scale_raw_balance("1.5e18", 18), Some(1.5));
        assert_eq!(scale_raw_balance("abc", 6), None);
    }

    #[test]
    fn normalizes_native_and_tokens_and_drops_dust() {
        let info: AddressInfo = serde_json::from_value(json!({
            "address": "0xabc",
            "ETH": {"balance": 1.0, "rawBalance": "1000000000000000000"},
            "tokens": [
                {"tokenInfo": {"symbol": "usdc", "decimals": "6"}, "balance": 2500000, "rawBalance": "2500000"},
                {"tokenInfo": {"symbol": "SPAM", "decimals": "18"}, "rawBalance": "1000"},
                {"tokenInfo": {"symbol": "LINK", "decimals": 18}, "balance": 3.0e18},
                {"tokenInfo": {"decimals": "18"}, "rawBalance": "1000000000000000000"}
            ]
        }))
        .unwrap();
        let out = normalize_balances(info);
        assert_eq!(
            out,
            vec![
                WalletBalance { symbol: "ETH".into(), balance: 1.0 },
                WalletBalance { symbol: "USDC".into(), balance: 2.5 },
                WalletBalance { symbol: "LINK".into(), balance: 3.0 },
            ]
        );
    }
}
