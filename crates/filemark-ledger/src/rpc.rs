//! Minimal Ethereum JSON-RPC transport over HTTP.
//!
//! One `POST` per call. Transport and HTTP failures become `Connectivity`;
//! JSON-RPC error objects are classified into `TransactionReverted`,
//! `Rejected`, or `Protocol` by [`classify_rpc_error`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use filemark_contracts::{TrackerError, TrackerResult};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// A JSON-RPC endpoint.
#[derive(Debug)]
pub struct JsonRpcTransport {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    /// Create a transport for `url`. Each request is bounded by
    /// `request_timeout`.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> TrackerResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TrackerError::Config {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call `method` with `params` and deserialize the `result` member.
    ///
    /// A missing `result` is treated as JSON `null`, so `T = Option<_>`
    /// observes "not found" answers such as a pending receipt.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> TrackerResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, url = %self.url, "json-rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TrackerError::Connectivity {
                reason: format!("{method} request to {} failed: {e}", self.url),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Connectivity {
                reason: format!("{method} returned HTTP {status}"),
            });
        }

        let parsed: RpcResponse = response.json().await.map_err(|e| TrackerError::Protocol {
            reason: format!("{method} returned malformed JSON-RPC response: {e}"),
        })?;

        if let Some(error) = parsed.error {
            return Err(classify_rpc_error(
                error.code,
                &error.message,
                error.data.as_ref(),
            ));
        }

        serde_json::from_value(parsed.result.unwrap_or(Value::Null)).map_err(|e| {
            TrackerError::Protocol {
                reason: format!("{method} returned an unexpected result: {e}"),
            }
        })
    }
}

/// Map a JSON-RPC error object onto the tracker's error taxonomy.
pub fn classify_rpc_error(code: i64, message: &str, data: Option<&Value>) -> TrackerError {
    let lower = message.to_ascii_lowercase();
    let detail = match data {
        Some(Value::String(s)) => format!("{message} ({s})"),
        Some(other) if !other.is_null() => format!("{message} ({other})"),
        _ => message.to_string(),
    };

    // Node implementations use code 3 for execution reverts.
    if code == 3 || lower.contains("revert") {
        return TrackerError::TransactionReverted {
            tx_hash: None,
            reason: detail,
        };
    }

    const REJECTIONS: [&str; 6] = [
        "insufficient funds",
        "nonce too low",
        "nonce too high",
        "underpriced",
        "fee cap",
        "already known",
    ];
    if REJECTIONS.iter().any(|needle| lower.contains(needle)) {
        return TrackerError::Rejected { reason: detail };
    }

    TrackerError::Protocol {
        reason: format!("JSON-RPC error {code}: {detail}"),
    }
}

/// Render `value` as a JSON-RPC quantity (`0x`-prefixed, no leading zeros).
pub fn to_quantity(value: u128) -> String {
    format!("{value:#x}")
}

/// Parse a JSON-RPC quantity.
pub fn parse_quantity(s: &str) -> TrackerResult<u128> {
    let digits = strip_hex_prefix(s)?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).map_err(|e| TrackerError::Protocol {
        reason: format!("invalid quantity '{s}': {e}"),
    })
}

/// Parse a quantity that must fit in 64 bits.
pub fn parse_quantity_u64(s: &str) -> TrackerResult<u64> {
    let value = parse_quantity(s)?;
    u64::try_from(value).map_err(|_| TrackerError::Protocol {
        reason: format!("quantity '{s}' does not fit in 64 bits"),
    })
}

/// Parse `0x`-prefixed binary data.
pub fn parse_data(s: &str) -> TrackerResult<Vec<u8>> {
    let digits = strip_hex_prefix(s)?;
    hex::decode(digits).map_err(|e| TrackerError::Protocol {
        reason: format!("invalid hex data: {e}"),
    })
}

/// Render bytes as `0x`-prefixed data.
pub fn to_data(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn strip_hex_prefix(s: &str) -> TrackerResult<&str> {
    let trimmed = s.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| TrackerError::Protocol {
            reason: format!("expected 0x-prefixed hex, got '{trimmed}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_render_without_leading_zeros() {
        assert_eq!(to_quantity(0), "0x0");
        assert_eq!(to_quantity(255), "0xff");
        assert_eq!(to_quantity(31337), "0x7a69");
    }

    #[test]
    fn quantities_parse() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0x7a69").unwrap(), 31337);
        assert_eq!(parse_quantity_u64("0X10").unwrap(), 16);
        assert!(matches!(parse_quantity("7a69"), Err(TrackerError::Protocol { .. })));
        assert!(matches!(parse_quantity("0xzz"), Err(TrackerError::Protocol { .. })));
        assert!(matches!(
            parse_quantity_u64("0x1ffffffffffffffff"),
            Err(TrackerError::Protocol { .. })
        ));
    }

    #[test]
    fn data_parses() {
        assert_eq!(parse_data("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_data("0xdeadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(to_data(&[0xde, 0xad]), "0xdead");
        assert!(parse_data("0xabc").is_err());
    }

    #[test]
    fn reverts_are_classified() {
        let err = classify_rpc_error(3, "execution reverted", Some(&json!("0x08c379a0")));
        match err {
            TrackerError::TransactionReverted { tx_hash, reason } => {
                assert!(tx_hash.is_none());
                assert!(reason.contains("0x08c379a0"));
            }
            other => panic!("expected TransactionReverted, got {other:?}"),
        }
        assert!(matches!(
            classify_rpc_error(-32000, "VM Exception: revert", None),
            TrackerError::TransactionReverted { .. }
        ));
    }

    #[test]
    fn node_refusals_are_rejections() {
        for message in [
            "insufficient funds for gas * price + value",
            "nonce too low",
            "replacement transaction underpriced",
            "max fee per gas less than block base fee: fee cap too low",
        ] {
            assert!(
                matches!(classify_rpc_error(-32000, message, None), TrackerError::Rejected { .. }),
                "{message}"
            );
        }
    }

    #[test]
    fn other_errors_are_protocol() {
        let err = classify_rpc_error(-32601, "the method eth_foo does not exist", None);
        assert!(matches!(err, TrackerError::Protocol { .. }));
        assert!(err.to_string().contains("-32601"));
    }
}
