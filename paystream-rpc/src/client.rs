//! Minimal Ethereum JSON-RPC client over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use paystream_core::error::{PaystreamError, Result};
use paystream_core::types::EthAddress;

use crate::config::RpcConfig;

/// JSON-RPC code several providers use for oversized log queries.
pub const LIMIT_EXCEEDED_CODE: i64 = -32005;

/// Message fragments providers use when refusing an `eth_getLogs` range.
const RANGE_LIMIT_HINTS: &[&str] = &[
    "block range",
    "range is too large",
    "range too large",
    "too many blocks",
    "query returned more than",
    "response size exceeded",
    "exceed maximum block range",
];

/// Returns true if a JSON-RPC error means "ask for fewer blocks".
pub fn is_range_limit(code: i64, message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    if message.contains("rate limit") || message.contains("request rate") {
        return false;
    }
    code == LIMIT_EXCEEDED_CODE || RANGE_LIMIT_HINTS.iter().any(|h| message.contains(h))
}

/// JSON-RPC client bound to one endpoint.
pub struct JsonRpcClient {
    url: String,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Creates a client for the configured endpoint.
    pub fn new(config: &RpcConfig) -> Result<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PaystreamError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            url: config.rpc_url.clone(),
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Performs one call and returns the raw `result`.
    ///
    /// Network failures, HTTP errors, and unparseable bodies are
    /// `TransportError`; a JSON-RPC error object is `RpcError`.
    #[instrument(skip(self, params))]
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": self.next_id.fetch_add(1, Ordering::Relaxed)
        });

        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PaystreamError::TransportError(format!("{}: {}", method, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaystreamError::TransportError(format!("{}: {}", method, e)))?;

        let json: Value = match serde_json::from_str(&body) {
            Ok(json) => json,
            Err(_) if !status.is_success() => {
                return Err(PaystreamError::TransportError(format!(
                    "{}: HTTP {}",
                    method, status
                )));
            }
            Err(e) => {
                return Err(PaystreamError::TransportError(format!(
                    "{}: malformed response: {}",
                    method, e
                )));
            }
        };

        if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown RPC error")
                .to_string();
            debug!(method, code, error = %message, "RPC error");
            return Err(PaystreamError::RpcError { code, message });
        }

        if !status.is_success() {
            return Err(PaystreamError::TransportError(format!(
                "{}: HTTP {}",
                method, status
            )));
        }

        json.get("result").cloned().ok_or_else(|| {
            PaystreamError::TransportError(format!("{}: response carries no result", method))
        })
    }

    /// Performs one call and deserializes the `result`.
    pub async fn call_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let result = self.call(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// `eth_call` against the latest block, returning the raw return data.
    pub async fn eth_call(&self, to: EthAddress, data: &[u8]) -> Result<Vec<u8>> {
        let result: String = self
            .call_as(
                "eth_call",
                serde_json::json!([
                    { "to": address_param(&to), "data": encode_bytes(data) },
                    "latest"
                ]),
            )
            .await?;
        decode_bytes(&result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEX ENCODING HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Encodes a quantity as minimal `0x` hex.
pub fn encode_quantity(value: u64) -> String {
    format!("{:#x}", value)
}

/// Decodes a `0x` hex quantity.
pub fn decode_quantity(value: &str) -> Result<u128> {
    let digits = value.strip_prefix("0x").ok_or_else(|| {
        PaystreamError::AbiError(format!("quantity without 0x prefix: {}", value))
    })?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| PaystreamError::AbiError(format!("bad quantity {}: {}", value, e)))
}

/// Decodes a `0x` hex quantity that must fit in 64 bits.
pub fn decode_u64(value: &str) -> Result<u64> {
    u64::try_from(decode_quantity(value)?)
        .map_err(|_| PaystreamError::AbiError(format!("quantity overflows u64: {}", value)))
}

/// Encodes bytes as `0x` hex data.
pub fn encode_bytes(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decodes `0x` hex data.
pub fn decode_bytes(value: &str) -> Result<Vec<u8>> {
    Ok(hex::decode(value.strip_prefix("0x").unwrap_or(value))?)
}

/// Lowercase `0x` address as nodes expect it in params.
pub fn address_param(address: &EthAddress) -> String {
    encode_bytes(address.as_bytes())
}
