use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ChainError, DecodeError};

/// Raw JSON-RPC transport. `body` is either a single request object or a
/// batch array; the parsed response body is returned as-is.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, body: Value) -> Result<Value, ChainError>;
}

/// Build a JSON-RPC 2.0 request object.
pub fn request(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Extract `result` from a single response, turning an `error` member into
/// [`ChainError::Rpc`]. A missing or null result yields `Value::Null`.
pub fn into_result(response: Value) -> Result<Value, ChainError> {
    let mut obj = match response {
        Value::Object(obj) => obj,
        other => {
            return Err(DecodeError::InvalidEncoding(format!(
                "expected a JSON-RPC response object, got {other}"
            ))
            .into())
        }
    };

    if let Some(error) = obj.remove("error").filter(|e| !e.is_null()) {
        return Err(ChainError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    Ok(obj.remove("result").unwrap_or(Value::Null))
}

/// Reorder a batch response by request id; nodes may answer out of order.
/// Entries without a numeric id sort last.
///
/// Nodes that reject a whole batch answer with a single response object;
/// its `error` member surfaces as [`ChainError::Rpc`].
pub fn sort_batch(response: Value) -> Result<Vec<Value>, ChainError> {
    let mut items = match response {
        Value::Array(items) => items,
        single @ Value::Object(_) => {
            into_result(single)?;
            return Err(DecodeError::InvalidEncoding(
                "expected a JSON-RPC batch response, got a single response".to_string(),
            )
            .into());
        }
        other => {
            return Err(DecodeError::InvalidEncoding(format!(
                "expected a JSON-RPC batch response, got {other}"
            ))
            .into())
        }
    };
    items.sort_by_key(|item| item.get("id").and_then(Value::as_u64).unwrap_or(u64::MAX));
    Ok(items)
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;
    use tracing::debug;

    use super::RpcTransport;
    use crate::error::ChainError;

    /// JSON-RPC over HTTP POST.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: reqwest::Client,
        url: String,
    }

    impl HttpTransport {
        pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ChainError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| ChainError::Transport(e.to_string()))?;
            Ok(Self {
                client,
                url: url.into(),
            })
        }

        pub fn url(&self) -> &str {
            &self.url
        }
    }

    #[async_trait]
    impl RpcTransport for HttpTransport {
        async fn send(&self, body: Value) -> Result<Value, ChainError> {
            debug!(url = %self.url, request = %body, "rpc request");
            let response = self
                .client
                .post(&self.url)
                .json(&body)
                .send()
                .await
                .map_err(|e| ChainError::Transport(format!("{}: {e}", self.url)))?
                .error_for_status()
                .map_err(|e| ChainError::Transport(format!("{}: {e}", self.url)))?;

            let value: Value = response
                .json()
                .await
                .map_err(|e| ChainError::Transport(format!("{}: invalid response body: {e}", self.url)))?;
            debug!(url = %self.url, response = %value, "rpc response");
            Ok(value)
        }
    }
}
