use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::rpc::{self, RpcTransport};
use super::{ChainAdapter, TokenInfo};
use crate::error::{ChainError, DecodeError};

/// Error causes meaning the account has no contract deployed.
const NO_CONTRACT_CAUSES: &[&str] = &["NO_CONTRACT_CODE", "UNKNOWN_ACCOUNT"];

/// NEP-141 metadata lookup over NEAR JSON-RPC.
pub struct NearAdapter {
    transport: Arc<dyn RpcTransport>,
}

impl NearAdapter {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    async fn query(&self, params: Value) -> Result<Value, ChainError> {
        let response = self.transport.send(rpc::request(1, "query", params)).await?;
        rpc::into_result(response)
    }

    async fn has_code(&self, account_id: &str) -> Result<bool, ChainError> {
        let result = self
            .query(json!({
                "request_type": "view_code",
                "finality": "final",
                "account_id": account_id,
            }))
            .await;

        match result {
            Ok(Value::Null) => Ok(false),
            Ok(Value::Object(code)) => Ok(code
                .get("code_base64")
                .and_then(Value::as_str)
                .map_or(!code.is_empty(), |c| !c.is_empty())),
            Ok(_) => Ok(true),
            Err(ChainError::Rpc { message, .. })
                if NO_CONTRACT_CAUSES.iter().any(|c| message.contains(c)) =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ChainAdapter for NearAdapter {
    async fn get_token_info(&self, identifier: &str) -> Result<TokenInfo, ChainError> {
        if !self.has_code(identifier).await? {
            return Err(ChainError::InvalidContract(identifier.to_string()));
        }

        let result = self
            .query(json!({
                "request_type": "call_function",
                "finality": "final",
                "account_id": identifier,
                "method_name": "ft_metadata",
                "args_base64": "",
            }))
            .await?;

        parse_ft_metadata(&result).map_err(ChainError::from)
    }
}

/// Decode the `call_function` result: a byte array holding UTF-8 JSON.
fn parse_ft_metadata(result: &Value) -> Result<TokenInfo, DecodeError> {
    let bytes = result
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| DecodeError::MissingField("result".to_string()))?
        .iter()
        .map(|b| {
            b.as_u64()
                .and_then(|b| u8::try_from(b).ok())
                .ok_or_else(|| DecodeError::InvalidEncoding(format!("not a byte: {b}")))
        })
        .collect::<Result<Vec<u8>, _>>()?;

    let metadata: Value = serde_json::from_slice(&bytes)
        .map_err(|e| DecodeError::InvalidEncoding(format!("ft_metadata is not JSON: {e}")))?;

    let text = |key: &str| metadata.get(key).and_then(Value::as_str).map(str::to_string);
    Ok(TokenInfo {
        name: text("name"),
        symbol: text("symbol"),
        decimals: metadata.get("decimals").and_then(coerce_decimals),
    })
}

fn coerce_decimals(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u8::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
