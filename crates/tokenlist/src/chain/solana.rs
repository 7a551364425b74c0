use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::rpc::{self, RpcTransport};
use super::{ChainAdapter, TokenInfo};
use crate::error::ChainError;

/// SPL mint lookup over Solana JSON-RPC. Only decimals are available from
/// the mint account; name and symbol stay unknown.
pub struct SolanaAdapter {
    transport: Arc<dyn RpcTransport>,
}

impl SolanaAdapter {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ChainAdapter for SolanaAdapter {
    async fn get_token_info(&self, identifier: &str) -> Result<TokenInfo, ChainError> {
        let response = self
            .transport
            .send(rpc::request(
                1,
                "getAccountInfo",
                json!([identifier, { "encoding": "jsonParsed" }]),
            ))
            .await?;
        let result = rpc::into_result(response)?;

        if result.is_null() || result.get("value").is_some_and(Value::is_null) {
            return Err(ChainError::InvalidContract(identifier.to_string()));
        }

        let parsed = result
            .pointer("/value/data/parsed")
            .filter(|p| p.get("type").and_then(Value::as_str) == Some("mint"));

        let Some(parsed) = parsed else {
            debug!(mint = identifier, "account is not a parsed mint");
            return Ok(TokenInfo::default());
        };

        Ok(TokenInfo {
            decimals: parsed
                .pointer("/info/decimals")
                .and_then(Value::as_u64)
                .and_then(|d| u8::try_from(d).ok()),
            ..TokenInfo::default()
        })
    }
}
