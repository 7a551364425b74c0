use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::rpc::{self, RpcTransport};
use super::{ChainAdapter, TokenInfo};
use crate::abi::{
    call_data, decode_decimals_result, decode_string_result, DECIMALS_SIGNATURE, NAME_SIGNATURE,
    SYMBOL_SIGNATURE,
};
use crate::error::ChainError;

const CODE_REQUEST_ID: u64 = 1;
const NAME_REQUEST_ID: u64 = 2;
const SYMBOL_REQUEST_ID: u64 = 3;
const DECIMALS_REQUEST_ID: u64 = 4;

/// ERC-20 metadata lookup over Ethereum JSON-RPC.
pub struct EvmAdapter {
    transport: Arc<dyn RpcTransport>,
}

impl EvmAdapter {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }

    async fn has_code(&self, address: &str) -> Result<bool, ChainError> {
        let response = self
            .transport
            .send(rpc::request(
                CODE_REQUEST_ID,
                "eth_getCode",
                json!([address, "latest"]),
            ))
            .await?;
        let code = rpc::into_result(response)?;
        Ok(matches!(code.as_str(), Some(c) if !c.is_empty() && c != "0x"))
    }
}

/// Lowercase and `0x`-prefix an address.
pub fn normalize_address(identifier: &str) -> String {
    let lower = identifier.trim().to_lowercase();
    if lower.starts_with("0x") {
        lower
    } else {
        format!("0x{lower}")
    }
}

fn is_well_formed(address: &str) -> bool {
    address.len() == 42 && address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    async fn get_token_info(&self, identifier: &str) -> Result<TokenInfo, ChainError> {
        let address = normalize_address(identifier);
        if !is_well_formed(&address) || !self.has_code(&address).await? {
            return Err(ChainError::InvalidContract(address));
        }

        let batch = [
            (NAME_REQUEST_ID, NAME_SIGNATURE),
            (SYMBOL_REQUEST_ID, SYMBOL_SIGNATURE),
            (DECIMALS_REQUEST_ID, DECIMALS_SIGNATURE),
        ]
        .iter()
        .map(|(id, signature)| {
            rpc::request(
                *id,
                "eth_call",
                json!([{ "to": address, "data": call_data(signature) }, "latest"]),
            )
        })
        .collect::<Vec<_>>();

        let response = self.transport.send(Value::Array(batch)).await?;
        let responses = rpc::sort_batch(response)?;

        let result_for = |id: u64| {
            responses
                .iter()
                .find(|r| r.get("id").and_then(Value::as_u64) == Some(id))
                .and_then(|r| r.get("result"))
                .and_then(Value::as_str)
        };

        let name = result_for(NAME_REQUEST_ID)
            .and_then(|r| field(&address, "name", decode_string_result(r)));
        let symbol = result_for(SYMBOL_REQUEST_ID)
            .and_then(|r| field(&address, "symbol", decode_string_result(r)));
        let decimals = result_for(DECIMALS_REQUEST_ID)
            .and_then(|r| field(&address, "decimals", decode_decimals_result(r)));

        Ok(TokenInfo {
            name,
            symbol,
            decimals,
        })
    }
}

/// A field that fails to decode becomes unknown rather than failing the call.
fn field<T, E: std::fmt::Display>(address: &str, name: &str, decoded: Result<T, E>) -> Option<T> {
    match decoded {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(%address, field = name, error = %e, "could not decode eth_call result");
            None
        }
    }
}
