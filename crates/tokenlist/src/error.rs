use thiserror::Error;

/// Unified error type for the token registry.
#[derive(Debug, Error)]
pub enum Error {
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcomes of an on-chain metadata query that are not a successful lookup.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The identifier does not reference a deployed contract or mint.
    #[error("{0} is not a contract")]
    InvalidContract(String),

    #[error("rpc transport failed: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed rpc response: {0}")]
    Decode(#[from] DecodeError),
}

impl ChainError {
    pub fn is_invalid_contract(&self) -> bool {
        matches!(self, ChainError::InvalidContract(_))
    }
}

/// Errors while decoding a single field from a chain response.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("return data too short: expected at least {expected} bytes, got {actual}")]
    DataTooShort { expected: usize, actual: usize },

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid ABI encoding: {0}")]
    InvalidEncoding(String),

    #[error("missing field: {0}")]
    MissingField(String),
}
