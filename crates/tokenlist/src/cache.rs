use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chain::TokenInfo;
use crate::error::Error;
use crate::json;
use crate::types::token::ChainId;

/// Last observed on-chain metadata for one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// `{impl}--{chainId}--{address}`
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
}

impl VerificationRecord {
    pub fn new(impl_name: &str, cache_key: &str, info: TokenInfo) -> Self {
        Self {
            id: format!("{impl_name}--{cache_key}"),
            name: info.name,
            symbol: info.symbol,
            decimals: info.decimals,
        }
    }

    pub fn info(&self) -> TokenInfo {
        TokenInfo {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
        }
    }
}

/// Cache key `{chainId}--{address}`.
pub fn cache_key(chain_id: &ChainId, address: &str) -> String {
    format!("{chain_id}--{address}")
}

/// Verified token metadata persisted as one sorted JSON object.
///
/// Loaded fully into memory; every insert rewrites the whole file so that an
/// interrupted run keeps everything verified so far.
#[derive(Debug, Default)]
pub struct VerificationCache {
    path: Option<PathBuf>,
    records: BTreeMap<String, VerificationRecord>,
}

impl VerificationCache {
    /// A cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache at `path`. A missing or unreadable file starts empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "verification cache unreadable, starting empty");
                    BTreeMap::new()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "verification cache not found, starting empty");
                BTreeMap::new()
            }
        };
        info!(path = %path.display(), count = records.len(), "verification cache loaded");
        Self {
            path: Some(path),
            records,
        }
    }

    pub fn get(&self, key: &str) -> Option<&VerificationRecord> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Insert or replace a record and persist the cache immediately.
    pub fn insert(&mut self, key: String, record: VerificationRecord) -> Result<(), Error> {
        self.records.insert(key, record);
        self.save()
    }

    pub fn save(&self) -> Result<(), Error> {
        match &self.path {
            Some(path) => json::write_sorted(path, &self.records, 2, true),
            None => Ok(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
