//! On-chain verification of registry files.
//!
//! Every token is checked against the chain it claims to live on. Known
//! metadata is corrected in place, addresses with nothing deployed are
//! removed, and each successful lookup lands in the [`VerificationCache`]
//! so a rerun only queries tokens it has not seen.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, VerificationCache, VerificationRecord};
use crate::chain::{AdapterRegistry, TokenInfo};
use crate::error::{ChainError, Error};
use crate::json;
use crate::types::network::NetworkRegistry;
use crate::types::token::TokenRecord;

/// Result of checking one token sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCheck {
    /// Addresses, as written in the list, with nothing deployed on chain.
    pub invalid: HashSet<String>,
    /// Number of field corrections applied.
    pub corrected: usize,
    /// Number of on-chain lookups issued.
    pub lookups: usize,
}

/// Summary of one rewritten file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub path: PathBuf,
    pub checked: usize,
    pub corrected: usize,
    pub removed: usize,
}

/// Overwrite the fields of `token` that the chain reports differently.
///
/// Empty names and symbols never replace stored ones; a known decimals value
/// always wins. Returns the number of fields changed.
pub fn apply_corrections(token: &mut TokenRecord, info: &TokenInfo, id: &str) -> usize {
    let mut changed = 0;

    for (field, stored, reported) in [
        ("name", &mut token.name, &info.name),
        ("symbol", &mut token.symbol, &info.symbol),
    ] {
        if let Some(reported) = reported.as_deref().filter(|v| !v.is_empty()) {
            if stored != reported {
                warn!(id, field, old = stored.as_str(), new = reported, "correcting token field");
                *stored = reported.to_string();
                changed += 1;
            }
        }
    }

    if let Some(decimals) = info.decimals {
        if token.decimals != Some(decimals) {
            warn!(id, field = "decimals", old = ?token.decimals, new = decimals, "correcting token field");
            token.decimals = Some(decimals);
            changed += 1;
        }
    }

    changed
}

pub struct VerificationPipeline {
    networks: NetworkRegistry,
    adapters: AdapterRegistry,
    cache: VerificationCache,
    pacing: Duration,
}

impl VerificationPipeline {
    pub fn new(
        networks: NetworkRegistry,
        adapters: AdapterRegistry,
        cache: VerificationCache,
        pacing: Duration,
    ) -> Self {
        Self {
            networks,
            adapters,
            cache,
            pacing,
        }
    }

    pub fn cache(&self) -> &VerificationCache {
        &self.cache
    }

    /// Verify `tokens` of implementation family `impl_name` in place.
    ///
    /// Transport and RPC failures abort with an error; everything else is
    /// recorded per token and the run continues.
    pub async fn check_tokens(
        &mut self,
        impl_name: &str,
        tokens: &mut [TokenRecord],
    ) -> Result<TokenCheck, Error> {
        let mut outcome = TokenCheck::default();

        for token in tokens.iter_mut() {
            let Some(chain_id) = token.chain_id.clone() else {
                warn!(impl_name, address = %token.address, "token without chainId, skipping");
                continue;
            };
            let key = cache_key(&chain_id, &token.address);
            let id = format!("{impl_name}--{key}");

            if let Some(record) = self.cache.get(&key) {
                outcome.corrected += apply_corrections(token, &record.info(), &id);
                continue;
            }

            let Some(rpc_url) = self
                .networks
                .get(impl_name, &chain_id)
                .and_then(|network| network.first_rpc_url())
            else {
                warn!(id = %id, "no network config or RPC URL, passing token through");
                continue;
            };

            let Some(adapter) = self.adapters.get_or_create(impl_name, &chain_id, rpc_url)? else {
                debug!(id = %id, "no chain adapter for family");
                continue;
            };

            info!(id = %id, symbol = %token.symbol, "verifying token");
            outcome.lookups += 1;
            let result = adapter.get_token_info(&token.address).await;

            match result {
                Ok(info) => {
                    outcome.corrected += apply_corrections(token, &info, &id);
                    self.cache
                        .insert(key.clone(), VerificationRecord::new(impl_name, &key, info))?;
                }
                Err(ChainError::InvalidContract(_)) => {
                    warn!(id = %id, "not a contract, removing token");
                    outcome.invalid.insert(token.address.clone());
                }
                Err(ChainError::Decode(e)) => {
                    warn!(id = %id, error = %e, "unreadable chain response, keeping token unverified");
                }
                Err(e) => return Err(e.into()),
            }

            if !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        Ok(outcome)
    }

    /// Verify one registry file and rewrite it without the invalid tokens.
    pub async fn check_file(&mut self, impl_name: &str, path: &Path) -> Result<CheckReport, Error> {
        let content = std::fs::read_to_string(path)?;
        let mut list: Value = serde_json::from_str(&content)?;

        let mut tokens: Vec<TokenRecord> = match list.get_mut("tokens") {
            Some(tokens) => serde_json::from_value(tokens.take())?,
            None => Vec::new(),
        };
        let checked = tokens.len();

        let outcome = self.check_tokens(impl_name, &mut tokens).await?;
        tokens.retain(|t| !outcome.invalid.contains(&t.address));
        let removed = checked - tokens.len();

        if let Value::Object(map) = &mut list {
            map.insert("tokens".to_string(), serde_json::to_value(&tokens)?);
        }
        json::write_sorted(path, &list, 2, false)?;

        info!(
            path = %path.display(),
            checked,
            corrected = outcome.corrected,
            removed,
            "file verified"
        );
        Ok(CheckReport {
            path: path.to_path_buf(),
            checked,
            corrected: outcome.corrected,
            removed,
        })
    }

    pub async fn check_files(
        &mut self,
        impl_name: &str,
        paths: &[PathBuf],
    ) -> Result<Vec<CheckReport>, Error> {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            reports.push(self.check_file(impl_name, path).await?);
        }
        Ok(reports)
    }

    /// Verify every list file in `build_dir`, grouped by implementation
    /// family (the file name up to the first `.`).
    pub async fn check_dir(&mut self, build_dir: &Path) -> Result<Vec<CheckReport>, Error> {
        let groups = list_files_by_impl(build_dir)?;
        let mut reports = Vec::new();
        for (impl_name, paths) in groups {
            info!(impl_name = %impl_name, files = paths.len(), "checking implementation family");
            reports.extend(self.check_files(&impl_name, &paths).await?);
        }
        Ok(reports)
    }
}

/// `*.json` files in `dir` holding a non-empty `tokens` array, grouped by
/// the file name prefix before the first `.`.
pub fn list_files_by_impl(dir: &Path) -> Result<BTreeMap<String, Vec<PathBuf>>, Error> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        let content = std::fs::read_to_string(&path)?;
        let has_tokens = serde_json::from_str::<Value>(&content)?
            .get("tokens")
            .and_then(Value::as_array)
            .is_some_and(|tokens| !tokens.is_empty());
        if !has_tokens {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let impl_name = file_name.split('.').next().unwrap_or(file_name).to_string();
        groups.entry(impl_name).or_default().push(path);
    }
    Ok(groups)
}
