use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::token::ChainId;

/// Static configuration of one chain, read from `tokens/<code>/chain.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Directory name under the tokens dir; not part of `chain.json`.
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub id: String,

    #[serde(rename = "chainId")]
    pub chain_id: ChainId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "impl")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impl_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coingecko: Option<CoingeckoConfig>,

    #[serde(rename = "rpcURLs")]
    #[serde(default)]
    pub rpc_urls: Vec<RpcUrl>,

    #[serde(default)]
    pub token_source: Vec<TokenSourceConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoingeckoConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcUrl {
    pub url: String,
}

/// A third-party token list to pull into a chain's list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSourceConfig {
    pub url: String,

    /// Dotted path to the token array inside the response; empty means the
    /// response itself is the array.
    #[serde(default)]
    pub path: String,

    pub source: String,
}

impl Network {
    /// Implementation family, defaulting to the directory code.
    pub fn impl_name(&self) -> &str {
        match self.impl_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.code,
        }
    }

    /// CoinGecko platform id, if ranking and market data are enabled.
    pub fn platform(&self) -> Option<&str> {
        self.coingecko
            .as_ref()
            .and_then(|cg| cg.platform.as_deref())
            .filter(|p| !p.is_empty())
    }

    pub fn first_rpc_url(&self) -> Option<&str> {
        self.rpc_urls
            .first()
            .map(|rpc| rpc.url.as_str())
            .filter(|url| !url.is_empty())
    }

    /// Lookup key `{impl}--{chainId}`.
    pub fn registry_key(&self) -> String {
        network_key(self.impl_name(), &self.chain_id)
    }
}

pub fn network_key(impl_name: &str, chain_id: &ChainId) -> String {
    format!("{impl_name}--{chain_id}")
}

/// Networks indexed by `{impl}--{chainId}`.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    networks: HashMap<String, Network>,
}

impl NetworkRegistry {
    pub fn new(networks: impl IntoIterator<Item = Network>) -> Self {
        let mut registry = Self::default();
        for network in networks {
            registry.insert(network);
        }
        registry
    }

    pub fn insert(&mut self, network: Network) {
        // `id` is conventionally `{impl}--{chainId}` already; index both so a
        // differing id still resolves.
        if !network.id.is_empty() {
            self.networks.insert(network.id.clone(), network.clone());
        }
        self.networks.insert(network.registry_key(), network);
    }

    pub fn get(&self, impl_name: &str, chain_id: &ChainId) -> Option<&Network> {
        self.networks.get(&network_key(impl_name, chain_id))
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
