use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Source tag for the manually curated per-chain lists.
pub const SOURCE_ONEKEY: &str = "onekey";

/// Source tag for tokens derived from CoinGecko market data.
pub const SOURCE_COINGECKO: &str = "coingecko";

/// Chain identifier as it appears in list files: EVM chains use integers,
/// other families often use strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainId::Number(n) => write!(f, "{n}"),
            ChainId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ChainId {
    fn from(n: u64) -> Self {
        ChainId::Number(n)
    }
}

impl From<&str> for ChainId {
    fn from(s: &str) -> Self {
        ChainId::Text(s.to_string())
    }
}

/// A single token entry of a list.
///
/// Fields not modelled here are kept in `extra` so that rewriting a list file
/// does not lose data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(rename = "chainId")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<ChainId>,

    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub symbol: String,

    #[serde(default)]
    pub name: String,

    /// `None` means unknown, which is distinct from a 0-decimals token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,

    #[serde(rename = "logoURI")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Extensions::is_empty")]
    pub extensions: Extensions,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TokenRecord {
    pub fn new(
        chain_id: impl Into<ChainId>,
        address: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            chain_id: Some(chain_id.into()),
            address: address.into(),
            symbol: symbol.into(),
            name: name.into(),
            decimals: None,
            logo_uri: None,
            extensions: Extensions::default(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = Some(decimals);
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.extensions.add_sources([source]);
        self
    }

    /// Identity key within one chain: the lowercased address.
    pub fn key(&self) -> String {
        self.address.to_lowercase()
    }

    pub fn sources(&self) -> &[String] {
        &self.extensions.source
    }
}

/// The `extensions` object of a token entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extensions {
    /// Provenance tags, without duplicates, in first-seen order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,

    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl Extensions {
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.other.is_empty()
    }

    /// Add provenance tags, skipping ones already present.
    pub fn add_sources<'a>(&mut self, sources: impl IntoIterator<Item = &'a str>) {
        for source in sources {
            if !self.source.iter().any(|s| s == source) {
                self.source.push(source.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_accepts_numbers_and_strings() {
        let n: ChainId = serde_json::from_str("1").unwrap();
        let s: ChainId = serde_json::from_str("\"101\"").unwrap();
        assert_eq!(n, ChainId::Number(1));
        assert_eq!(s, ChainId::Text("101".to_string()));
        assert_eq!(n.to_string(), "1");
        assert_eq!(s.to_string(), "101");
    }

    #[test]
    fn test_decimals_zero_is_not_unknown() {
        let zero: TokenRecord =
            serde_json::from_str(r#"{"address":"0xa","symbol":"A","name":"A","decimals":0}"#)
                .unwrap();
        let unknown: TokenRecord =
            serde_json::from_str(r#"{"address":"0xa","symbol":"A","name":"A"}"#).unwrap();
        assert_eq!(zero.decimals, Some(0));
        assert_eq!(unknown.decimals, None);
    }

    #[test]
    fn test_unknown_fields_survive_reserialization() {
        let json = r#"{
            "chainId": 1,
            "address": "0xabc",
            "symbol": "ABC",
            "name": "Abc",
            "tags": ["stable"],
            "extensions": { "source": ["onekey"], "bridgeInfo": { "10": "0xdef" } }
        }"#;
        let token: TokenRecord = serde_json::from_str(json).unwrap();
        assert_eq!(token.sources(), ["onekey"]);

        let value = serde_json::to_value(&token).unwrap();
        assert_eq!(value["tags"][0], "stable");
        assert_eq!(value["extensions"]["bridgeInfo"]["10"], "0xdef");
        assert!(value.get("decimals").is_none());
    }

    #[test]
    fn test_add_sources_deduplicates() {
        let mut ext = Extensions::default();
        ext.add_sources(["onekey", "ext"]);
        ext.add_sources(["ext", "coingecko"]);
        assert_eq!(ext.source, ["onekey", "ext", "coingecko"]);
    }
}
