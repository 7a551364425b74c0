//! Token sources feeding a build: chain configs and curated lists on disk,
//! third-party list URLs, and market data.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{DecodeError, Error};
use crate::market::{CoinList, MarketData};
use crate::types::network::{Network, TokenSourceConfig};
use crate::types::token::{ChainId, TokenRecord, SOURCE_COINGECKO, SOURCE_ONEKEY};

const CHAIN_FILE: &str = "chain.json";
const TOKENS_FILE: &str = "tokens.json";

/// Sub-directories of `tokens_dir`, sorted by name.
fn network_dirs(tokens_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(tokens_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Load every `<code>/chain.json` under `tokens_dir`. Directories without a
/// chain config are skipped.
pub fn load_networks(tokens_dir: &Path) -> Result<Vec<Network>, Error> {
    let mut networks = Vec::new();
    for dir in network_dirs(tokens_dir)? {
        let path = dir.join(CHAIN_FILE);
        if !path.is_file() {
            debug!(dir = %dir.display(), "no chain config, skipping");
            continue;
        }

        let content = std::fs::read_to_string(&path)?;
        let mut network: Network = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))?;
        network.code = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        networks.push(network);
    }
    info!(count = networks.len(), dir = %tokens_dir.display(), "loaded networks");
    Ok(networks)
}

/// The curated list of `network`, tagged with the network's chain id and
/// the `onekey` source. A missing or unreadable list is empty.
pub fn load_local_tokens(tokens_dir: &Path, network: &Network) -> Vec<TokenRecord> {
    let path = tokens_dir.join(&network.code).join(TOKENS_FILE);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => {
            debug!(network = %network.code, "no local token list");
            return Vec::new();
        }
    };

    let mut tokens: Vec<TokenRecord> = match serde_json::from_str(&content) {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "local token list unreadable, ignoring");
            return Vec::new();
        }
    };

    for token in &mut tokens {
        token.chain_id = Some(network.chain_id.clone());
        token.extensions.source = vec![SOURCE_ONEKEY.to_string()];
    }
    tokens
}

/// Check that every curated record has a string `symbol`, a string `name`
/// and a numeric `decimals`. Returns the number of records checked.
pub fn lint_local_tokens(tokens_dir: &Path) -> Result<usize, Error> {
    let mut checked = 0;
    let mut problems = Vec::new();

    for dir in network_dirs(tokens_dir)? {
        let path = dir.join(TOKENS_FILE);
        if !path.is_file() {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        let records = match serde_json::from_str::<Value>(&content)? {
            Value::Array(records) => records,
            _ => {
                problems.push(format!("{}: tokens.json must be an array", path.display()));
                continue;
            }
        };

        for (idx, record) in records.iter().enumerate() {
            checked += 1;
            let is_string = |key: &str| record.get(key).is_some_and(Value::is_string);
            if !is_string("symbol")
                || !is_string("name")
                || !record.get("decimals").is_some_and(Value::is_number)
            {
                problems.push(format!(
                    "{}[{idx}]: needs string symbol, string name and numeric decimals",
                    path.display()
                ));
            }
        }
    }

    if problems.is_empty() {
        Ok(checked)
    } else {
        Err(Error::Config(problems.join("\n")))
    }
}

/// Fetches the JSON body of a remote token list.
#[async_trait]
pub trait ListFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Value, Error>;
}

#[cfg(feature = "http")]
pub use http::HttpListFetcher;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::ListFetcher;
    use crate::error::Error;

    pub struct HttpListFetcher {
        client: reqwest::Client,
    }

    impl HttpListFetcher {
        pub fn new(timeout: Duration) -> Result<Self, Error> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl ListFetcher for HttpListFetcher {
        async fn fetch(&self, url: &str) -> Result<Value, Error> {
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| Error::Transport(format!("GET {url} failed: {e}")))?
                .error_for_status()
                .map_err(|e| Error::Transport(format!("GET {url} returned error: {e}")))?
                .json()
                .await
                .map_err(|e| Error::Transport(format!("invalid JSON from {url}: {e}")))
        }
    }
}

/// Follow a dotted `path` (`"tokens"`, `"data.tokens"`) into `body`. An
/// empty path selects the body itself.
fn select_path<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(body);
    }
    path.split('.').try_fold(body, |value, key| value.get(key))
}

fn third_party_record(raw: &Value, source: &str) -> Result<TokenRecord, DecodeError> {
    let field = |key: &str| raw.get(key).ok_or_else(|| DecodeError::MissingField(key.to_string()));
    let text = |key: &str| {
        field(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DecodeError::InvalidEncoding(format!("{key} is not a string")))
    };

    let chain_id: ChainId = serde_json::from_value(field("chainId")?.clone())
        .map_err(|e| DecodeError::InvalidEncoding(format!("chainId: {e}")))?;
    let decimals = field("decimals")?
        .as_u64()
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| DecodeError::InvalidEncoding("decimals is not a small integer".to_string()))?;

    let mut token = TokenRecord::new(chain_id, text("address")?, text("symbol")?, text("name")?)
        .with_decimals(decimals)
        .with_source(source);
    token.logo_uri = raw
        .get("logoURI")
        .and_then(Value::as_str)
        .filter(|uri| !uri.is_empty())
        .map(str::to_string);
    Ok(token)
}

/// Chain ids compare by their text so `1` and `"1"` match.
fn on_chain(token: &TokenRecord, chain_id: &str) -> bool {
    token
        .chain_id
        .as_ref()
        .is_some_and(|id| id.to_string() == chain_id)
}

/// Fetch every third-party list configured for `network`. A list that
/// cannot be fetched is skipped, as is any record missing a required field.
/// Lists commonly span several chains; only records for `network`'s chain
/// id are kept.
pub async fn fetch_third_party_tokens(
    network: &Network,
    fetcher: &dyn ListFetcher,
) -> Vec<TokenRecord> {
    let chain_id = network.chain_id.to_string();
    let mut tokens = Vec::new();
    for source in &network.token_source {
        let body = match fetcher.fetch(&source.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %source.url, error = %e, "third-party list unavailable, skipping");
                continue;
            }
        };

        let Some(records) = select_path(&body, &source.path).and_then(Value::as_array) else {
            warn!(url = %source.url, path = %source.path, "no token array at path, skipping");
            continue;
        };

        let before = tokens.len();
        let mut other_chain = 0usize;
        for raw in records {
            match third_party_record(raw, &source.source) {
                Ok(token) if on_chain(&token, &chain_id) => tokens.push(token),
                Ok(_) => other_chain += 1,
                Err(e) => warn!(url = %source.url, error = %e, "dropping third-party token"),
            }
        }
        if other_chain > 0 {
            debug!(
                url = %source.url,
                chain_id = %chain_id,
                dropped = other_chain,
                "dropping third-party tokens of other chains"
            );
        }
        info!(
            url = %source.url,
            source = %source.source,
            count = tokens.len() - before,
            "fetched third-party tokens"
        );
    }
    tokens
}

/// Records for the coins deployed on `network`'s market data platform.
pub fn market_tokens(
    network: &Network,
    coins: &CoinList,
    market: &HashMap<String, MarketData>,
) -> Vec<TokenRecord> {
    let Some(platform) = network.platform() else {
        return Vec::new();
    };

    coins
        .platform(platform)
        .iter()
        .filter_map(|coin| {
            let address = coins.address_on(&coin.id, platform)?;
            let mut token =
                TokenRecord::new(network.chain_id.clone(), address, &*coin.symbol, &*coin.name)
                    .with_source(SOURCE_COINGECKO);
            token.logo_uri = market.get(&coin.id).and_then(|data| data.image.clone());
            Some(token)
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::testing::StaticListFetcher;
    use super::*;
    use crate::market::CoinListing;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn source(url: &str, path: &str, tag: &str) -> TokenSourceConfig {
        TokenSourceConfig {
            url: url.to_string(),
            path: path.to_string(),
            source: tag.to_string(),
        }
    }

    #[test]
    fn test_load_networks_sets_code_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("eth/chain.json"),
            r#"{ "id": "evm--1", "chainId": 1, "impl": "evm" }"#,
        );
        write(
            &dir.path().join("bsc/chain.json"),
            r#"{ "id": "evm--56", "chainId": 56, "impl": "evm" }"#,
        );
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();

        let networks = load_networks(dir.path()).unwrap();
        let codes: Vec<&str> = networks.iter().map(|n| n.code.as_str()).collect();
        assert_eq!(codes, ["bsc", "eth"]);
        assert_eq!(networks[1].registry_key(), "evm--1");
    }

    #[test]
    fn test_load_networks_rejects_malformed_config() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("eth/chain.json"), "{ nope");
        assert!(matches!(load_networks(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_local_tokens_are_tagged() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("eth/tokens.json"),
            r#"[{ "address": "0xAAA", "symbol": "X", "name": "Ex", "decimals": 18,
                  "extensions": { "source": ["stale"], "bridge": true } }]"#,
        );
        let network: Network = serde_json::from_value(json!({ "chainId": 1 })).unwrap();
        let network = Network {
            code: "eth".to_string(),
            ..network
        };

        let tokens = load_local_tokens(dir.path(), &network);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].chain_id, Some(ChainId::Number(1)));
        assert_eq!(tokens[0].sources(), ["onekey"]);
        assert_eq!(tokens[0].extensions.other["bridge"], true);
    }

    #[test]
    fn test_missing_local_list_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let network: Network =
            serde_json::from_value(json!({ "code": "nowhere", "chainId": 1 })).unwrap();
        assert!(load_local_tokens(dir.path(), &network).is_empty());
    }

    #[test]
    fn test_lint_reports_bad_records() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("eth/tokens.json"),
            r#"[{ "address": "0x1", "symbol": "A", "name": "A", "decimals": 18 }]"#,
        );
        assert_eq!(lint_local_tokens(dir.path()).unwrap(), 1);

        write(
            &dir.path().join("sol/tokens.json"),
            r#"[{ "address": "M", "symbol": "B", "name": "B", "decimals": "6" }]"#,
        );
        let err = lint_local_tokens(dir.path()).unwrap_err();
        assert!(err.to_string().contains("sol"));
    }

    #[test]
    fn test_select_dotted_path() {
        let body = json!({ "data": { "tokens": [1, 2] } });
        assert_eq!(select_path(&body, "data.tokens"), Some(&json!([1, 2])));
        assert_eq!(select_path(&body, ""), Some(&body));
        assert_eq!(select_path(&body, "data.missing"), None);
    }

    #[tokio::test]
    async fn test_fetch_third_party_tokens() {
        let fetcher = StaticListFetcher::default()
            .with(
                "https://a/list.json",
                json!({ "name": "A list", "tokens": [
                    { "chainId": 1, "address": "0xaaa", "symbol": "Y", "name": "Why",
                      "decimals": 6, "logoURI": "https://a/y.png", "tags": ["x"] },
                    { "chainId": 1, "address": "0xbbb", "symbol": "Z", "name": "Zed",
                      "decimals": 18, "logoURI": "" },
                    { "chainId": 1, "address": "0xccc", "name": "No symbol", "decimals": 18 }
                ] }),
            )
            .with("https://b/list.json", json!([]));

        let network = Network {
            token_source: vec![
                source("https://a/list.json", "tokens", "ext"),
                source("https://down/list.json", "", "down"),
                source("https://b/list.json", "", "b"),
            ],
            ..serde_json::from_value::<Network>(json!({ "chainId": 1 })).unwrap()
        };
        let tokens = fetch_third_party_tokens(&network, &fetcher).await;

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].sources(), ["ext"]);
        assert_eq!(tokens[0].logo_uri.as_deref(), Some("https://a/y.png"));
        assert_eq!(tokens[0].decimals, Some(6));
        assert!(tokens[0].extra.is_empty());
        assert_eq!(tokens[1].logo_uri, None);
    }

    #[tokio::test]
    async fn test_third_party_records_of_other_chains_are_dropped() {
        let fetcher = StaticListFetcher::default().with(
            "https://multi/list.json",
            json!([
                { "chainId": 137, "address": "0xaaa", "symbol": "P", "name": "Poly", "decimals": 18 },
                { "chainId": "1", "address": "0xbbb", "symbol": "B", "name": "Bee", "decimals": 8 },
                { "chainId": 1, "address": "0xccc", "symbol": "C", "name": "Cee", "decimals": 6 }
            ]),
        );
        let network = Network {
            token_source: vec![source("https://multi/list.json", "", "multi")],
            ..serde_json::from_value::<Network>(json!({ "chainId": 1 })).unwrap()
        };

        let tokens = fetch_third_party_tokens(&network, &fetcher).await;
        let addresses: Vec<&str> = tokens.iter().map(|t| t.address.as_str()).collect();
        assert_eq!(addresses, ["0xbbb", "0xccc"]);
    }

    #[test]
    fn test_market_tokens_for_platform() {
        let coins = CoinList::from_listings([
            CoinListing {
                id: "usd-coin".to_string(),
                symbol: "usdc".to_string(),
                name: "USDC".to_string(),
                platforms: HashMap::from([("ethereum".to_string(), Some("0xa0b8".to_string()))]),
            },
            CoinListing {
                id: "ghost".to_string(),
                symbol: "gst".to_string(),
                name: "Ghost".to_string(),
                platforms: HashMap::from([("ethereum".to_string(), Some(String::new()))]),
            },
        ]);
        let market = HashMap::from([(
            "usd-coin".to_string(),
            MarketData {
                id: "usd-coin".to_string(),
                image: Some("https://img/usdc.png".to_string()),
                ..MarketData::default()
            },
        )]);
        let network: Network = serde_json::from_value(
            json!({ "chainId": 1, "impl": "evm", "coingecko": { "platform": "ethereum" } }),
        )
        .unwrap();

        let tokens = market_tokens(&network, &coins, &market);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].address, "0xa0b8");
        assert_eq!(tokens[0].symbol, "usdc");
        assert_eq!(tokens[0].sources(), ["coingecko"]);
        assert_eq!(tokens[0].logo_uri.as_deref(), Some("https://img/usdc.png"));
    }
}
