use std::path::Path;

use tracing::info;

use crate::config::Settings;
use crate::error::Error;
use crate::market::{CoinList, MarketDataProvider};
use crate::merge::merge_tokens;
use crate::ranking::rank_by_market_cap;
use crate::sources::{self, ListFetcher};
use crate::types::network::Network;
use crate::types::token::TokenRecord;

/// The merged, ranked token list of one network.
#[derive(Debug, Clone)]
pub struct NetworkTokens {
    pub network: Network,
    pub tokens: Vec<TokenRecord>,
}

/// Assemble the token list of every network.
///
/// Curated entries win over third-party lists, and both win over market
/// data, which only contributes tokens not listed anywhere else. The result
/// is ranked by market cap with the top `settings.top_k` in front.
pub async fn collect_network_tokens(
    networks: Vec<Network>,
    tokens_dir: &Path,
    market: &dyn MarketDataProvider,
    fetcher: &dyn ListFetcher,
    settings: &Settings,
) -> Result<Vec<NetworkTokens>, Error> {
    let coins = if networks.iter().any(|n| n.platform().is_some()) {
        market.list_all_coins().await?
    } else {
        CoinList::default()
    };
    let batching = settings.market_batching();

    let mut collected = Vec::with_capacity(networks.len());
    for network in networks {
        let local = sources::load_local_tokens(tokens_dir, &network);
        let third_party = sources::fetch_third_party_tokens(&network, fetcher).await;
        let local_count = local.len();
        let mut tokens = merge_tokens(local, third_party);

        let platform_coins = network
            .platform()
            .map(|platform| coins.platform(platform))
            .unwrap_or_default();
        if !platform_coins.is_empty() {
            let ids: Vec<String> = platform_coins.iter().map(|c| c.id.clone()).collect();
            let market_data = market.get_market_data(&ids).await?;
            let market_tokens = sources::market_tokens(&network, &coins, &market_data);
            tokens = merge_tokens(tokens, market_tokens);
        }

        let tokens =
            rank_by_market_cap(&network, tokens, settings.top_k, market, &batching).await?;
        info!(
            network = %network.code,
            local = local_count,
            total = tokens.len(),
            "collected network tokens"
        );
        collected.push(NetworkTokens { network, tokens });
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::market::{CoinListing, MarketData, StaticMarketData};
    use crate::sources::testing::StaticListFetcher;

    fn settings() -> Settings {
        Settings {
            market_pacing_ms: 0,
            ..Settings::default()
        }
    }

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_sources_merge_with_curated_precedence() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("eth/chain.json"),
            r#"{ "id": "evm--1", "chainId": 1, "impl": "evm",
                 "coingecko": { "platform": "ethereum" },
                 "token_source": [{ "url": "https://ext/list.json", "path": "tokens", "source": "ext" }] }"#,
        );
        write(
            &dir.path().join("eth/tokens.json"),
            r#"[{ "address": "0xAAA", "symbol": "X", "name": "Ex", "decimals": 18 }]"#,
        );

        let fetcher = StaticListFetcher::default().with(
            "https://ext/list.json",
            json!({ "tokens": [
                { "chainId": 1, "address": "0xaaa", "symbol": "Y", "name": "Why", "decimals": 6 },
                { "chainId": 1, "address": "0xbbb", "symbol": "B", "name": "Bee", "decimals": 8 }
            ] }),
        );
        let market = StaticMarketData::new()
            .with_coin(CoinListing {
                id: "bee".to_string(),
                symbol: "bee".to_string(),
                name: "Bee Coin".to_string(),
                platforms: HashMap::from([("ethereum".to_string(), Some("0xBBB".to_string()))]),
            })
            .with_coin(CoinListing {
                id: "cee".to_string(),
                symbol: "cee".to_string(),
                name: "Cee".to_string(),
                platforms: HashMap::from([("ethereum".to_string(), Some("0xccc".to_string()))]),
            })
            .with_market_data(MarketData {
                id: "cee".to_string(),
                image: Some("https://img/cee.png".to_string()),
                ..MarketData::default()
            })
            .with_market_cap("ethereum", "0xccc", 1_000.0)
            .with_market_cap("ethereum", "0xaaa", 10.0);

        let networks = sources::load_networks(dir.path()).unwrap();
        let collected =
            collect_network_tokens(networks, dir.path(), &market, &fetcher, &settings())
                .await
                .unwrap();

        assert_eq!(collected.len(), 1);
        let tokens = &collected[0].tokens;
        let order: Vec<&str> = tokens.iter().map(|t| t.address.as_str()).collect();
        assert_eq!(order, ["0xccc", "0xAAA", "0xbbb"]);

        let aaa = &tokens[1];
        assert_eq!(aaa.symbol, "X");
        assert_eq!(aaa.decimals, Some(18));
        assert_eq!(aaa.sources(), ["onekey", "ext"]);

        let bbb = &tokens[2];
        assert_eq!(bbb.name, "Bee");
        assert_eq!(bbb.sources(), ["ext", "coingecko"]);

        let ccc = &tokens[0];
        assert_eq!(ccc.sources(), ["coingecko"]);
        assert_eq!(ccc.logo_uri.as_deref(), Some("https://img/cee.png"));
        assert_eq!(ccc.decimals, None);
    }

    #[tokio::test]
    async fn test_third_party_records_stay_on_their_chain() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("eth/chain.json"),
            r#"{ "id": "evm--1", "chainId": 1, "impl": "evm",
                 "token_source": [{ "url": "https://multi/list.json", "source": "ext" }] }"#,
        );
        write(
            &dir.path().join("eth/tokens.json"),
            r#"[{ "address": "0xAAA", "symbol": "X", "name": "Ex", "decimals": 18 }]"#,
        );
        let fetcher = StaticListFetcher::default().with(
            "https://multi/list.json",
            json!([
                { "chainId": 137, "address": "0xaaa", "symbol": "P", "name": "Poly", "decimals": 18 },
                { "chainId": 137, "address": "0xbbb", "symbol": "B", "name": "Bee", "decimals": 8 }
            ]),
        );

        let networks = sources::load_networks(dir.path()).unwrap();
        let collected = collect_network_tokens(
            networks,
            dir.path(),
            &StaticMarketData::new(),
            &fetcher,
            &settings(),
        )
        .await
        .unwrap();

        let tokens = &collected[0].tokens;
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].address, "0xAAA");
        assert_eq!(tokens[0].sources(), ["onekey"]);
    }

    #[tokio::test]
    async fn test_network_without_platform_skips_market() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("sol/chain.json"),
            r#"{ "id": "sol--101", "chainId": "101", "impl": "sol" }"#,
        );
        write(
            &dir.path().join("sol/tokens.json"),
            r#"[{ "address": "So111", "symbol": "SOL", "name": "Solana", "decimals": 9 }]"#,
        );

        let market = StaticMarketData::new();
        let networks = sources::load_networks(dir.path()).unwrap();
        let collected = collect_network_tokens(
            networks,
            dir.path(),
            &market,
            &StaticListFetcher::default(),
            &settings(),
        )
        .await
        .unwrap();

        assert_eq!(collected[0].tokens.len(), 1);
        assert!(market.cap_requests.lock().await.is_empty());
    }
}
