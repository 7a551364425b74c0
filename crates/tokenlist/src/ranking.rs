use std::collections::HashMap;

use tracing::info;

use crate::error::Error;
use crate::market::{Batching, MarketDataProvider};
use crate::types::network::Network;
use crate::types::token::TokenRecord;

/// Move the `k` tokens with the largest market caps to the front, in
/// descending cap order.
///
/// Every other token keeps its relative order behind them; nothing is
/// dropped. Networks without a market data platform are returned as is.
pub async fn rank_by_market_cap(
    network: &Network,
    mut tokens: Vec<TokenRecord>,
    k: usize,
    market: &dyn MarketDataProvider,
    batching: &Batching,
) -> Result<Vec<TokenRecord>, Error> {
    let Some(platform) = network.platform() else {
        return Ok(tokens);
    };

    let mut caps: Vec<(String, f64)> = Vec::new();
    let mut fetched = 0;
    for chunk in tokens.chunks(batching.size()) {
        let addresses: Vec<String> = chunk.iter().map(|t| t.address.clone()).collect();
        let reported = market.get_token_market_caps(platform, &addresses).await?;

        for address in addresses {
            let cap = reported
                .get(&address)
                .or_else(|| reported.get(&address.to_lowercase()))
                .copied();
            if let Some(cap) = cap.filter(|c| *c > 0.0) {
                caps.push((address, cap));
            }
        }

        fetched += chunk.len();
        info!(platform, fetched, total = tokens.len(), "fetched market caps");
        batching.pause().await;
    }

    caps.sort_by(|a, b| b.1.total_cmp(&a.1));
    let places: HashMap<&str, usize> = caps
        .iter()
        .take(k)
        .enumerate()
        .map(|(place, (address, _))| (address.as_str(), place))
        .collect();

    tokens.sort_by_key(|t| places.get(t.address.as_str()).copied().unwrap_or(k));
    Ok(tokens)
}
