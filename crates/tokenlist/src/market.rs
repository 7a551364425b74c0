//! Market data (coin listings, logos, market caps) behind a provider trait.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Error;

/// How requests against a rate-limited API are chunked and spaced. The
/// batch size is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batching {
    size: usize,
    pacing: Duration,
}

impl Batching {
    pub fn new(size: usize, pacing: Duration) -> Self {
        Self {
            size: size.max(1),
            pacing,
        }
    }

    /// No pauses; for tests and offline providers.
    pub fn unpaced(size: usize) -> Self {
        Self::new(size, Duration::ZERO)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub async fn pause(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }
}

impl Default for Batching {
    fn default() -> Self {
        Self::new(100, Duration::from_millis(1500))
    }
}

/// One entry of the provider's full coin listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CoinListing {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    /// Platform id to contract address.
    #[serde(default)]
    pub platforms: HashMap<String, Option<String>>,
}

/// A coin deployed on a given platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformCoin {
    pub id: String,
    pub address: String,
    pub symbol: String,
    pub name: String,
}

/// All known coins, indexed by platform and by id.
#[derive(Debug, Clone, Default)]
pub struct CoinList {
    pub platform_coins: HashMap<String, Vec<PlatformCoin>>,
    pub coins: HashMap<String, CoinListing>,
}

impl CoinList {
    pub fn from_listings(listings: impl IntoIterator<Item = CoinListing>) -> Self {
        let mut list = CoinList::default();
        for coin in listings {
            for (platform, address) in &coin.platforms {
                list.platform_coins
                    .entry(platform.clone())
                    .or_default()
                    .push(PlatformCoin {
                        id: coin.id.clone(),
                        address: address.clone().unwrap_or_default(),
                        symbol: coin.symbol.clone(),
                        name: coin.name.clone(),
                    });
            }
            list.coins.insert(coin.id.clone(), coin);
        }
        list
    }

    /// Coins deployed on `platform`, in listing order.
    pub fn platform(&self, platform: &str) -> &[PlatformCoin] {
        self.platform_coins
            .get(platform)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Contract address of coin `id` on `platform`, if non-empty.
    pub fn address_on(&self, id: &str, platform: &str) -> Option<&str> {
        self.coins
            .get(id)?
            .platforms
            .get(platform)?
            .as_deref()
            .filter(|a| !a.is_empty())
    }
}

/// Market snapshot of one coin.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarketData {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn list_all_coins(&self) -> Result<CoinList, Error>;

    /// Market data for `ids`. Ids the provider does not know are absent from
    /// the result.
    async fn get_market_data(&self, ids: &[String]) -> Result<HashMap<String, MarketData>, Error>;

    /// USD market caps of contract `addresses` on `platform`, keyed by
    /// address as the provider reports it. One request; callers batch.
    async fn get_token_market_caps(
        &self,
        platform: &str,
        addresses: &[String],
    ) -> Result<HashMap<String, f64>, Error>;
}

/// In-memory provider for tests and offline builds.
#[derive(Debug, Default)]
pub struct StaticMarketData {
    coins: Vec<CoinListing>,
    market: HashMap<String, MarketData>,
    caps: HashMap<String, HashMap<String, f64>>,
    /// `(platform, batch length)` of every market cap request.
    pub cap_requests: tokio::sync::Mutex<Vec<(String, usize)>>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_coin(mut self, coin: CoinListing) -> Self {
        self.coins.push(coin);
        self
    }

    pub fn with_market_data(mut self, data: MarketData) -> Self {
        self.market.insert(data.id.clone(), data);
        self
    }

    pub fn with_market_cap(mut self, platform: &str, address: &str, cap: f64) -> Self {
        self.caps
            .entry(platform.to_string())
            .or_default()
            .insert(address.to_string(), cap);
        self
    }
}

#[async_trait]
impl MarketDataProvider for StaticMarketData {
    async fn list_all_coins(&self) -> Result<CoinList, Error> {
        Ok(CoinList::from_listings(self.coins.iter().cloned()))
    }

    async fn get_market_data(&self, ids: &[String]) -> Result<HashMap<String, MarketData>, Error> {
        Ok(ids
            .iter()
            .filter_map(|id| self.market.get(id).map(|d| (id.clone(), d.clone())))
            .collect())
    }

    async fn get_token_market_caps(
        &self,
        platform: &str,
        addresses: &[String],
    ) -> Result<HashMap<String, f64>, Error> {
        self.cap_requests
            .lock()
            .await
            .push((platform.to_string(), addresses.len()));
        let Some(caps) = self.caps.get(platform) else {
            return Ok(HashMap::new());
        };
        // Reported keys are lowercased, like the live API does.
        Ok(addresses
            .iter()
            .map(|a| a.to_lowercase())
            .filter_map(|a| caps.get(&a).map(|cap| (a, *cap)))
            .collect())
    }
}

#[cfg(feature = "http")]
pub use coingecko::CoinGeckoClient;

#[cfg(feature = "http")]
mod coingecko {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::Mutex;
    use tracing::{debug, info};

    use super::{Batching, CoinList, CoinListing, MarketData, MarketDataProvider};
    use crate::error::Error;

    const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

    /// CoinGecko public API client. Market data is cached by coin id for the
    /// lifetime of the client.
    pub struct CoinGeckoClient {
        client: reqwest::Client,
        base_url: String,
        batching: Batching,
        cache: Mutex<HashMap<String, MarketData>>,
    }

    impl CoinGeckoClient {
        pub fn new(batching: Batching, timeout: Duration) -> Result<Self, Error> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
            Ok(Self {
                client,
                base_url: DEFAULT_BASE_URL.to_string(),
                batching,
                cache: Mutex::new(HashMap::new()),
            })
        }

        pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
            self.base_url = base_url.into();
            self
        }

        async fn get_json<T: serde::de::DeserializeOwned>(
            &self,
            path: &str,
            query: &[(&str, &str)],
        ) -> Result<T, Error> {
            let url = format!("{}{path}", self.base_url);
            debug!(url = %url, "coingecko request");
            let response = self
                .client
                .get(&url)
                .query(query)
                .send()
                .await
                .map_err(|e| Error::Transport(format!("GET {url} failed: {e}")))?
                .error_for_status()
                .map_err(|e| Error::Transport(format!("GET {url} returned error: {e}")))?;
            response
                .json()
                .await
                .map_err(|e| Error::Transport(format!("invalid JSON from {url}: {e}")))
        }
    }

    #[async_trait]
    impl MarketDataProvider for CoinGeckoClient {
        async fn list_all_coins(&self) -> Result<CoinList, Error> {
            let listings: Vec<CoinListing> = self
                .get_json("/coins/list", &[("include_platform", "true")])
                .await?;
            info!(count = listings.len(), "fetched coingecko coin list");
            Ok(CoinList::from_listings(listings))
        }

        async fn get_market_data(
            &self,
            ids: &[String],
        ) -> Result<HashMap<String, MarketData>, Error> {
            let mut result = HashMap::new();
            let mut missing = Vec::new();
            {
                let cache = self.cache.lock().await;
                for id in ids {
                    match cache.get(id) {
                        Some(data) => {
                            result.insert(id.clone(), data.clone());
                        }
                        None => missing.push(id.clone()),
                    }
                }
            }

            for chunk in missing.chunks(self.batching.size()) {
                let joined = chunk.join(",");
                let batch: Vec<MarketData> = self
                    .get_json(
                        "/coins/markets",
                        &[
                            ("vs_currency", "usd"),
                            ("ids", joined.as_str()),
                            ("order", "market_cap_desc"),
                            ("sparkline", "false"),
                        ],
                    )
                    .await?;
                debug!(requested = chunk.len(), received = batch.len(), "coingecko markets batch");

                let mut cache = self.cache.lock().await;
                for data in batch {
                    cache.insert(data.id.clone(), data.clone());
                    result.insert(data.id.clone(), data);
                }
                drop(cache);
                self.batching.pause().await;
            }

            Ok(result)
        }

        async fn get_token_market_caps(
            &self,
            platform: &str,
            addresses: &[String],
        ) -> Result<HashMap<String, f64>, Error> {
            if addresses.is_empty() {
                return Ok(HashMap::new());
            }
            let joined = addresses.join(",");
            let prices: HashMap<String, Value> = self
                .get_json(
                    &format!("/simple/token_price/{platform}"),
                    &[
                        ("contract_addresses", joined.as_str()),
                        ("include_market_cap", "true"),
                        ("vs_currencies", "usd"),
                    ],
                )
                .await?;

            Ok(prices
                .into_iter()
                .filter_map(|(address, price)| {
                    price
                        .get("usd_market_cap")
                        .and_then(Value::as_f64)
                        .map(|cap| (address, cap))
                })
                .collect())
        }
    }
}
