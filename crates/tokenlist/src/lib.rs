pub mod abi;
pub mod build;
pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod json;
pub mod market;
pub mod merge;
pub mod ranking;
pub mod registry;
pub mod sources;
pub mod types;
pub mod verify;

use std::path::PathBuf;

use error::Error;

// Re-exports for convenience
pub use cache::{VerificationCache, VerificationRecord};
pub use chain::{AdapterFactory, AdapterRegistry, ChainAdapter, ChainImpl, TokenInfo};
pub use config::Settings;
pub use market::{Batching, MarketDataProvider, StaticMarketData};
pub use merge::merge_tokens;
pub use ranking::rank_by_market_cap;
pub use registry::{ListMetadata, RegistryBuilder};
pub use sources::ListFetcher;
pub use types::list::{TokenList, Version};
pub use types::network::{Network, NetworkRegistry};
pub use types::token::{ChainId, TokenRecord};
pub use verify::{CheckReport, VerificationPipeline};

/// Build phase: collect every network's tokens and write one registry file
/// per implementation family into `settings.build_dir`.
///
/// `version` falls back to the `version` of `settings.package_json`.
pub async fn build_registry(
    settings: &Settings,
    version: Option<&str>,
    market: &dyn MarketDataProvider,
    fetcher: &dyn ListFetcher,
) -> Result<Vec<PathBuf>, Error> {
    let version = registry::resolve_version(version, &settings.package_json)?;
    let networks = sources::load_networks(&settings.tokens_dir)?;

    let collected =
        build::collect_network_tokens(networks, &settings.tokens_dir, market, fetcher, settings)
            .await?;
    let groups = RegistryBuilder::group_by_impl(collected);

    RegistryBuilder::new(&settings.build_dir, ListMetadata::from(settings)).write(groups, version)
}

/// Verify phase: check every registry file in `settings.build_dir` against
/// its chains, using and extending the cache at `settings.cache_path`.
pub async fn check_registry(
    settings: &Settings,
    factory: Box<dyn AdapterFactory>,
) -> Result<Vec<CheckReport>, Error> {
    let networks = NetworkRegistry::new(sources::load_networks(&settings.tokens_dir)?);
    let mut pipeline = VerificationPipeline::new(
        networks,
        AdapterRegistry::new(factory),
        VerificationCache::load(&settings.cache_path),
        settings.verify_pacing(),
    );
    pipeline.check_dir(&settings.build_dir).await
}
