pub mod evm;
pub mod near;
pub mod rpc;
pub mod solana;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ChainError;
use crate::types::network::network_key;
use crate::types::token::ChainId;

pub use evm::EvmAdapter;
pub use near::NearAdapter;
pub use solana::SolanaAdapter;

/// Token metadata as reported by the chain. Each field is `None` when the
/// chain could not provide or we could not decode it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenInfo {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

/// Chain protocol families with an on-chain metadata query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainImpl {
    Evm,
    Near,
    Sol,
}

impl ChainImpl {
    /// Map an `impl` tag from network config; unknown families return `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "evm" => Some(ChainImpl::Evm),
            "near" => Some(ChainImpl::Near),
            "sol" => Some(ChainImpl::Sol),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            ChainImpl::Evm => "evm",
            ChainImpl::Near => "near",
            ChainImpl::Sol => "sol",
        }
    }
}

/// On-chain token metadata lookup for one chain.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Fetch name/symbol/decimals for `identifier`.
    ///
    /// Returns [`ChainError::InvalidContract`] when nothing is deployed at
    /// the identifier.
    async fn get_token_info(&self, identifier: &str) -> Result<TokenInfo, ChainError>;
}

/// Creates adapters for a chain family talking to a given RPC endpoint.
pub trait AdapterFactory: Send + Sync {
    fn create(
        &self,
        chain_impl: ChainImpl,
        rpc_url: &str,
    ) -> Result<Arc<dyn ChainAdapter>, ChainError>;
}

/// Adapters created during a run, keyed by `{impl}--{chainId}`.
pub struct AdapterRegistry {
    factory: Box<dyn AdapterFactory>,
    adapters: HashMap<String, Arc<dyn ChainAdapter>>,
}

impl AdapterRegistry {
    pub fn new(factory: Box<dyn AdapterFactory>) -> Self {
        Self {
            factory,
            adapters: HashMap::new(),
        }
    }

    /// Return the cached adapter for the chain, creating it on first use.
    /// `Ok(None)` means the family has no adapter.
    pub fn get_or_create(
        &mut self,
        impl_name: &str,
        chain_id: &ChainId,
        rpc_url: &str,
    ) -> Result<Option<Arc<dyn ChainAdapter>>, ChainError> {
        let key = network_key(impl_name, chain_id);
        if let Some(adapter) = self.adapters.get(&key) {
            return Ok(Some(adapter.clone()));
        }

        let Some(chain_impl) = ChainImpl::from_tag(impl_name) else {
            return Ok(None);
        };

        let adapter = self.factory.create(chain_impl, rpc_url)?;
        self.adapters.insert(key, adapter.clone());
        Ok(Some(adapter))
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(feature = "http")]
pub use http::HttpAdapterFactory;

#[cfg(feature = "http")]
mod http {
    use std::sync::Arc;
    use std::time::Duration;

    use super::rpc::HttpTransport;
    use super::{AdapterFactory, ChainAdapter, ChainImpl, EvmAdapter, NearAdapter, SolanaAdapter};
    use crate::error::ChainError;

    /// Builds adapters backed by [`HttpTransport`].
    #[derive(Debug, Clone)]
    pub struct HttpAdapterFactory {
        timeout: Duration,
    }

    impl HttpAdapterFactory {
        pub fn new(timeout: Duration) -> Self {
            Self { timeout }
        }
    }

    impl AdapterFactory for HttpAdapterFactory {
        fn create(
            &self,
            chain_impl: ChainImpl,
            rpc_url: &str,
        ) -> Result<Arc<dyn ChainAdapter>, ChainError> {
            let transport = Arc::new(HttpTransport::new(rpc_url, self.timeout)?);
            let adapter: Arc<dyn ChainAdapter> = match chain_impl {
                ChainImpl::Evm => Arc::new(EvmAdapter::new(transport)),
                ChainImpl::Near => Arc::new(NearAdapter::new(transport)),
                ChainImpl::Sol => Arc::new(SolanaAdapter::new(transport)),
            };
            Ok(adapter)
        }
    }
}
