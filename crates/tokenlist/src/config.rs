use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Error;
use crate::market::Batching;

/// Run settings. Every field has a default, so a config file only needs the
/// values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root holding one `<code>/chain.json` (+ `tokens.json`) per network.
    pub tokens_dir: PathBuf,
    /// Output directory for the registry files; recreated on every build.
    pub build_dir: PathBuf,
    /// Verification cache file.
    pub cache_path: PathBuf,
    /// Fallback source of the list version.
    pub package_json: PathBuf,

    /// Tokens ranked to the front of each chain list.
    pub top_k: usize,
    pub market_batch_size: usize,
    pub market_pacing_ms: u64,
    /// Pause after each on-chain lookup.
    pub verify_pacing_ms: u64,
    pub rpc_timeout_secs: u64,

    pub list_name: String,
    pub list_logo_uri: String,
    pub list_keywords: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tokens_dir: PathBuf::from("./tokens"),
            build_dir: PathBuf::from("./build"),
            cache_path: PathBuf::from("./token_info.json"),
            package_json: PathBuf::from("./package.json"),
            top_k: 100,
            market_batch_size: 100,
            market_pacing_ms: 1500,
            verify_pacing_ms: 1000,
            rpc_timeout_secs: 30,
            list_name: "OneKey Token List".to_string(),
            list_logo_uri: "https://onekey-asset.com/assets/logo.png".to_string(),
            list_keywords: vec!["onekey".to_string(), "default".to_string()],
        }
    }
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn load_from_path(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config {}: {e}", path.display()))
        })?;
        let settings: Self = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse config {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), "loaded config");
        Ok(settings)
    }

    pub fn market_batching(&self) -> Batching {
        Batching::new(
            self.market_batch_size,
            Duration::from_millis(self.market_pacing_ms),
        )
    }

    pub fn verify_pacing(&self) -> Duration {
        Duration::from_millis(self.verify_pacing_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}
