use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::json;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;

use crate::build::NetworkTokens;
use crate::config::Settings;
use crate::error::Error;
use crate::json;
use crate::types::list::{TokenList, Version};
use crate::types::token::TokenRecord;

/// Suffix of the per-impl registry files, `<impl>.all.json`.
pub const LIST_SUFFIX: &str = ".all";

const VERSION_FILE: &str = "version.json";

/// Name, logo and keywords stamped on every list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListMetadata {
    pub name: String,
    pub logo_uri: String,
    pub keywords: Vec<String>,
}

impl From<&Settings> for ListMetadata {
    fn from(settings: &Settings) -> Self {
        Self {
            name: settings.list_name.clone(),
            logo_uri: settings.list_logo_uri.clone(),
            keywords: settings.list_keywords.clone(),
        }
    }
}

/// Writes one versioned token list per implementation family.
#[derive(Debug, Clone)]
pub struct RegistryBuilder {
    build_dir: PathBuf,
    metadata: ListMetadata,
}

impl RegistryBuilder {
    pub fn new(build_dir: impl Into<PathBuf>, metadata: ListMetadata) -> Self {
        Self {
            build_dir: build_dir.into(),
            metadata,
        }
    }

    /// Concatenate the chain lists of each implementation family, keeping
    /// network order inside a family.
    pub fn group_by_impl(
        network_tokens: impl IntoIterator<Item = NetworkTokens>,
    ) -> BTreeMap<String, Vec<TokenRecord>> {
        let mut groups: BTreeMap<String, Vec<TokenRecord>> = BTreeMap::new();
        for NetworkTokens { network, tokens } in network_tokens {
            groups
                .entry(network.impl_name().to_string())
                .or_default()
                .extend(tokens);
        }
        groups
    }

    pub fn build_list(
        &self,
        tokens: Vec<TokenRecord>,
        version: Version,
        now: OffsetDateTime,
    ) -> Result<TokenList, Error> {
        Ok(TokenList {
            name: self.metadata.name.clone(),
            timestamp: format_timestamp(now)?,
            version,
            tags: BTreeMap::new(),
            logo_uri: self.metadata.logo_uri.clone(),
            keywords: self.metadata.keywords.clone(),
            tokens,
        })
    }

    /// Remove and recreate the build directory.
    pub fn prepare_build_dir(&self) -> Result<(), Error> {
        if self.build_dir.exists() {
            std::fs::remove_dir_all(&self.build_dir)?;
        }
        std::fs::create_dir_all(&self.build_dir)?;
        Ok(())
    }

    /// Write `<impl>.all.json` for every non-empty group plus
    /// `version.json`. Returns the list files written.
    pub fn write(
        &self,
        groups: BTreeMap<String, Vec<TokenRecord>>,
        version: Version,
    ) -> Result<Vec<PathBuf>, Error> {
        self.prepare_build_dir()?;

        let now = OffsetDateTime::now_utc();
        let mut written = Vec::new();
        for (impl_name, tokens) in groups {
            if tokens.is_empty() {
                continue;
            }
            let count = tokens.len();
            let list = self.build_list(tokens, version, now)?;
            let path = self.build_dir.join(format!("{impl_name}{LIST_SUFFIX}.json"));
            json::write_sorted(&path, &list, 2, false)?;
            info!(path = %path.display(), tokens = count, "wrote token list");
            written.push(path);
        }

        json::write_sorted(
            &self.build_dir.join(VERSION_FILE),
            &json!({ "version": version.to_string() }),
            4,
            false,
        )?;
        info!(%version, lists = written.len(), "registry built");
        Ok(written)
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T12:30:00.123Z`.
pub fn format_timestamp(at: OffsetDateTime) -> Result<String, Error> {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    at.to_offset(time::UtcOffset::UTC)
        .format(format)
        .map_err(|e| Error::Config(format!("timestamp format error: {e}")))
}

/// The explicit version if given, otherwise `version` from `package.json`.
pub fn resolve_version(explicit: Option<&str>, package_json: &Path) -> Result<Version, Error> {
    if let Some(version) = explicit.filter(|v| !v.trim().is_empty()) {
        return version.parse();
    }

    let content = std::fs::read_to_string(package_json).map_err(|e| {
        Error::Config(format!(
            "no version given and {} is unreadable: {e}",
            package_json.display()
        ))
    })?;
    let manifest: serde_json::Value = serde_json::from_str(&content)?;
    manifest
        .get("version")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            Error::Config(format!("{} has no version field", package_json.display()))
        })?
        .parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::network::Network;
    use time::macros::datetime;

    fn metadata() -> ListMetadata {
        ListMetadata::from(&Settings::default())
    }

    fn network(code: &str, impl_name: Option<&str>, chain_id: u64) -> Network {
        let mut json = json!({ "chainId": chain_id, "code": code });
        if let Some(impl_name) = impl_name {
            json["impl"] = json!(impl_name);
        }
        serde_json::from_value(json).unwrap()
    }

    fn tokens(chain_id: u64, addresses: &[&str]) -> Vec<TokenRecord> {
        addresses
            .iter()
            .map(|a| TokenRecord::new(chain_id, *a, "T", "Token"))
            .collect()
    }

    fn version() -> Version {
        "1.2.3".parse().unwrap()
    }

    #[test]
    fn test_timestamp_has_milliseconds() {
        let at = datetime!(2024-05-01 12:30:00.123456 UTC);
        assert_eq!(format_timestamp(at).unwrap(), "2024-05-01T12:30:00.123Z");
    }

    #[test]
    fn test_group_by_impl_keeps_network_order() {
        let groups = RegistryBuilder::group_by_impl([
            NetworkTokens {
                network: network("eth", Some("evm"), 1),
                tokens: tokens(1, &["0x1", "0x2"]),
            },
            NetworkTokens {
                network: network("sol", None, 101),
                tokens: tokens(101, &["Mint"]),
            },
            NetworkTokens {
                network: network("bsc", Some("evm"), 56),
                tokens: tokens(56, &["0x3"]),
            },
        ]);

        let evm: Vec<&str> = groups["evm"].iter().map(|t| t.address.as_str()).collect();
        assert_eq!(evm, ["0x1", "0x2", "0x3"]);
        assert_eq!(groups["sol"].len(), 1);
    }

    #[test]
    fn test_write_registry_files() {
        let dir = tempfile::tempdir().unwrap();
        let build_dir = dir.path().join("build");
        std::fs::create_dir_all(&build_dir).unwrap();
        std::fs::write(build_dir.join("stale.json"), "{}").unwrap();

        let builder = RegistryBuilder::new(&build_dir, metadata());
        let groups = BTreeMap::from([
            ("evm".to_string(), tokens(1, &["0x1"])),
            ("near".to_string(), Vec::new()),
        ]);
        let written = builder.write(groups, version()).unwrap();

        assert_eq!(written, [build_dir.join("evm.all.json")]);
        assert!(!build_dir.join("stale.json").exists());
        assert!(!build_dir.join("near.all.json").exists());

        let content = std::fs::read_to_string(build_dir.join("evm.all.json")).unwrap();
        assert!(!content.ends_with('\n'));
        let list: TokenList = serde_json::from_str(&content).unwrap();
        assert_eq!(list.name, "OneKey Token List");
        assert_eq!(list.version, version());
        assert_eq!(list.keywords, ["onekey", "default"]);
        assert_eq!(list.tokens.len(), 1);
        assert!(list.timestamp.ends_with('Z'));

        let version_json = std::fs::read_to_string(build_dir.join("version.json")).unwrap();
        assert_eq!(version_json, "{\n    \"version\": \"1.2.3\"\n}");
    }

    #[test]
    fn test_resolve_version() {
        let dir = tempfile::tempdir().unwrap();
        let package_json = dir.path().join("package.json");
        std::fs::write(&package_json, r#"{ "name": "lists", "version": "2.0.7" }"#).unwrap();

        assert_eq!(
            resolve_version(Some("1.2.3"), &package_json).unwrap(),
            version()
        );
        assert_eq!(
            resolve_version(None, &package_json).unwrap().to_string(),
            "2.0.7"
        );
        assert!(resolve_version(None, &dir.path().join("missing.json")).is_err());
        assert!(resolve_version(Some("one.two"), &package_json).is_err());
    }
}
