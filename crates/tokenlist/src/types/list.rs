use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::token::TokenRecord;
use crate::error::Error;

/// A versioned token list file, one per implementation family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenList {
    pub name: String,

    /// ISO-8601 UTC with millisecond precision.
    pub timestamp: String,

    pub version: Version,

    #[serde(default)]
    pub tags: BTreeMap<String, serde_json::Value>,

    #[serde(rename = "logoURI")]
    pub logo_uri: String,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub tokens: Vec<TokenRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(Error::Config(format!(
                "version must be major.minor.patch, got '{s}'"
            )));
        }
        let component = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| Error::Config(format!("invalid version component '{p}' in '{s}'")))
        };
        Ok(Version {
            major: component(parts[0])?,
            minor: component(parts[1])?,
            patch: component(parts[2])?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
