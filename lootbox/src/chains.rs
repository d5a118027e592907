//! Static chain manifest.
//!
//! Supported chains, their RPC and explorer URLs and native currency metadata.
//! Loaded once at boot (embedded default, a JSON file, or a JSON URL) and
//! never mutated afterwards.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info};

use crate::error::{LootboxError, Result};

const BUILTIN_MANIFEST: &str = include_str!("../chains.json");

/// Native currency of a chain, as wallets describe it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Immutable description of one supported chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    /// Numeric chain ID. Accepts either a JSON number or a `0x` hex string.
    #[serde(
        serialize_with = "serialize_chain_id",
        deserialize_with = "deserialize_chain_id"
    )]
    pub chain_id: u64,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub block_explorer_urls: Vec<String>,
}

impl ChainDescriptor {
    /// `0x`-prefixed chain ID, the form wallets expect.
    pub fn chain_id_hex(&self) -> String {
        chain_id_hex(self.chain_id)
    }

    /// Parameters for a `wallet_addEthereumChain` request.
    pub fn add_chain_params(&self) -> serde_json::Value {
        serde_json::json!({
            "chainId": self.chain_id_hex(),
            "chainName": self.chain_name,
            "nativeCurrency": self.native_currency,
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": self.block_explorer_urls,
        })
    }

    /// First configured RPC URL, used for read-only access.
    pub fn primary_rpc_url(&self) -> Option<&str> {
        self.rpc_urls.first().map(String::as_str)
    }
}

/// Format a chain ID as `0x`-prefixed lowercase hex.
pub fn chain_id_hex(chain_id: u64) -> String {
    format!("0x{chain_id:x}")
}

/// Parse a chain ID given as `0x` hex or decimal.
pub fn parse_chain_id(value: &str) -> Result<u64> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed.map_err(|e| LootboxError::Manifest(format!("invalid chain id {value:?}: {e}")))
}

fn serialize_chain_id<S: Serializer>(chain_id: &u64, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&chain_id_hex(*chain_id))
}

fn deserialize_chain_id<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(d)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => parse_chain_id(&s).map_err(serde::de::Error::custom),
    }
}

/// The set of chains this client knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainManifest {
    chains: Vec<ChainDescriptor>,
}

impl ChainManifest {
    pub fn new(chains: Vec<ChainDescriptor>) -> Self {
        Self { chains }
    }

    /// The manifest shipped with the crate.
    pub fn builtin() -> Self {
        // The embedded file is covered by `test_builtin_manifest_parses`.
        Self::from_json(BUILTIN_MANIFEST).unwrap_or_else(|_| Self::new(Vec::new()))
    }

    /// Parse a manifest from a JSON array of chain descriptors.
    pub fn from_json(json: &str) -> Result<Self> {
        let chains: Vec<ChainDescriptor> = serde_json::from_str(json)?;
        Ok(Self::new(chains))
    }

    /// Load a manifest from a file path or an `http(s)` URL.
    pub async fn load(source: &str) -> Result<Self> {
        let manifest = if source.starts_with("http://") || source.starts_with("https://") {
            Self::fetch(source).await?
        } else {
            Self::read(source).await?
        };
        info!(source, chains = manifest.len(), "chain manifest loaded");
        Ok(manifest)
    }

    async fn read(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_json(&raw)
    }

    async fn fetch(url: &str) -> Result<Self> {
        let resp = reqwest::Client::new().get(url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LootboxError::Manifest(format!(
                "GET {url} returned {status}: {body}"
            )));
        }
        let chains = resp.json::<Vec<ChainDescriptor>>().await?;
        Ok(Self::new(chains))
    }

    /// Look up a chain by numeric ID.
    pub fn get(&self, chain_id: u64) -> Option<&ChainDescriptor> {
        let found = self.chains.iter().find(|c| c.chain_id == chain_id);
        if found.is_none() {
            debug!(chain_id, "chain not in manifest");
        }
        found
    }

    /// Look up a chain by `0x` hex (or decimal) ID.
    pub fn get_hex(&self, chain_id: &str) -> Option<&ChainDescriptor> {
        parse_chain_id(chain_id).ok().and_then(|id| self.get(id))
    }

    pub fn contains(&self, chain_id: u64) -> bool {
        self.chains.iter().any(|c| c.chain_id == chain_id)
    }

    /// Display name for a chain, `"unknown"` when absent.
    pub fn name_of(&self, chain_id: u64) -> String {
        self.get(chain_id)
            .map(|c| c.chain_name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainDescriptor> {
        self.chains.iter()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl Default for ChainManifest {
    fn default() -> Self {
        Self::builtin()
    }
}
