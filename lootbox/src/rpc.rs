//! Read-only chain access.
//!
//! Non-signing JSON-RPC connections per chain, independent of whether a wallet
//! is connected or which chain it is on.

use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use tracing::{debug, warn};

use crate::chains::ChainManifest;

/// Build a read-only provider bound to the first RPC URL of `chain_id`.
///
/// Returns `None` when the chain is not in the manifest or its first URL is
/// not a valid URL.
pub fn read_only_provider(manifest: &ChainManifest, chain_id: u64) -> Option<DynProvider> {
    let chain = manifest.get(chain_id)?;
    let Some(raw) = chain.primary_rpc_url() else {
        warn!(chain_id, "chain has no RPC URLs");
        return None;
    };
    let url = match raw.parse::<url::Url>() {
        Ok(url) => url,
        Err(e) => {
            warn!(chain_id, url = raw, error = %e, "invalid RPC URL");
            return None;
        }
    };

    debug!(chain_id, url = %url, "read-only provider created");
    Some(ProviderBuilder::new().connect_http(url).erased())
}
