use alloy::providers::DynProvider;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use super::{Eip1193, ProviderRpcError, WalletEvent};

/// Stand-in for "no wallet installed".
///
/// Every request fails with code 4900, so a session built on it stays
/// disconnected while read-only calls keep working.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWallet;

#[async_trait]
impl Eip1193 for NoWallet {
    fn id(&self) -> &str {
        "none"
    }

    async fn request(&self, method: &str, _params: Value) -> Result<Value, ProviderRpcError> {
        Err(ProviderRpcError::new(
            ProviderRpcError::DISCONNECTED,
            format!("no wallet available for {method}"),
        ))
    }

    fn events(&self) -> broadcast::Receiver<WalletEvent> {
        broadcast::channel(1).1
    }

    fn signer(&self) -> Option<DynProvider> {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::chains::ChainManifest;
    use crate::wallet::{ProviderCache, WalletSession};

    #[tokio::test]
    async fn test_session_stays_disconnected() {
        let session = WalletSession::new(
            Arc::new(NoWallet),
            Arc::new(ChainManifest::builtin()),
            ProviderCache::memory(),
        );
        assert_eq!(session.connect_wallet().await, None);
        assert!(!session.is_connected().await);
        assert!(session.signer().await.is_none());
    }
}
