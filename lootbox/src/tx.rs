use std::fmt;
use std::future::Future;

use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::TxHash;
use alloy::providers::PendingTransactionBuilder;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::error::{LootboxError, Result};

/// A mined, successful transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

/// A submitted transaction that has not been awaited yet.
///
/// Submission returns as soon as the wallet hands back a hash; the caller
/// decides when to [`wait`](Self::wait) for confirmation.
pub struct PendingTx {
    hash: TxHash,
    confirmation: BoxFuture<'static, Result<Confirmation>>,
}

impl PendingTx {
    pub fn new<F>(hash: TxHash, confirmation: F) -> Self
    where
        F: Future<Output = Result<Confirmation>> + Send + 'static,
    {
        Self {
            hash,
            confirmation: confirmation.boxed(),
        }
    }

    /// Wrap an alloy pending transaction; a failing receipt status becomes
    /// `LootboxError::Reverted`.
    pub fn from_alloy(pending: PendingTransactionBuilder<Ethereum>) -> Self {
        let hash = *pending.tx_hash();
        debug!(%hash, "transaction submitted");
        Self::new(hash, async move {
            let receipt = pending.get_receipt().await?;
            if !receipt.status() {
                warn!(%hash, "transaction reverted");
                return Err(LootboxError::Reverted(hash));
            }
            Ok(Confirmation {
                tx_hash: receipt.transaction_hash,
                block_number: receipt.block_number,
            })
        })
    }

    pub fn hash(&self) -> TxHash {
        self.hash
    }

    /// Wait until the transaction is mined.
    pub async fn wait(self) -> Result<Confirmation> {
        self.confirmation.await
    }
}

impl fmt::Debug for PendingTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTx").field("hash", &self.hash).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_resolves_confirmation() {
        let hash = TxHash::repeat_byte(0xab);
        let pending = PendingTx::new(hash, async move {
            Ok(Confirmation {
                tx_hash: hash,
                block_number: Some(7),
            })
        });
        assert_eq!(pending.hash(), hash);
        let confirmation = pending.wait().await.unwrap();
        assert_eq!(confirmation.block_number, Some(7));
    }

    #[tokio::test]
    async fn test_wait_propagates_revert() {
        let hash = TxHash::repeat_byte(0x01);
        let pending = PendingTx::new(hash, async move { Err(LootboxError::Reverted(hash)) });
        assert!(matches!(pending.wait().await, Err(LootboxError::Reverted(h)) if h == hash));
    }
}
