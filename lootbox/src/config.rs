use std::path::PathBuf;

use alloy::primitives::Address;

use crate::deposit::ApprovalPolicy;

/// Configuration for the lootbox client.
#[derive(Debug, Clone)]
pub struct LootboxConfig {
    /// Deployed lootbox contract.
    pub lootbox_address: Address,
    /// Chain the lootbox lives on; the wallet is asked to switch to it.
    pub chain_id: u64,
    /// Allowance requested when an ERC-20 deposit needs approval.
    pub approval: ApprovalPolicy,
    /// Chain manifest source: file path or http(s) URL. Embedded list if not set.
    pub manifest: Option<String>,
    /// File remembering the last connected wallet. In-memory if not set.
    pub provider_cache: Option<PathBuf>,
}

impl LootboxConfig {
    pub fn new(lootbox_address: Address, chain_id: u64) -> Self {
        Self {
            lootbox_address,
            chain_id,
            approval: ApprovalPolicy::default(),
            manifest: None,
            provider_cache: None,
        }
    }
}
