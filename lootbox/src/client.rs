use std::sync::Arc;

use alloy::primitives::Address;
use tracing::info;

use crate::chains::ChainManifest;
use crate::config::LootboxConfig;
use crate::deposit::{ApprovalPolicy, DepositFlow};
use crate::erc20::Erc20;
use crate::error::{LootboxError, Result};
use crate::lootbox::Lootbox;
use crate::wallet::{Eip1193, ProviderCache, WalletSession};

/// Wires a wallet, the chain manifest and the lootbox contract together.
pub struct LootboxClient {
    pub manifest: Arc<ChainManifest>,
    pub session: Arc<WalletSession>,
    pub lootbox: Arc<Lootbox>,
    approval: ApprovalPolicy,
}

impl LootboxClient {
    /// Load the configured manifest and build the client around `wallet`.
    pub async fn new(config: LootboxConfig, wallet: Arc<dyn Eip1193>) -> Result<Self> {
        let manifest = match &config.manifest {
            Some(source) => ChainManifest::load(source).await?,
            None => ChainManifest::builtin(),
        };
        Self::with_manifest(config, Arc::new(manifest), wallet)
    }

    /// Build the client with an already loaded manifest.
    pub fn with_manifest(
        config: LootboxConfig,
        manifest: Arc<ChainManifest>,
        wallet: Arc<dyn Eip1193>,
    ) -> Result<Self> {
        if !manifest.contains(config.chain_id) {
            return Err(LootboxError::UnsupportedChain(config.chain_id));
        }

        let cache = config
            .provider_cache
            .map(ProviderCache::file)
            .unwrap_or_default();
        let session = Arc::new(WalletSession::new(wallet, Arc::clone(&manifest), cache));
        let tokens = Erc20::new(&manifest, config.chain_id, Arc::clone(&session));
        let lootbox = Arc::new(Lootbox::new(
            config.lootbox_address,
            config.chain_id,
            Arc::clone(&session),
            tokens,
        ));

        Ok(Self {
            manifest,
            session,
            lootbox,
            approval: config.approval,
        })
    }

    pub fn tokens(&self) -> &Erc20 {
        self.lootbox.tokens()
    }

    /// A fresh deposit flow against this lootbox.
    pub fn deposit_flow(&self) -> DepositFlow<Lootbox> {
        DepositFlow::new(Arc::clone(&self.lootbox), self.approval)
    }

    /// Connect the wallet (restoring a cached session if there is one) and
    /// ask it to move to the lootbox chain.
    pub async fn connect(&self) -> Result<Address> {
        // A cached marker means one attempt only: a failed restore is not retried.
        let account = if self.session.has_cached_provider().await {
            self.session.restore().await
        } else {
            self.session.connect_wallet().await
        }
        .ok_or(LootboxError::NotConnected)?;

        let chain_id = self.lootbox.chain_id();
        let on_chain = self
            .session
            .network()
            .await
            .is_some_and(|n| n.chain_id == chain_id);
        if !on_chain {
            info!(chain_id, "switching wallet to lootbox chain");
            self.session.switch_network(chain_id).await;
        }
        Ok(account)
    }
}
