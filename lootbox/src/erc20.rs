//! Token introspection for one chain.
//!
//! Reads (balances, allowance, symbol, decimals) go through a read-only
//! provider built from the chain manifest, so they work with no wallet
//! connected. Approvals need the session's signer.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider};
use alloy::sol;
use tracing::{debug, info};

use crate::chains::ChainManifest;
use crate::error::{LootboxError, Result};
use crate::rpc::read_only_provider;
use crate::tx::PendingTx;
use crate::units::{format_units, parse_units, NATIVE_DECIMALS};
use crate::wallet::WalletSession;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }
}

#[derive(Clone)]
pub struct Erc20 {
    chain_id: u64,
    provider: Option<DynProvider>,
    session: Arc<WalletSession>,
}

impl Erc20 {
    /// Token access for `chain_id`, reading through the manifest's first RPC URL.
    pub fn new(manifest: &ChainManifest, chain_id: u64, session: Arc<WalletSession>) -> Self {
        Self::with_provider(chain_id, read_only_provider(manifest, chain_id), session)
    }

    /// Token access over an explicit read-only provider (`None` = unsupported chain).
    pub fn with_provider(
        chain_id: u64,
        provider: Option<DynProvider>,
        session: Arc<WalletSession>,
    ) -> Self {
        Self {
            chain_id,
            provider,
            session,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub(crate) fn reader(&self) -> Result<&DynProvider> {
        self.provider
            .as_ref()
            .ok_or(LootboxError::UnsupportedChain(self.chain_id))
    }

    async fn resolve_account(&self, address: Option<Address>) -> Option<Address> {
        match address {
            Some(address) => Some(address),
            None => self.session.current_account().await,
        }
    }

    /// Native balance of `address`, or of the connected account.
    ///
    /// Zero when neither is available.
    pub async fn get_native_balance(&self, address: Option<Address>) -> Result<U256> {
        let provider = self.reader()?;
        let Some(owner) = self.resolve_account(address).await else {
            return Ok(U256::ZERO);
        };
        let balance = provider.get_balance(owner).await?;
        debug!(chain_id = self.chain_id, %owner, %balance, "native balance");
        Ok(balance)
    }

    /// Token balance of `address`, or of the connected account.
    ///
    /// Zero when neither is available.
    pub async fn get_balance(&self, token: Address, address: Option<Address>) -> Result<U256> {
        let provider = self.reader()?;
        let Some(owner) = self.resolve_account(address).await else {
            return Ok(U256::ZERO);
        };
        let balance = IERC20::new(token, provider.clone())
            .balanceOf(owner)
            .call()
            .await?;
        debug!(chain_id = self.chain_id, %token, %owner, %balance, "token balance");
        Ok(balance)
    }

    pub async fn get_allowance(&self, owner: Address, spender: Address, token: Address) -> Result<U256> {
        let provider = self.reader()?;
        let allowance = IERC20::new(token, provider.clone())
            .allowance(owner, spender)
            .call()
            .await?;
        debug!(%token, %owner, %spender, %allowance, "allowance");
        Ok(allowance)
    }

    pub async fn get_symbol(&self, token: Address) -> Result<String> {
        let provider = self.reader()?;
        Ok(IERC20::new(token, provider.clone()).symbol().call().await?)
    }

    pub async fn get_decimals(&self, token: Address) -> Result<u8> {
        let provider = self.reader()?;
        Ok(IERC20::new(token, provider.clone()).decimals().call().await?)
    }

    /// Submit `approve(spender, amount)` from `owner` through the wallet.
    ///
    /// Returns as soon as the transaction is submitted; the caller waits.
    pub async fn approve_token_amount(
        &self,
        owner: Address,
        spender: Address,
        token: Address,
        amount: U256,
    ) -> Result<PendingTx> {
        self.reader()?;
        let signer = self
            .session
            .signer()
            .await
            .ok_or(LootboxError::NotConnected)?;

        let pending = IERC20::new(token, signer)
            .approve(spender, amount)
            .from(owner)
            .send()
            .await?;
        info!(%token, %owner, %spender, %amount, tx = %pending.tx_hash(), "approval submitted");
        Ok(PendingTx::from_alloy(pending))
    }

    /// Decimals for `token`, or the native 18 when `None`.
    pub async fn decimals_of(&self, token: Option<Address>) -> Result<u8> {
        match token {
            Some(token) => self.get_decimals(token).await,
            None => {
                self.reader()?;
                Ok(NATIVE_DECIMALS)
            }
        }
    }

    /// Convert a human amount to base units using the token's on-chain decimals.
    pub async fn parse_amount(&self, amount: &str, token: Option<Address>) -> Result<U256> {
        let decimals = self.decimals_of(token).await?;
        parse_units(amount, decimals)
    }

    /// Convert base units to a human amount using the token's on-chain decimals.
    pub async fn format_amount(&self, amount: U256, token: Option<Address>) -> Result<String> {
        let decimals = self.decimals_of(token).await?;
        Ok(format_units(amount, decimals))
    }
}
