//! Access to the deployed lootbox reward pool.
//!
//! Every state-changing call checks the session first: no signer or network
//! gives `NotConnected`, a wallet on another chain gives `WrongNetwork`. Both
//! are raised before any transaction is built. Reads use the read-only
//! provider and work without a wallet.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::providers::DynProvider;
use alloy::sol;
use async_trait::async_trait;
use futures_util::future::try_join;
use tracing::{debug, error, info, warn};

use crate::chains::NativeCurrency;
use crate::deposit::DepositBackend;
use crate::erc20::Erc20;
use crate::error::{LootboxError, Result};
use crate::tx::PendingTx;
use crate::types::DepositRecord;
use crate::units::NATIVE_DECIMALS;
use crate::wallet::WalletSession;

sol! {
    #[sol(rpc)]
    interface ILootbox {
        struct Deposit {
            address depositor;
            uint256 depositId;
            uint256 blockNumber;
            uint256 nativeTokenAmount;
            address erc20Token;
            uint256 erc20Amount;
        }

        function depositEther() external payable;
        function depositERC20(address tokenAddress, uint256 amount) external;
        function changeMaxTickets(uint256 maxTickets) external;
        function flushTokens(address flushTarget) external;
        function maxTickets() external view returns (uint256);
        function viewAllDeposits() external view returns (Deposit[] memory);
    }
}

pub struct Lootbox {
    address: Address,
    chain_id: u64,
    session: Arc<WalletSession>,
    tokens: Erc20,
    native: NativeCurrency,
}

impl Lootbox {
    /// Bind the pool at `address` on `chain_id`. `tokens` must read the same chain.
    pub fn new(address: Address, chain_id: u64, session: Arc<WalletSession>, tokens: Erc20) -> Self {
        let native = session
            .manifest()
            .get(chain_id)
            .map(|c| c.native_currency.clone())
            .unwrap_or_else(|| NativeCurrency {
                name: "Ether".into(),
                symbol: "ETH".into(),
                decimals: NATIVE_DECIMALS,
            });
        Self {
            address,
            chain_id,
            session,
            tokens,
            native,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn tokens(&self) -> &Erc20 {
        &self.tokens
    }

    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    /// Signer for the lootbox chain, or the reason one is not available.
    ///
    /// The chain is read from the wallet itself, after the signer is built, so
    /// a switch the session has not caught up with still fails the check.
    async fn guarded_signer(&self) -> Result<DynProvider> {
        let (Some(signer), Some(_)) = (self.session.signer().await, self.session.network().await)
        else {
            return Err(LootboxError::NotConnected);
        };
        let network = self.session.live_network().await?;
        if network.chain_id != self.chain_id {
            warn!(
                expected = self.chain_id,
                connected = network.chain_id,
                "wallet on wrong network"
            );
            return Err(LootboxError::WrongNetwork {
                expected: self.chain_id,
                connected: network.chain_id,
            });
        }
        Ok(signer)
    }

    pub async fn deposit_native(&self, amount: U256) -> Result<PendingTx> {
        let signer = self.guarded_signer().await?;
        let pending = ILootbox::new(self.address, signer)
            .depositEther()
            .value(amount)
            .send()
            .await?;
        info!(%amount, tx = %pending.tx_hash(), "native deposit submitted");
        Ok(PendingTx::from_alloy(pending))
    }

    pub async fn deposit_erc20(&self, token: Address, amount: U256) -> Result<PendingTx> {
        let signer = self.guarded_signer().await?;
        let pending = ILootbox::new(self.address, signer)
            .depositERC20(token, amount)
            .send()
            .await?;
        info!(%token, %amount, tx = %pending.tx_hash(), "token deposit submitted");
        Ok(PendingTx::from_alloy(pending))
    }

    pub async fn change_max_tickets(&self, max_tickets: U256) -> Result<PendingTx> {
        let signer = self.guarded_signer().await?;
        let pending = ILootbox::new(self.address, signer)
            .changeMaxTickets(max_tickets)
            .send()
            .await?;
        info!(%max_tickets, tx = %pending.tx_hash(), "max tickets change submitted");
        Ok(PendingTx::from_alloy(pending))
    }

    /// Flush pool balances to `target`, or to the connected account.
    pub async fn flush_tokens(&self, target: Option<Address>) -> Result<PendingTx> {
        let signer = self.guarded_signer().await?;
        let target = match target {
            Some(target) => Some(target),
            None => self.session.current_account().await,
        };
        let target = match target {
            Some(t) if !t.is_zero() => t,
            Some(t) => return Err(LootboxError::InvalidAddress(t.to_string())),
            None => return Err(LootboxError::InvalidAddress("no flush target".into())),
        };

        let pending = ILootbox::new(self.address, signer)
            .flushTokens(target)
            .send()
            .await?;
        info!(%target, tx = %pending.tx_hash(), "flush submitted");
        Ok(PendingTx::from_alloy(pending))
    }

    /// Approve the pool to pull `amount` of `token` from the connected account.
    pub async fn approve(&self, token: Address, amount: U256) -> Result<PendingTx> {
        self.approve_spender(token, self.address, amount).await
    }

    async fn approve_spender(&self, token: Address, spender: Address, amount: U256) -> Result<PendingTx> {
        self.guarded_signer().await?;
        let owner = self
            .session
            .current_account()
            .await
            .ok_or(LootboxError::NotConnected)?;
        self.tokens
            .approve_token_amount(owner, spender, token, amount)
            .await
    }

    pub async fn get_max_tickets(&self) -> Result<U256> {
        let provider = self.tokens.reader()?.clone();
        Ok(ILootbox::new(self.address, provider).maxTickets().call().await?)
    }

    /// Every reward in the pool, flattened to one record per asset.
    ///
    /// Never fails: read errors are logged and yield an empty list.
    pub async fn get_lootbox_deposits(&self) -> Vec<DepositRecord> {
        match self.try_get_lootbox_deposits().await {
            Ok(records) => records,
            Err(e) => {
                error!(lootbox = %self.address, error = %e, "failed to load lootbox deposits");
                Vec::new()
            }
        }
    }

    /// Like [`get_lootbox_deposits`](Self::get_lootbox_deposits), surfacing the error.
    pub async fn try_get_lootbox_deposits(&self) -> Result<Vec<DepositRecord>> {
        let provider = self.tokens.reader()?.clone();
        let deposits = ILootbox::new(self.address, provider)
            .viewAllDeposits()
            .call()
            .await?;

        // Symbol and decimals are looked up once per token per call.
        let mut metadata: HashMap<Address, (String, u8)> = HashMap::new();
        let mut records = Vec::with_capacity(deposits.len());
        for deposit in deposits {
            if !deposit.nativeTokenAmount.is_zero() {
                records.push(DepositRecord {
                    token_address: None,
                    token_amount: deposit.nativeTokenAmount,
                    token_symbol: self.native.symbol.clone(),
                    decimals: self.native.decimals,
                });
            }

            let token = deposit.erc20Token;
            if token.is_zero() || deposit.erc20Amount.is_zero() {
                continue;
            }
            let (symbol, decimals) = match metadata.get(&token) {
                Some(known) => known.clone(),
                None => {
                    let fetched =
                        try_join(self.tokens.get_symbol(token), self.tokens.get_decimals(token))
                            .await?;
                    metadata.insert(token, fetched.clone());
                    fetched
                }
            };
            records.push(DepositRecord {
                token_address: Some(token),
                token_amount: deposit.erc20Amount,
                token_symbol: symbol,
                decimals,
            });
        }

        debug!(records = records.len(), tokens = metadata.len(), "lootbox deposits loaded");
        Ok(records)
    }
}

#[async_trait]
impl DepositBackend for Lootbox {
    async fn account(&self) -> Option<Address> {
        self.session.current_account().await
    }

    fn spender(&self) -> Address {
        self.address
    }

    async fn native_balance(&self, owner: Address) -> Result<U256> {
        self.tokens.get_native_balance(Some(owner)).await
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.tokens.get_balance(token, Some(owner)).await
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        self.tokens.get_decimals(token).await
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.tokens.get_allowance(owner, spender, token).await
    }

    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<PendingTx> {
        self.approve_spender(token, spender, amount).await
    }

    async fn deposit_native(&self, amount: U256) -> Result<PendingTx> {
        Lootbox::deposit_native(self, amount).await
    }

    async fn deposit_erc20(&self, token: Address, amount: U256) -> Result<PendingTx> {
        Lootbox::deposit_erc20(self, token, amount).await
    }
}
