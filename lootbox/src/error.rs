use alloy::primitives::{TxHash, U256};
use thiserror::Error;

use crate::wallet::ProviderRpcError;

#[derive(Error, Debug)]
pub enum LootboxError {
    #[error("Connect MetaMask: no wallet session with a signer and a known network")]
    NotConnected,

    #[error("wrong network: connected to chain {connected}, switch to chain {expected}")]
    WrongNetwork { expected: u64, connected: u64 },

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("signing error: {0}")]
    Signing(String),

    #[error("wallet error: {0}")]
    Wallet(#[from] ProviderRpcError),

    #[error("contract error: {0}")]
    Contract(#[from] alloy::contract::Error),

    #[error("RPC error: {0}")]
    Transport(#[from] alloy::transports::TransportError),

    #[error("transaction confirmation failed: {0}")]
    PendingTransaction(#[from] alloy::providers::PendingTransactionError),

    #[error("transaction {0} reverted")]
    Reverted(TxHash),

    #[error("chain manifest error: {0}")]
    Manifest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("a deposit is already in progress")]
    FlowBusy,
}

impl LootboxError {
    /// Whether the wallet reported that the user rejected the request.
    ///
    /// Wallets signal this with EIP-1193 code 4001, either directly or wrapped
    /// in a JSON-RPC error payload; some only carry it in the message text.
    pub fn is_user_rejection(&self) -> bool {
        let code = match self {
            LootboxError::Wallet(e) => Some(e.code),
            LootboxError::Transport(e) => e.as_error_resp().map(|p| p.code),
            LootboxError::Contract(alloy::contract::Error::TransportError(e)) => {
                e.as_error_resp().map(|p| p.code)
            }
            _ => None,
        };
        if code == Some(ProviderRpcError::USER_REJECTED) {
            return true;
        }

        let msg = self.to_string().to_lowercase();
        msg.contains("user rejected") || msg.contains("user denied") || msg.contains("action_rejected")
    }
}

pub type Result<T> = std::result::Result<T, LootboxError>;
