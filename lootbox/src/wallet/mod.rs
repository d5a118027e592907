//! Wallet provider seam and session management.
//!
//! [`Eip1193`] is the narrow request/event interface a wallet exposes.
//! [`WalletSession`] sits on top of it and owns the connected account and
//! network; nothing else mutates that state.

pub mod absent;
pub mod cache;
pub mod local;
pub mod session;
pub mod subscriber;

use alloy::primitives::Address;
use alloy::providers::DynProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

pub use absent::NoWallet;
pub use cache::ProviderCache;
pub use local::LocalWallet;
pub use session::{Network, SessionEvent, WalletSession};
pub use subscriber::SessionSubscription;

/// EIP-1193 provider error: a numeric code and a message.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message} (code {code})")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
}

impl ProviderRpcError {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The requested account or method has not been authorized.
    pub const UNAUTHORIZED: i64 = 4100;
    /// The provider does not support the method.
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    /// The provider is disconnected from all chains.
    pub const DISCONNECTED: i64 = 4900;
    /// The wallet does not know the requested chain.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    /// JSON-RPC invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(Self::USER_REJECTED, "User rejected the request.")
    }

    pub fn unrecognized_chain(chain_id_hex: &str) -> Self {
        Self::new(
            Self::UNRECOGNIZED_CHAIN,
            format!("Unrecognized chain ID \"{chain_id_hex}\"."),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }
}

/// Notifications a wallet pushes to its consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Disconnect,
}

/// Request/event interface of an EIP-1193 wallet provider.
#[async_trait]
pub trait Eip1193: Send + Sync {
    /// Short identifier, persisted as the cached-provider marker.
    fn id(&self) -> &str;

    /// Send a JSON-RPC style request to the wallet.
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ProviderRpcError>;

    /// Subscribe to account, chain and disconnect notifications.
    fn events(&self) -> broadcast::Receiver<WalletEvent>;

    /// A provider that signs with the wallet's account on its current chain.
    fn signer(&self) -> Option<DynProvider>;
}
