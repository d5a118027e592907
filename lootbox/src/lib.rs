pub mod chains;
pub mod client;
pub mod config;
pub mod deposit;
pub mod erc20;
pub mod error;
pub mod lootbox;
pub mod rpc;
pub mod tx;
pub mod types;
pub mod units;
pub mod wallet;

// ---- Top-level re-exports for ergonomic usage ----

// Client + config
pub use client::LootboxClient;
pub use config::LootboxConfig;
pub use error::{LootboxError, Result};

// Chains
pub use chains::{ChainDescriptor, ChainManifest, NativeCurrency};

// Wallet session
pub use wallet::{
    Eip1193, LocalWallet, Network, NoWallet, ProviderCache, ProviderRpcError, SessionEvent,
    SessionSubscription, WalletEvent, WalletSession,
};

// Contracts
pub use erc20::Erc20;
pub use lootbox::Lootbox;
pub use rpc::read_only_provider;
pub use tx::{Confirmation, PendingTx};

// Deposit flow
pub use deposit::{
    ApprovalPolicy, DepositBackend, DepositFlow, DepositForm, DepositOutcome, DepositPhase,
    RewardDepositRequest,
};
pub use types::{DepositRecord, RewardType};

// Units
pub use units::{format_units, parse_units, NATIVE_DECIMALS};
