use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// lootbox: fund and inspect an on-chain lootbox reward pool.
#[derive(Parser, Debug)]
#[command(name = "lootbox", version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Output as JSON instead of TSV
    #[arg(long, global = true)]
    pub json: bool,

    /// Lootbox contract address
    #[arg(long, env = "LOOTBOX_ADDRESS", global = true)]
    pub lootbox: Option<String>,

    /// Chain the lootbox is deployed on (decimal or 0x hex)
    #[arg(long, env = "LOOTBOX_CHAIN_ID", default_value = "137", global = true)]
    pub chain: String,

    /// Chain manifest: JSON file path or http(s) URL (embedded list if unset)
    #[arg(long, env = "CHAIN_MANIFEST", global = true)]
    pub manifest: Option<String>,

    /// File remembering the last connected wallet
    #[arg(long, env = "PROVIDER_CACHE", global = true)]
    pub provider_cache: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the supported chains
    Chains,

    /// Show a native or token balance
    Balance(BalanceArgs),

    /// List the rewards held by the lootbox
    Deposits,

    /// Deposit a reward into the lootbox
    Deposit(DepositArgs),

    /// Ask the wallet to switch chains, adding the chain if needed
    SwitchNetwork(SwitchNetworkArgs),

    /// Show the ticket cap, or change it when a value is given
    MaxTickets(MaxTicketsArgs),

    /// Flush the lootbox balances to an address
    Flush(FlushArgs),
}

/// Arguments for the `balance` subcommand.
#[derive(Parser, Debug)]
pub struct BalanceArgs {
    /// ERC-20 token address (native currency if omitted)
    #[arg(long)]
    pub token: Option<String>,

    /// Account to query (the wallet account if omitted)
    #[arg(long)]
    pub address: Option<String>,
}

/// Arguments for the `deposit` subcommand.
#[derive(Parser, Debug)]
pub struct DepositArgs {
    /// Human-readable amount (e.g. 1.5)
    pub amount: String,

    /// ERC-20 token address (native currency if omitted)
    #[arg(long)]
    pub token: Option<String>,

    /// Approve only the deposit amount instead of an unlimited allowance
    #[arg(long)]
    pub exact_approval: bool,
}

/// Arguments for the `switch-network` subcommand.
#[derive(Parser, Debug)]
pub struct SwitchNetworkArgs {
    /// Target chain ID (decimal or 0x hex)
    pub chain: String,
}

/// Arguments for the `max-tickets` subcommand.
#[derive(Parser, Debug)]
pub struct MaxTicketsArgs {
    /// New ticket cap
    pub value: Option<u64>,
}

/// Arguments for the `flush` subcommand.
#[derive(Parser, Debug)]
pub struct FlushArgs {
    /// Recipient (the wallet account if omitted)
    #[arg(long)]
    pub to: Option<String>,
}
