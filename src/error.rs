use lootbox::LootboxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Lootbox(#[from] LootboxError),

    #[error("PRIVATE_KEY environment variable is required")]
    MissingPrivateKey,

    #[error("lootbox address is required (--lootbox or LOOTBOX_ADDRESS)")]
    MissingLootbox,

    #[error("no account: pass --address or set PRIVATE_KEY")]
    NoAccount,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("cancelled")]
    Cancelled,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
