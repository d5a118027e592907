use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::units::format_units;

/// Which asset a reward deposit pays in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    /// The chain's native currency.
    #[default]
    Native,
    Erc20,
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewardType::Native => f.write_str("native"),
            RewardType::Erc20 => f.write_str("erc20"),
        }
    }
}

impl FromStr for RewardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" | "eth" => Ok(RewardType::Native),
            "erc20" | "token" => Ok(RewardType::Erc20),
            other => Err(format!("unknown reward type: {other}")),
        }
    }
}

/// One reward sitting in the lootbox, with display metadata resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRecord {
    /// `None` for the native currency.
    pub token_address: Option<Address>,
    /// Amount in base units.
    pub token_amount: U256,
    pub token_symbol: String,
    pub decimals: u8,
}

impl DepositRecord {
    pub fn is_native(&self) -> bool {
        self.token_address.is_none()
    }

    /// Human-readable amount, e.g. `"1.5"`.
    pub fn formatted_amount(&self) -> String {
        format_units(self.token_amount, self.decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_type_from_str() {
        assert_eq!("native".parse::<RewardType>().unwrap(), RewardType::Native);
        assert_eq!("ERC20".parse::<RewardType>().unwrap(), RewardType::Erc20);
        assert!("nft".parse::<RewardType>().is_err());
    }

    #[test]
    fn test_formatted_amount() {
        let record = DepositRecord {
            token_address: None,
            token_amount: U256::from(1_500_000_000_000_000_000u128),
            token_symbol: "ETH".into(),
            decimals: 18,
        };
        assert!(record.is_native());
        assert_eq!(record.formatted_amount(), "1.5");
    }
}
