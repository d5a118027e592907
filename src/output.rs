//! TSV / JSON rendering of command results, one record per line.

use std::io::Write;

use alloy::primitives::{Address, U256};
use lootbox::{ChainDescriptor, Confirmation, DepositPhase, DepositRecord, Network};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Write one record: `value` in JSON mode, the tab-joined `fields` otherwise.
    fn record<W: Write>(&self, writer: &mut W, value: Value, fields: &[&str]) -> std::io::Result<()> {
        if self.json {
            serde_json::to_writer(&mut *writer, &value)?;
        } else {
            writer.write_all(fields.join("\t").as_bytes())?;
        }
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// chain_id \t chain_id_hex \t name \t symbol \t rpc_url
    pub fn chain<W: Write>(&self, writer: &mut W, chain: &ChainDescriptor) -> std::io::Result<()> {
        let id = chain.chain_id.to_string();
        let hex = chain.chain_id_hex();
        let rpc = chain.primary_rpc_url().unwrap_or("-");
        self.record(
            writer,
            json!({
                "chainId": chain.chain_id,
                "chainIdHex": hex,
                "chainName": chain.chain_name,
                "symbol": chain.native_currency.symbol,
                "rpcUrl": rpc,
                "blockExplorerUrl": chain.block_explorer_urls.first(),
            }),
            &[&id, &hex, &chain.chain_name, &chain.native_currency.symbol, rpc],
        )
    }

    /// symbol \t amount \t raw_amount \t token (`native` for the chain currency)
    pub fn deposit<W: Write>(&self, writer: &mut W, record: &DepositRecord) -> std::io::Result<()> {
        let amount = record.formatted_amount();
        let raw = record.token_amount.to_string();
        let token = record
            .token_address
            .map(|a| a.to_checksum(None))
            .unwrap_or_else(|| "native".to_string());
        self.record(
            writer,
            json!({
                "symbol": record.token_symbol,
                "amount": amount,
                "rawAmount": raw,
                "decimals": record.decimals,
                "token": record.token_address.map(|a| a.to_checksum(None)),
            }),
            &[&record.token_symbol, &amount, &raw, &token],
        )
    }

    /// owner \t symbol \t amount \t raw_amount
    pub fn balance<W: Write>(
        &self,
        writer: &mut W,
        owner: Address,
        symbol: &str,
        amount: &str,
        raw: U256,
    ) -> std::io::Result<()> {
        let owner = owner.to_checksum(None);
        let raw = raw.to_string();
        self.record(
            writer,
            json!({ "owner": owner, "symbol": symbol, "amount": amount, "rawAmount": raw }),
            &[&owner, symbol, amount, &raw],
        )
    }

    /// phase \t tx_hash (when known)
    pub fn phase<W: Write>(&self, writer: &mut W, phase: &DepositPhase) -> std::io::Result<()> {
        let label = phase_label(phase);
        let (tx, detail) = match phase {
            DepositPhase::Success(c) => (Some(c.tx_hash.to_string()), None),
            DepositPhase::Failed(msg) => (None, Some(msg.as_str())),
            _ => (None, None),
        };
        let mut fields: Vec<&str> = vec![label];
        if let Some(tx) = &tx {
            fields.push(tx.as_str());
        }
        if let Some(detail) = detail {
            fields.push(detail);
        }
        self.record(
            writer,
            json!({ "phase": label, "tx": tx, "error": detail }),
            &fields,
        )
    }

    /// label \t tx_hash \t block
    pub fn submitted<W: Write>(
        &self,
        writer: &mut W,
        label: &str,
        confirmation: &Confirmation,
    ) -> std::io::Result<()> {
        let hash = confirmation.tx_hash.to_string();
        let block = confirmation
            .block_number
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        self.record(
            writer,
            json!({ "action": label, "tx": hash, "block": confirmation.block_number }),
            &[label, &hash, &block],
        )
    }

    /// account \t chain_id \t network
    pub fn network<W: Write>(
        &self,
        writer: &mut W,
        account: Option<Address>,
        network: Option<&Network>,
    ) -> std::io::Result<()> {
        let account = account
            .map(|a| a.to_checksum(None))
            .unwrap_or_else(|| "-".to_string());
        let (chain_id, name) = match network {
            Some(n) => (n.chain_id.to_string(), n.name.as_str()),
            None => ("-".to_string(), "disconnected"),
        };
        self.record(
            writer,
            json!({ "account": account, "network": network }),
            &[&account, &chain_id, name],
        )
    }

    /// name \t value
    pub fn value<W: Write>(&self, writer: &mut W, name: &str, value: U256) -> std::io::Result<()> {
        let value = value.to_string();
        let mut object = serde_json::Map::new();
        object.insert(name.to_string(), Value::String(value.clone()));
        self.record(writer, Value::Object(object), &[name, &value])
    }
}

fn phase_label(phase: &DepositPhase) -> &'static str {
    match phase {
        DepositPhase::Idle => "idle",
        DepositPhase::ValidatingInput => "validating",
        DepositPhase::CheckingBalance => "checking_balance",
        DepositPhase::CheckingAllowance => "checking_allowance",
        DepositPhase::ApprovingAllowance => "approving",
        DepositPhase::AwaitingApprovalConfirmation => "awaiting_approval",
        DepositPhase::SubmittingDeposit => "depositing",
        DepositPhase::AwaitingDepositConfirmation => "awaiting_deposit",
        DepositPhase::Success(_) => "success",
        DepositPhase::Failed(_) => "failed",
    }
}
