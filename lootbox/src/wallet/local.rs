//! In-process EIP-1193 wallet backed by a local private key.
//!
//! Behaves like a browser wallet from the session's point of view: it answers
//! account/chain requests, refuses to switch to chains it has not been told
//! about (code 4902), learns chains through `wallet_addEthereumChain`, and
//! pushes account/chain/disconnect events.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{Eip1193, ProviderRpcError, WalletEvent};
use crate::chains::{chain_id_hex, parse_chain_id, ChainDescriptor, ChainManifest};
use crate::error::{LootboxError, Result};

type RpcResult = std::result::Result<Value, ProviderRpcError>;

pub struct LocalWallet {
    signer: PrivateKeySigner,
    chains: RwLock<Vec<ChainDescriptor>>,
    current_chain: AtomicU64,
    connected: AtomicBool,
    reject_requests: AtomicBool,
    events_tx: broadcast::Sender<WalletEvent>,
}

impl LocalWallet {
    /// Create a wallet that knows the manifest chains and starts on `chain_id`.
    pub fn new(signer: PrivateKeySigner, manifest: &ChainManifest, chain_id: u64) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            signer,
            chains: RwLock::new(manifest.iter().cloned().collect()),
            current_chain: AtomicU64::new(chain_id),
            connected: AtomicBool::new(false),
            reject_requests: AtomicBool::new(false),
            events_tx,
        }
    }

    /// Create a wallet from a hex-encoded private key (with or without `0x`).
    pub fn from_private_key(key: &str, manifest: &ChainManifest, chain_id: u64) -> Result<Self> {
        let signer: PrivateKeySigner = key
            .trim()
            .parse()
            .map_err(|e| LootboxError::Signing(format!("invalid private key: {e}")))?;
        Ok(Self::new(signer, manifest, chain_id))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.current_chain.load(Ordering::SeqCst)
    }

    /// Answer prompting requests (connect, switch and add chain) with a 4001
    /// rejection while set. Transactions sent through [`Eip1193::signer`] are
    /// signed by the local key and are not affected.
    pub fn set_reject_requests(&self, reject: bool) {
        self.reject_requests.store(reject, Ordering::SeqCst);
    }

    /// Drop the dapp connection, as if the user disconnected in the wallet UI.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events_tx.send(WalletEvent::Disconnect);
    }

    fn knows_chain(&self, chain_id: u64) -> bool {
        self.chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|c| c.chain_id == chain_id)
    }

    fn check_approval(&self) -> std::result::Result<(), ProviderRpcError> {
        if self.reject_requests.load(Ordering::SeqCst) {
            return Err(ProviderRpcError::user_rejected());
        }
        Ok(())
    }

    fn set_chain(&self, chain_id: u64) {
        let previous = self.current_chain.swap(chain_id, Ordering::SeqCst);
        if previous != chain_id {
            info!(from = previous, to = chain_id, "local wallet switched chain");
            let _ = self.events_tx.send(WalletEvent::ChainChanged(chain_id));
        }
    }

    fn request_accounts(&self) -> RpcResult {
        self.check_approval()?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(json!([self.address().to_checksum(None)]))
    }

    fn accounts(&self) -> RpcResult {
        if self.connected.load(Ordering::SeqCst) {
            Ok(json!([self.address().to_checksum(None)]))
        } else {
            Ok(json!([]))
        }
    }

    fn switch_chain(&self, params: &Value) -> RpcResult {
        let chain_id = first_param(params)
            .and_then(|p| p.get("chainId"))
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderRpcError::invalid_params("expected [{ chainId }]"))?;
        let chain_id = parse_chain_id(chain_id)
            .map_err(|e| ProviderRpcError::invalid_params(e.to_string()))?;

        if !self.knows_chain(chain_id) {
            return Err(ProviderRpcError::unrecognized_chain(&chain_id_hex(chain_id)));
        }
        self.check_approval()?;
        self.set_chain(chain_id);
        Ok(Value::Null)
    }

    fn add_chain(&self, params: &Value) -> RpcResult {
        let raw = first_param(params)
            .cloned()
            .ok_or_else(|| ProviderRpcError::invalid_params("expected [chain descriptor]"))?;
        let descriptor: ChainDescriptor = serde_json::from_value(raw)
            .map_err(|e| ProviderRpcError::invalid_params(format!("bad chain descriptor: {e}")))?;
        if descriptor.rpc_urls.is_empty() {
            return Err(ProviderRpcError::invalid_params("rpcUrls must not be empty"));
        }
        self.check_approval()?;

        let chain_id = descriptor.chain_id;
        {
            let mut chains = self.chains.write().unwrap_or_else(PoisonError::into_inner);
            chains.retain(|c| c.chain_id != chain_id);
            debug!(chain_id, name = %descriptor.chain_name, "local wallet added chain");
            chains.push(descriptor);
        }
        self.set_chain(chain_id);
        Ok(Value::Null)
    }
}

fn first_param(params: &Value) -> Option<&Value> {
    params.as_array().and_then(|p| p.first())
}

#[async_trait]
impl Eip1193 for LocalWallet {
    fn id(&self) -> &str {
        "local"
    }

    async fn request(&self, method: &str, params: Value) -> RpcResult {
        debug!(method, "local wallet request");
        match method {
            "eth_requestAccounts" => self.request_accounts(),
            "eth_accounts" => self.accounts(),
            "eth_chainId" => Ok(json!(chain_id_hex(self.chain_id()))),
            "wallet_switchEthereumChain" => self.switch_chain(&params),
            "wallet_addEthereumChain" => self.add_chain(&params),
            _ => Err(ProviderRpcError::new(
                ProviderRpcError::UNSUPPORTED_METHOD,
                format!("unsupported method: {method}"),
            )),
        }
    }

    fn events(&self) -> broadcast::Receiver<WalletEvent> {
        self.events_tx.subscribe()
    }

    fn signer(&self) -> Option<DynProvider> {
        let chain_id = self.chain_id();
        let url = {
            let chains = self.chains.read().unwrap_or_else(PoisonError::into_inner);
            chains
                .iter()
                .find(|c| c.chain_id == chain_id)
                .and_then(|c| c.primary_rpc_url())
                .and_then(|u| u.parse::<url::Url>().ok())?
        };

        let wallet = EthereumWallet::from(self.signer.clone());
        Some(ProviderBuilder::new().wallet(wallet).connect_http(url).erased())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hardhat/Anvil account #0.
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn wallet(chain_id: u64) -> LocalWallet {
        LocalWallet::from_private_key(KEY, &ChainManifest::builtin(), chain_id).unwrap()
    }

    #[test]
    fn test_from_private_key() {
        let w = wallet(1);
        assert_eq!(w.address(), ADDRESS.parse::<Address>().unwrap());
        assert!(LocalWallet::from_private_key("nope", &ChainManifest::builtin(), 1).is_err());
    }

    #[tokio::test]
    async fn test_request_accounts_connects() {
        let w = wallet(1);
        assert_eq!(w.request("eth_accounts", json!([])).await.unwrap(), json!([]));
        let accounts = w.request("eth_requestAccounts", json!([])).await.unwrap();
        assert_eq!(accounts, json!([ADDRESS]));
        assert_eq!(w.request("eth_accounts", json!([])).await.unwrap(), json!([ADDRESS]));
    }

    #[tokio::test]
    async fn test_chain_id_is_hex() {
        let w = wallet(137);
        assert_eq!(w.request("eth_chainId", json!([])).await.unwrap(), json!("0x89"));
    }

    #[tokio::test]
    async fn test_switch_to_known_chain_emits_event() {
        let w = wallet(1);
        let mut events = w.events();
        w.request("wallet_switchEthereumChain", json!([{ "chainId": "0x89" }]))
            .await
            .unwrap();
        assert_eq!(w.chain_id(), 137);
        assert_eq!(events.try_recv().unwrap(), WalletEvent::ChainChanged(137));
    }

    #[tokio::test]
    async fn test_switch_to_same_chain_is_silent() {
        let w = wallet(1);
        let mut events = w.events();
        w.request("wallet_switchEthereumChain", json!([{ "chainId": "0x1" }]))
            .await
            .unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_switch_to_unknown_chain_returns_4902() {
        let w = wallet(1);
        let err = w
            .request("wallet_switchEthereumChain", json!([{ "chainId": "0xa4b1" }]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderRpcError::UNRECOGNIZED_CHAIN);
        assert_eq!(w.chain_id(), 1);
    }

    #[tokio::test]
    async fn test_add_chain_then_switch() {
        let w = wallet(1);
        let params = json!([{
            "chainId": "0xa4b1",
            "chainName": "Arbitrum One",
            "nativeCurrency": { "name": "Ether", "symbol": "ETH", "decimals": 18 },
            "rpcUrls": ["https://arb1.arbitrum.io/rpc"],
            "blockExplorerUrls": ["https://arbiscan.io"]
        }]);
        w.request("wallet_addEthereumChain", params).await.unwrap();
        assert_eq!(w.chain_id(), 42161);
        assert!(w.knows_chain(42161));
    }

    #[tokio::test]
    async fn test_add_chain_rejects_missing_rpc() {
        let w = wallet(1);
        let params = json!([{
            "chainId": "0xa4b1",
            "chainName": "Arbitrum One",
            "nativeCurrency": { "name": "Ether", "symbol": "ETH", "decimals": 18 },
            "rpcUrls": []
        }]);
        let err = w.request("wallet_addEthereumChain", params).await.unwrap_err();
        assert_eq!(err.code, ProviderRpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_rejecting_wallet_returns_4001() {
        let w = wallet(1);
        w.set_reject_requests(true);
        let err = w.request("eth_requestAccounts", json!([])).await.unwrap_err();
        assert_eq!(err.code, ProviderRpcError::USER_REJECTED);
        let err = w
            .request("wallet_switchEthereumChain", json!([{ "chainId": "0x89" }]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ProviderRpcError::USER_REJECTED);
        let params = json!([{
            "chainId": "0xa4b1",
            "chainName": "Arbitrum One",
            "nativeCurrency": { "name": "Ether", "symbol": "ETH", "decimals": 18 },
            "rpcUrls": ["https://arb1.arbitrum.io/rpc"]
        }]);
        let err = w.request("wallet_addEthereumChain", params).await.unwrap_err();
        assert_eq!(err.code, ProviderRpcError::USER_REJECTED);
        assert!(!w.knows_chain(42161));

        // Chain queries and the signing provider are not prompts.
        assert_eq!(w.request("eth_chainId", json!([])).await.unwrap(), json!("0x1"));
        assert!(w.signer().is_some());
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let w = wallet(1);
        let err = w.request("eth_sign", json!([])).await.unwrap_err();
        assert_eq!(err.code, ProviderRpcError::UNSUPPORTED_METHOD);
    }

    #[tokio::test]
    async fn test_signer_for_known_chain() {
        let w = wallet(137);
        assert!(w.signer().is_some());

        let empty = LocalWallet::from_private_key(KEY, &ChainManifest::new(Vec::new()), 137).unwrap();
        assert!(empty.signer().is_none());
    }

    #[test]
    fn test_disconnect_emits_event() {
        let w = wallet(1);
        let mut events = w.events();
        w.disconnect();
        assert_eq!(events.try_recv().unwrap(), WalletEvent::Disconnect);
    }
}
