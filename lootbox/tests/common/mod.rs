//! Shared fixtures: a scriptable EIP-1193 wallet and a JSON-RPC node stub.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy::hex;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::network::EthereumWallet;
use async_trait::async_trait;
use lootbox::chains::{chain_id_hex, parse_chain_id};
use lootbox::{ChainDescriptor, ChainManifest, Eip1193, NativeCurrency, ProviderRpcError, WalletEvent};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use wiremock::{Request, Respond, ResponseTemplate};

// Hardhat/Anvil account #0.
pub const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const ACCOUNT: Address = alloy::primitives::address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const LOOTBOX: Address = alloy::primitives::address!("5FbDB2315678afecb367f032d93F642f64180aa3");
pub const TOKEN: Address = alloy::primitives::address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");

pub fn chain(chain_id: u64, name: &str, rpc_url: &str) -> ChainDescriptor {
    ChainDescriptor {
        chain_id,
        chain_name: name.to_string(),
        native_currency: NativeCurrency {
            name: "Ether".into(),
            symbol: "ETH".into(),
            decimals: 18,
        },
        rpc_urls: vec![rpc_url.to_string()],
        block_explorer_urls: Vec::new(),
    }
}

/// Two chains: 1 ("Ethereum") and 137 ("Polygon", native symbol POL).
pub fn manifest(rpc_url: &str) -> ChainManifest {
    let mut polygon = chain(137, "Polygon", rpc_url);
    polygon.native_currency.symbol = "POL".into();
    ChainManifest::new(vec![chain(1, "Ethereum", rpc_url), polygon])
}

// ---------------------------------------------------------------------------
// Mock wallet
// ---------------------------------------------------------------------------

/// Scriptable wallet: records every request, knows a fixed set of chains and
/// can be told to reject or fail.
pub struct MockWallet {
    account: Address,
    chain_id: AtomicU64,
    known_chains: Mutex<Vec<u64>>,
    requests: Mutex<Vec<(String, Value)>>,
    reject_connect: AtomicBool,
    reject_switch: AtomicBool,
    switch_after_chain_query: Mutex<Option<u64>>,
    events_tx: broadcast::Sender<WalletEvent>,
    signer: Mutex<Option<DynProvider>>,
}

impl MockWallet {
    pub fn new(chain_id: u64, known_chains: &[u64]) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(16);
        Arc::new(Self {
            account: ACCOUNT,
            chain_id: AtomicU64::new(chain_id),
            known_chains: Mutex::new(known_chains.to_vec()),
            requests: Mutex::new(Vec::new()),
            reject_connect: AtomicBool::new(false),
            reject_switch: AtomicBool::new(false),
            switch_after_chain_query: Mutex::new(None),
            events_tx,
            signer: Mutex::new(None),
        })
    }

    /// Sign with the Hardhat key against `rpc_url`.
    pub fn with_signer(self: Arc<Self>, rpc_url: &str) -> Arc<Self> {
        let signer: PrivateKeySigner = KEY.parse().unwrap();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url.parse().unwrap())
            .erased();
        *self.signer.lock().unwrap() = Some(provider);
        self
    }

    pub fn reject_connect(&self, reject: bool) {
        self.reject_connect.store(reject, Ordering::SeqCst);
    }

    pub fn reject_switch(&self, reject: bool) {
        self.reject_switch.store(reject, Ordering::SeqCst);
    }

    /// Answer the next `eth_chainId` with the current chain, then move to
    /// `chain_id` and announce it, as a user switching mid-connect would.
    pub fn switch_after_chain_query(&self, chain_id: u64) {
        *self.switch_after_chain_query.lock().unwrap() = Some(chain_id);
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id.load(Ordering::SeqCst)
    }

    pub fn emit(&self, event: WalletEvent) {
        if let WalletEvent::ChainChanged(id) = event {
            self.chain_id.store(id, Ordering::SeqCst);
        }
        let _ = self.events_tx.send(event);
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn params_of(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl Eip1193 for MockWallet {
    fn id(&self) -> &str {
        "mock"
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        self.requests
            .lock()
            .unwrap()
            .push((method.to_string(), params.clone()));

        match method {
            "eth_requestAccounts" => {
                if self.reject_connect.load(Ordering::SeqCst) {
                    return Err(ProviderRpcError::user_rejected());
                }
                Ok(json!([self.account.to_checksum(None)]))
            }
            "eth_chainId" => {
                let answer = json!(chain_id_hex(self.chain_id()));
                if let Some(next) = self.switch_after_chain_query.lock().unwrap().take() {
                    self.emit(WalletEvent::ChainChanged(next));
                }
                Ok(answer)
            }
            "wallet_switchEthereumChain" => {
                let target = parse_chain_id(params[0]["chainId"].as_str().unwrap()).unwrap();
                if !self.known_chains.lock().unwrap().contains(&target) {
                    return Err(ProviderRpcError::unrecognized_chain(&chain_id_hex(target)));
                }
                if self.reject_switch.load(Ordering::SeqCst) {
                    return Err(ProviderRpcError::user_rejected());
                }
                self.chain_id.store(target, Ordering::SeqCst);
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let target = parse_chain_id(params[0]["chainId"].as_str().unwrap()).unwrap();
                self.known_chains.lock().unwrap().push(target);
                self.chain_id.store(target, Ordering::SeqCst);
                Ok(Value::Null)
            }
            other => Err(ProviderRpcError::new(
                ProviderRpcError::UNSUPPORTED_METHOD,
                format!("unsupported: {other}"),
            )),
        }
    }

    fn events(&self) -> broadcast::Receiver<WalletEvent> {
        self.events_tx.subscribe()
    }

    fn signer(&self) -> Option<DynProvider> {
        self.signer.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC node stub
// ---------------------------------------------------------------------------

/// Answers `eth_chainId`, `eth_getBalance` and `eth_call` from canned data.
/// Calls with no canned answer get a JSON-RPC error.
#[derive(Clone, Default)]
pub struct RpcStub {
    chain_id: u64,
    balances: HashMap<Address, U256>,
    calls: HashMap<(Address, [u8; 4]), Vec<u8>>,
}

impl RpcStub {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            ..Default::default()
        }
    }

    pub fn balance(mut self, owner: Address, balance: U256) -> Self {
        self.balances.insert(owner, balance);
        self
    }

    /// Answer calls to `to` with `selector` by returning the ABI-encoded `output`.
    pub fn call(mut self, to: Address, selector: [u8; 4], output: Vec<u8>) -> Self {
        self.calls.insert((to, selector), output);
        self
    }

    fn answer(&self, method: &str, params: &Value) -> Option<Value> {
        match method {
            "eth_chainId" => Some(json!(chain_id_hex(self.chain_id))),
            "eth_getBalance" => {
                let owner: Address = params[0].as_str()?.parse().ok()?;
                let balance = self.balances.get(&owner).copied().unwrap_or_default();
                Some(json!(format!("0x{balance:x}")))
            }
            "eth_call" => {
                let tx = &params[0];
                let to: Address = tx["to"].as_str()?.parse().ok()?;
                let input = tx["input"].as_str().or_else(|| tx["data"].as_str())?;
                let input = hex::decode(input).ok()?;
                let selector: [u8; 4] = input.get(..4)?.try_into().ok()?;
                let output = self.calls.get(&(to, selector))?;
                Some(json!(hex::encode_prefixed(output)))
            }
            _ => None,
        }
    }
}

impl Respond for RpcStub {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let id = body["id"].clone();
        let method = body["method"].as_str().unwrap_or_default();

        let payload = match self.answer(method, &body["params"]) {
            Some(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            None => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32000, "message": format!("execution reverted: no stub for {method}") }
            }),
        };
        ResponseTemplate::new(200).set_body_json(payload)
    }
}
