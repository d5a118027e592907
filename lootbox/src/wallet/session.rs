//! Wallet session: the connected account and network.
//!
//! A [`WalletSession`] is an explicit value shared behind `Arc` by every
//! consumer. It is the only writer of session state: explicit
//! connect/disconnect/switch calls and wallet events are the only inputs.
//!
//! ```text
//!   Eip1193 provider ── events ──> listener task (owned by Listener handle)
//!         ^                               |
//!         | requests                      v
//!   WalletSession ── state (RwLock) <── apply_* ──> broadcast<SessionEvent>
//! ```
//!
//! A chain change never tears the process down. The network is updated in
//! place and `SessionEvent::NetworkChanged` is emitted; chain-bound handles
//! (the signing provider) are fetched per call so they follow automatically.

use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::Address;
use alloy::providers::DynProvider;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cache::ProviderCache;
use super::subscriber::SessionSubscription;
use super::{Eip1193, ProviderRpcError, WalletEvent};
use crate::chains::{chain_id_hex, parse_chain_id, ChainManifest};
use crate::error::{LootboxError, Result};

/// The network a wallet is connected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub chain_id: u64,
    pub name: String,
}

/// Changes to the session, in the order they were applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected { account: Address, network: Network },
    AccountsChanged(Vec<Address>),
    NetworkChanged(Network),
    Disconnected,
}

#[derive(Debug, Default)]
struct SessionState {
    accounts: Vec<Address>,
    current_account: Option<Address>,
    network: Option<Network>,
}

impl SessionState {
    fn clear(&mut self) {
        self.accounts.clear();
        self.current_account = None;
        self.network = None;
    }
}

/// Handle to the event listener task; stopping it detaches from the wallet.
struct Listener {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Listener {
    fn stop(self) {
        self.cancel.cancel();
        drop(self.handle);
    }
}

pub struct WalletSession {
    provider: Arc<dyn Eip1193>,
    manifest: Arc<ChainManifest>,
    cache: ProviderCache,
    state: Arc<RwLock<SessionState>>,
    events_tx: broadcast::Sender<SessionEvent>,
    listener: Mutex<Option<Listener>>,
}

impl WalletSession {
    pub fn new(provider: Arc<dyn Eip1193>, manifest: Arc<ChainManifest>, cache: ProviderCache) -> Self {
        let (events_tx, _) = broadcast::channel(64);
        Self {
            provider,
            manifest,
            cache,
            state: Arc::new(RwLock::new(SessionState::default())),
            events_tx,
            listener: Mutex::new(None),
        }
    }

    pub fn manifest(&self) -> &ChainManifest {
        &self.manifest
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    /// Subscribe to session changes.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription::new(self.events_tx.subscribe())
    }

    pub async fn current_account(&self) -> Option<Address> {
        self.state.read().await.current_account
    }

    pub async fn accounts(&self) -> Vec<Address> {
        self.state.read().await.accounts.clone()
    }

    pub async fn network(&self) -> Option<Network> {
        self.state.read().await.network.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.current_account.is_some()
    }

    /// Signing provider for the connected wallet, `None` when disconnected.
    pub async fn signer(&self) -> Option<DynProvider> {
        if !self.is_connected().await {
            return None;
        }
        self.provider.signer()
    }

    /// Ask the wallet for accounts and populate the session.
    ///
    /// Returns the connected account. Cancellation or wallet failures are
    /// logged and reported as `None`.
    pub async fn connect_wallet(&self) -> Option<Address> {
        match self.try_connect().await {
            Ok(account) => Some(account),
            Err(e) => {
                warn!(provider = self.provider.id(), error = %e, "wallet connection failed");
                None
            }
        }
    }

    /// Whether the cached-provider marker names this session's wallet.
    pub async fn has_cached_provider(&self) -> bool {
        self.cache.load().await.as_deref() == Some(self.provider.id())
    }

    /// Reconnect silently if a previous run left a marker for this wallet.
    pub async fn restore(&self) -> Option<Address> {
        let cached = self.cache.load().await?;
        if cached != self.provider.id() {
            debug!(cached, provider = self.provider.id(), "cached provider differs, not restoring");
            return None;
        }
        self.connect_wallet().await
    }

    /// Drop the wallet connection and forget the cached provider.
    pub async fn disconnect(&self) {
        self.detach_listener();
        self.state.write().await.clear();
        if let Err(e) = self.cache.clear().await {
            warn!(error = %e, "failed to clear provider cache");
        }
        info!("wallet disconnected");
        let _ = self.events_tx.send(SessionEvent::Disconnected);
    }

    /// Ask the wallet to switch to `chain_id`, adding the chain first if the
    /// wallet does not know it.
    ///
    /// Failures are logged only. The outcome shows up as a network change on
    /// the session.
    pub async fn switch_network(&self, chain_id: u64) {
        let hex = chain_id_hex(chain_id);
        let switched = match self
            .provider
            .request("wallet_switchEthereumChain", json!([{ "chainId": hex }]))
            .await
        {
            Ok(_) => true,
            Err(e) if e.code == ProviderRpcError::UNRECOGNIZED_CHAIN => {
                debug!(chain_id, "chain unknown to wallet, adding it");
                self.add_chain(chain_id).await
            }
            Err(e) => {
                warn!(chain_id, error = %e, "network switch failed");
                false
            }
        };

        if switched {
            self.refresh_network().await;
        }
    }

    async fn add_chain(&self, chain_id: u64) -> bool {
        let Some(descriptor) = self.manifest.get(chain_id) else {
            warn!(chain_id, "cannot add chain to wallet: not in manifest");
            return false;
        };

        match self
            .provider
            .request("wallet_addEthereumChain", json!([descriptor.add_chain_params()]))
            .await
        {
            Ok(_) => {
                info!(chain_id, name = %descriptor.chain_name, "chain added to wallet");
                true
            }
            Err(e) => {
                warn!(chain_id, error = %e, "adding chain to wallet failed");
                false
            }
        }
    }

    async fn try_connect(&self) -> Result<Address> {
        // Subscribe first so events raised while connecting reach the listener.
        let wallet_events = self.provider.events();
        let accounts = self.request_accounts().await?;
        let account = accounts.first().copied().ok_or_else(|| {
            ProviderRpcError::new(ProviderRpcError::UNAUTHORIZED, "wallet returned no accounts")
        })?;
        let network = self.fetch_network().await?;

        {
            let mut state = self.state.write().await;
            state.accounts = accounts;
            state.current_account = Some(account);
            state.network = Some(network.clone());
        }

        if let Err(e) = self.cache.store(self.provider.id()).await {
            warn!(error = %e, "failed to store provider cache");
        }
        self.attach_listener(wallet_events);

        info!(%account, chain_id = network.chain_id, network = %network.name, "wallet connected");
        let _ = self.events_tx.send(SessionEvent::Connected { account, network });
        Ok(account)
    }

    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let value = self
            .provider
            .request("eth_requestAccounts", json!([]))
            .await?;
        let raw: Vec<String> = serde_json::from_value(value)?;
        raw.iter()
            .map(|a| {
                a.parse::<Address>()
                    .map_err(|_| LootboxError::InvalidAddress(a.clone()))
            })
            .collect()
    }

    async fn fetch_network(&self) -> Result<Network> {
        let value = self.provider.request("eth_chainId", json!([])).await?;
        let chain_id = match value {
            serde_json::Value::String(s) => parse_chain_id(&s)?,
            serde_json::Value::Number(n) => n.as_u64().ok_or_else(|| {
                LootboxError::Manifest(format!("wallet returned invalid chain id {n}"))
            })?,
            other => {
                return Err(LootboxError::Manifest(format!(
                    "wallet returned invalid chain id {other}"
                )))
            }
        };
        Ok(Network {
            chain_id,
            name: self.manifest.name_of(chain_id),
        })
    }

    /// Ask the wallet which chain it is on right now and record it.
    ///
    /// The stored network trails the wallet until its `ChainChanged` event is
    /// applied; callers about to sign check this instead.
    pub async fn live_network(&self) -> Result<Network> {
        let network = self.fetch_network().await?;
        apply_network(&self.state, &self.events_tx, network.chain_id, &self.manifest).await;
        Ok(network)
    }

    async fn refresh_network(&self) {
        if let Err(e) = self.live_network().await {
            warn!(error = %e, "failed to read network after switch");
        }
    }

    fn attach_listener(&self, wallet_events: broadcast::Receiver<WalletEvent>) {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_listener(
            wallet_events,
            Arc::clone(&self.state),
            self.events_tx.clone(),
            Arc::clone(&self.manifest),
            cancel.clone(),
        ));

        let previous = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Listener { cancel, handle });
        if let Some(previous) = previous {
            previous.stop();
        }
    }

    fn detach_listener(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            listener.stop();
        }
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.detach_listener();
    }
}

// ---------------------------------------------------------------------------
// Listener task
// ---------------------------------------------------------------------------

async fn run_listener(
    mut rx: broadcast::Receiver<WalletEvent>,
    state: Arc<RwLock<SessionState>>,
    events_tx: broadcast::Sender<SessionEvent>,
    manifest: Arc<ChainManifest>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => event,
        };

        match event {
            Ok(WalletEvent::AccountsChanged(accounts)) => {
                {
                    let mut state = state.write().await;
                    state.current_account = accounts.first().copied();
                    state.accounts = accounts.clone();
                }
                debug!(count = accounts.len(), "wallet accounts changed");
                let _ = events_tx.send(SessionEvent::AccountsChanged(accounts));
            }
            Ok(WalletEvent::ChainChanged(chain_id)) => {
                apply_network(&state, &events_tx, chain_id, &manifest).await;
            }
            Ok(WalletEvent::Disconnect) => {
                state.write().await.clear();
                info!("wallet reported disconnect");
                let _ = events_tx.send(SessionEvent::Disconnected);
                break;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("wallet event listener lagged by {n} events");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("wallet event channel closed");
                break;
            }
        }
    }
}

/// Record a new chain for a connected session, emitting an event on change.
async fn apply_network(
    state: &RwLock<SessionState>,
    events_tx: &broadcast::Sender<SessionEvent>,
    chain_id: u64,
    manifest: &ChainManifest,
) {
    let network = Network {
        chain_id,
        name: manifest.name_of(chain_id),
    };

    {
        let mut state = state.write().await;
        if state.current_account.is_none() {
            return;
        }
        if state.network.as_ref() == Some(&network) {
            return;
        }
        state.network = Some(network.clone());
    }

    info!(chain_id, network = %network.name, "wallet network changed");
    let _ = events_tx.send(SessionEvent::NetworkChanged(network));
}
