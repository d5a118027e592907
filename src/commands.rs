use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use lootbox::chains::parse_chain_id;
use lootbox::{
    ApprovalPolicy, ChainManifest, DepositForm, DepositOutcome, Eip1193, Erc20, LocalWallet,
    LootboxClient, LootboxConfig, NoWallet, PendingTx, ProviderCache, WalletSession,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{BalanceArgs, DepositArgs, FlushArgs, MaxTicketsArgs, SwitchNetworkArgs};
use crate::error::CliError;
use crate::output::Output;

/// Everything a command needs, resolved from flags and the environment.
pub struct Context {
    pub manifest: Arc<ChainManifest>,
    pub chain_id: u64,
    pub lootbox: Option<String>,
    pub provider_cache: Option<PathBuf>,
    pub out: Output,
    pub cancel: CancellationToken,
}

impl Context {
    /// The signing wallet from `PRIVATE_KEY`, or a disconnected stand-in.
    fn wallet(&self) -> Result<Arc<dyn Eip1193>, CliError> {
        match std::env::var("PRIVATE_KEY") {
            Ok(key) => Ok(Arc::new(LocalWallet::from_private_key(
                &key,
                &self.manifest,
                self.chain_id,
            )?)),
            Err(_) => Ok(Arc::new(NoWallet)),
        }
    }

    fn signing_wallet(&self) -> Result<Arc<dyn Eip1193>, CliError> {
        if std::env::var("PRIVATE_KEY").is_err() {
            return Err(CliError::MissingPrivateKey);
        }
        self.wallet()
    }

    fn cache(&self) -> ProviderCache {
        self.provider_cache
            .clone()
            .map(ProviderCache::file)
            .unwrap_or_default()
    }

    fn session(&self, wallet: Arc<dyn Eip1193>) -> Arc<WalletSession> {
        Arc::new(WalletSession::new(wallet, Arc::clone(&self.manifest), self.cache()))
    }

    fn client(&self, wallet: Arc<dyn Eip1193>, approval: ApprovalPolicy) -> Result<LootboxClient, CliError> {
        let raw = self.lootbox.as_deref().ok_or(CliError::MissingLootbox)?;
        let mut config = LootboxConfig::new(parse_address(raw)?, self.chain_id);
        config.approval = approval;
        config.provider_cache = self.provider_cache.clone();
        Ok(LootboxClient::with_manifest(config, Arc::clone(&self.manifest), wallet)?)
    }

    /// Run `fut` unless a shutdown signal arrives first.
    async fn cancellable<T>(&self, fut: impl std::future::Future<Output = T>) -> Result<T, CliError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(CliError::Cancelled),
            value = fut => Ok(value),
        }
    }

    async fn confirm(&self, label: &str, pending: PendingTx) -> Result<(), CliError> {
        info!(tx = %pending.hash(), "{label} submitted, waiting for confirmation");
        let confirmation = self.cancellable(pending.wait()).await??;
        self.out.submitted(&mut std::io::stdout(), label, &confirmation)?;
        Ok(())
    }
}

fn parse_address(raw: &str) -> Result<Address, CliError> {
    raw.trim()
        .parse()
        .map_err(|_| CliError::InvalidAddress(raw.to_string()))
}

pub fn chains(ctx: &Context) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    for chain in ctx.manifest.iter() {
        ctx.out.chain(&mut stdout, chain)?;
    }
    Ok(())
}

pub async fn balance(ctx: &Context, args: BalanceArgs) -> Result<(), CliError> {
    let session = ctx.session(ctx.wallet()?);
    let owner = match args.address.as_deref() {
        Some(raw) => parse_address(raw)?,
        None => ctx
            .cancellable(session.connect_wallet())
            .await?
            .ok_or(CliError::NoAccount)?,
    };
    let tokens = Erc20::new(&ctx.manifest, ctx.chain_id, session);

    let (symbol, raw, amount) = match args.token.as_deref() {
        Some(token) => {
            let token = parse_address(token)?;
            let raw = tokens.get_balance(token, Some(owner)).await?;
            let symbol = tokens.get_symbol(token).await?;
            let amount = tokens.format_amount(raw, Some(token)).await?;
            (symbol, raw, amount)
        }
        None => {
            let raw = tokens.get_native_balance(Some(owner)).await?;
            let symbol = ctx
                .manifest
                .get(ctx.chain_id)
                .map(|c| c.native_currency.symbol.clone())
                .unwrap_or_else(|| "ETH".to_string());
            (symbol, raw, tokens.format_amount(raw, None).await?)
        }
    };

    ctx.out
        .balance(&mut std::io::stdout(), owner, &symbol, &amount, raw)?;
    Ok(())
}

pub async fn deposits(ctx: &Context) -> Result<(), CliError> {
    let client = ctx.client(ctx.wallet()?, ApprovalPolicy::default())?;
    let records = ctx
        .cancellable(client.lootbox.try_get_lootbox_deposits())
        .await??;

    let mut stdout = std::io::stdout().lock();
    for record in &records {
        ctx.out.deposit(&mut stdout, record)?;
    }
    info!(count = records.len(), "deposits listed");
    Ok(())
}

pub async fn deposit(ctx: &Context, args: DepositArgs) -> Result<(), CliError> {
    let policy = if args.exact_approval {
        ApprovalPolicy::Exact
    } else {
        ApprovalPolicy::Unlimited
    };
    let client = ctx.client(ctx.signing_wallet()?, policy)?;
    ctx.cancellable(client.connect()).await??;

    let form = match args.token {
        Some(token) => DepositForm::erc20(token, args.amount),
        None => DepositForm::native(args.amount),
    };
    let flow = client.deposit_flow();
    let mut phases = flow.phases();
    let submit = flow.submit(&form);
    tokio::pin!(submit);

    let result = loop {
        tokio::select! {
            _ = ctx.cancel.cancelled() => return Err(CliError::Cancelled),
            result = &mut submit => break result,
            Ok(()) = phases.changed() => {
                let phase = phases.borrow_and_update().clone();
                ctx.out.phase(&mut std::io::stdout(), &phase)?;
            }
        }
    };

    if phases.has_changed().unwrap_or(false) {
        let phase = phases.borrow_and_update().clone();
        ctx.out.phase(&mut std::io::stdout(), &phase)?;
    }

    match result? {
        DepositOutcome::Deposited { deposit, .. } => {
            ctx.out.submitted(&mut std::io::stdout(), "deposit", &deposit)?;
        }
        DepositOutcome::Cancelled => warn!("deposit cancelled in wallet"),
    }
    Ok(())
}

pub async fn switch_network(ctx: &Context, args: SwitchNetworkArgs) -> Result<(), CliError> {
    let target = parse_chain_id(&args.chain)?;
    let session = ctx.session(ctx.signing_wallet()?);
    let account = ctx.cancellable(session.connect_wallet()).await?;
    if account.is_none() {
        return Err(lootbox::LootboxError::NotConnected.into());
    }

    ctx.cancellable(session.switch_network(target)).await?;

    let network = session.network().await;
    if network.as_ref().map(|n| n.chain_id) != Some(target) {
        warn!(target, "wallet did not switch");
    }
    ctx.out
        .network(&mut std::io::stdout(), account, network.as_ref())?;
    Ok(())
}

pub async fn max_tickets(ctx: &Context, args: MaxTicketsArgs) -> Result<(), CliError> {
    let Some(value) = args.value else {
        let client = ctx.client(ctx.wallet()?, ApprovalPolicy::default())?;
        let current = ctx.cancellable(client.lootbox.get_max_tickets()).await??;
        ctx.out.value(&mut std::io::stdout(), "maxTickets", current)?;
        return Ok(());
    };

    let client = ctx.client(ctx.signing_wallet()?, ApprovalPolicy::default())?;
    ctx.cancellable(client.connect()).await??;
    let pending = client.lootbox.change_max_tickets(U256::from(value)).await?;
    ctx.confirm("change_max_tickets", pending).await
}

pub async fn flush(ctx: &Context, args: FlushArgs) -> Result<(), CliError> {
    let to = args.to.as_deref().map(parse_address).transpose()?;
    let client = ctx.client(ctx.signing_wallet()?, ApprovalPolicy::default())?;
    ctx.cancellable(client.connect()).await??;
    let pending = client.lootbox.flush_tokens(to).await?;
    ctx.confirm("flush", pending).await
}
