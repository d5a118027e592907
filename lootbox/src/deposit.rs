//! Reward deposit flow.
//!
//! Drives one deposit through validation, balance check, optional approval and
//! the deposit itself, publishing the current [`DepositPhase`] on a watch
//! channel:
//!
//! ```text
//! Idle -> ValidatingInput -> CheckingBalance
//!   native: -> SubmittingDeposit -> AwaitingDepositConfirmation -> Success
//!   erc20:  -> CheckingAllowance [-> ApprovingAllowance -> AwaitingApprovalConfirmation]
//!              -> SubmittingDeposit -> AwaitingDepositConfirmation -> Success
//! any step -> Failed(message)      user rejection in the wallet -> Idle
//! ```
//!
//! Chain access goes through [`DepositBackend`], implemented by
//! [`Lootbox`](crate::lootbox::Lootbox).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{LootboxError, Result};
use crate::tx::{Confirmation, PendingTx};
use crate::types::RewardType;
use crate::units::{parse_units, NATIVE_DECIMALS};

/// How much allowance to request when the current one is too small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalPolicy {
    /// Approve `U256::MAX` once so later deposits skip the approval step.
    #[default]
    Unlimited,
    /// Approve exactly the amount being deposited.
    Exact,
}

impl ApprovalPolicy {
    pub fn approval_amount(self, amount: U256) -> U256 {
        match self {
            ApprovalPolicy::Unlimited => U256::MAX,
            ApprovalPolicy::Exact => amount,
        }
    }
}

/// Raw user input for one deposit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DepositForm {
    pub reward_type: RewardType,
    /// Human amount, e.g. `"1.5"`.
    pub amount: String,
    /// Required for ERC-20 rewards.
    pub token_address: Option<String>,
}

impl DepositForm {
    pub fn native(amount: impl Into<String>) -> Self {
        Self {
            reward_type: RewardType::Native,
            amount: amount.into(),
            token_address: None,
        }
    }

    pub fn erc20(token_address: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            reward_type: RewardType::Erc20,
            amount: amount.into(),
            token_address: Some(token_address.into()),
        }
    }
}

/// A validated deposit, amounts in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardDepositRequest {
    pub reward_type: RewardType,
    pub amount: U256,
    pub token: Option<Address>,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DepositPhase {
    #[default]
    Idle,
    ValidatingInput,
    CheckingBalance,
    CheckingAllowance,
    ApprovingAllowance,
    AwaitingApprovalConfirmation,
    SubmittingDeposit,
    AwaitingDepositConfirmation,
    Success(Confirmation),
    Failed(String),
}

impl DepositPhase {
    /// Whether a submission is running (the form shows a spinner).
    pub fn is_loading(&self) -> bool {
        !matches!(
            self,
            DepositPhase::Idle | DepositPhase::Success(_) | DepositPhase::Failed(_)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DepositPhase::Success(_) | DepositPhase::Failed(_))
    }
}

impl fmt::Display for DepositPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepositPhase::Idle => f.write_str("idle"),
            DepositPhase::ValidatingInput => f.write_str("validating input"),
            DepositPhase::CheckingBalance => f.write_str("checking balance"),
            DepositPhase::CheckingAllowance => f.write_str("checking allowance"),
            DepositPhase::ApprovingAllowance => f.write_str("approving allowance"),
            DepositPhase::AwaitingApprovalConfirmation => {
                f.write_str("waiting for approval confirmation")
            }
            DepositPhase::SubmittingDeposit => f.write_str("submitting deposit"),
            DepositPhase::AwaitingDepositConfirmation => {
                f.write_str("waiting for deposit confirmation")
            }
            DepositPhase::Success(c) => write!(f, "deposited in {}", c.tx_hash),
            DepositPhase::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositOutcome {
    Deposited {
        request: RewardDepositRequest,
        approval: Option<Confirmation>,
        deposit: Confirmation,
    },
    /// The user rejected a wallet prompt; nothing was deposited.
    Cancelled,
}

/// Chain operations the deposit flow needs.
#[async_trait]
pub trait DepositBackend: Send + Sync {
    /// Connected account, `None` without a wallet session.
    async fn account(&self) -> Option<Address>;

    /// Contract that receives deposits and needs the ERC-20 allowance.
    fn spender(&self) -> Address;

    async fn native_balance(&self, owner: Address) -> Result<U256>;
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;
    async fn token_decimals(&self, token: Address) -> Result<u8>;
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;
    async fn approve(&self, token: Address, spender: Address, amount: U256) -> Result<PendingTx>;
    async fn deposit_native(&self, amount: U256) -> Result<PendingTx>;
    async fn deposit_erc20(&self, token: Address, amount: U256) -> Result<PendingTx>;
}

/// Resets the in-flight flag even if the submit future is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct DepositFlow<B: ?Sized> {
    backend: Arc<B>,
    policy: ApprovalPolicy,
    phase_tx: watch::Sender<DepositPhase>,
    in_flight: AtomicBool,
}

impl<B: DepositBackend + ?Sized> DepositFlow<B> {
    pub fn new(backend: Arc<B>, policy: ApprovalPolicy) -> Self {
        let (phase_tx, _) = watch::channel(DepositPhase::Idle);
        Self {
            backend,
            policy,
            phase_tx,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn policy(&self) -> ApprovalPolicy {
        self.policy
    }

    pub fn phase(&self) -> DepositPhase {
        self.phase_tx.borrow().clone()
    }

    /// Watch phase transitions.
    pub fn phases(&self) -> watch::Receiver<DepositPhase> {
        self.phase_tx.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run one deposit to completion.
    ///
    /// A wallet rejection resets the flow to `Idle` and returns
    /// `DepositOutcome::Cancelled`. Any other failure leaves the flow in
    /// `Failed` and is returned as the error. A second call while one is
    /// running fails with `LootboxError::FlowBusy`.
    pub async fn submit(&self, form: &DepositForm) -> Result<DepositOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LootboxError::FlowBusy);
        }
        let _guard = InFlight(&self.in_flight);

        match self.run(form).await {
            Ok(outcome) => {
                if let DepositOutcome::Deposited { deposit, .. } = &outcome {
                    info!(tx = %deposit.tx_hash, block = ?deposit.block_number, "reward deposited");
                    self.set_phase(DepositPhase::Success(*deposit));
                }
                Ok(outcome)
            }
            Err(e) if e.is_user_rejection() => {
                info!("deposit cancelled in wallet");
                self.set_phase(DepositPhase::Idle);
                Ok(DepositOutcome::Cancelled)
            }
            Err(e) => {
                warn!(error = %e, "deposit failed");
                self.set_phase(DepositPhase::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Clear a terminal phase back to `Idle`. No effect while running.
    pub fn reset(&self) {
        if !self.is_loading() {
            self.set_phase(DepositPhase::Idle);
        }
    }

    fn set_phase(&self, phase: DepositPhase) {
        debug!(%phase, "deposit phase");
        self.phase_tx.send_replace(phase);
    }

    async fn run(&self, form: &DepositForm) -> Result<DepositOutcome> {
        self.set_phase(DepositPhase::ValidatingInput);
        let owner = self.backend.account().await.ok_or(LootboxError::NotConnected)?;
        let request = self.validate(form).await?;

        self.set_phase(DepositPhase::CheckingBalance);
        let available = match request.token {
            None => self.backend.native_balance(owner).await?,
            Some(token) => self.backend.token_balance(token, owner).await?,
        };
        if available < request.amount {
            return Err(LootboxError::InsufficientBalance {
                required: request.amount,
                available,
            });
        }

        let (approval, pending) = match request.token {
            None => {
                self.set_phase(DepositPhase::SubmittingDeposit);
                (None, self.backend.deposit_native(request.amount).await?)
            }
            Some(token) => {
                let approval = self.ensure_allowance(owner, token, request.amount).await?;
                self.set_phase(DepositPhase::SubmittingDeposit);
                (approval, self.backend.deposit_erc20(token, request.amount).await?)
            }
        };

        self.set_phase(DepositPhase::AwaitingDepositConfirmation);
        let deposit = pending.wait().await?;
        Ok(DepositOutcome::Deposited {
            request,
            approval,
            deposit,
        })
    }

    async fn validate(&self, form: &DepositForm) -> Result<RewardDepositRequest> {
        let (token, decimals) = match form.reward_type {
            RewardType::Native => (None, NATIVE_DECIMALS),
            RewardType::Erc20 => {
                let token = parse_token_address(form.token_address.as_deref())?;
                (Some(token), self.backend.token_decimals(token).await?)
            }
        };

        let amount = parse_units(&form.amount, decimals)?;
        if amount.is_zero() {
            return Err(LootboxError::InvalidAmount(format!(
                "{} must be greater than zero",
                form.amount.trim()
            )));
        }

        Ok(RewardDepositRequest {
            reward_type: form.reward_type,
            amount,
            token,
            decimals,
        })
    }

    async fn ensure_allowance(
        &self,
        owner: Address,
        token: Address,
        amount: U256,
    ) -> Result<Option<Confirmation>> {
        self.set_phase(DepositPhase::CheckingAllowance);
        let spender = self.backend.spender();
        let allowance = self.backend.allowance(token, owner, spender).await?;
        if allowance >= amount {
            debug!(%token, %allowance, "allowance sufficient");
            return Ok(None);
        }

        self.set_phase(DepositPhase::ApprovingAllowance);
        let approve_amount = self.policy.approval_amount(amount);
        let pending = self.backend.approve(token, spender, approve_amount).await?;

        self.set_phase(DepositPhase::AwaitingApprovalConfirmation);
        let confirmation = pending.wait().await?;
        info!(%token, %spender, tx = %confirmation.tx_hash, "allowance approved");
        Ok(Some(confirmation))
    }
}

fn parse_token_address(raw: Option<&str>) -> Result<Address> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LootboxError::InvalidAddress("token address is required".into()))?;
    let token: Address = raw
        .parse()
        .map_err(|_| LootboxError::InvalidAddress(raw.to_string()))?;
    if token.is_zero() {
        return Err(LootboxError::InvalidAddress(raw.to_string()));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_policy_amounts() {
        let amount = U256::from(100u64);
        assert_eq!(ApprovalPolicy::Unlimited.approval_amount(amount), U256::MAX);
        assert_eq!(ApprovalPolicy::Exact.approval_amount(amount), amount);
        assert_eq!(ApprovalPolicy::default(), ApprovalPolicy::Unlimited);
    }

    #[test]
    fn test_phase_loading() {
        assert!(!DepositPhase::Idle.is_loading());
        assert!(DepositPhase::CheckingBalance.is_loading());
        assert!(DepositPhase::AwaitingApprovalConfirmation.is_loading());
        assert!(!DepositPhase::Failed("x".into()).is_loading());
        assert!(DepositPhase::Failed("x".into()).is_terminal());
    }

    #[test]
    fn test_parse_token_address() {
        assert!(matches!(
            parse_token_address(None),
            Err(LootboxError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_token_address(Some("  ")),
            Err(LootboxError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_token_address(Some("0x1234")),
            Err(LootboxError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_token_address(Some("0x0000000000000000000000000000000000000000")),
            Err(LootboxError::InvalidAddress(_))
        ));
        let token = parse_token_address(Some(" 0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266 ")).unwrap();
        assert_eq!(
            token,
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn test_form_constructors() {
        let form = DepositForm::erc20("0xabc", "10");
        assert_eq!(form.reward_type, RewardType::Erc20);
        assert_eq!(form.token_address.as_deref(), Some("0xabc"));
        assert_eq!(DepositForm::native("1").token_address, None);
    }
}
