//! Rental orchestrator: the one owner of workflow mode, fleet snapshot,
//! and displayed balance.
//!
//! Every operation follows the same shape: validate local preconditions
//! (never sent to a ledger), issue the change call, re-read the affected
//! bike regardless of the outcome, and surface any failure verbatim. No
//! failure is retried and none is fatal; the mode always settles back to
//! `Home` (or stays at `Registration` for a failed registration).

use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::fleet::{FleetReader, FleetSnapshot};
use crate::gateway::{
    AccountId, Amount, CallOptions, FleetGateway, TokenGateway, ONE_YOCTO, STORAGE_DEPOSIT_AMOUNT,
};
use crate::session::Session;

/// Which mutating workflow holds the single-flight lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowKind {
    Inspect,
    Return,
    Register,
}

impl WorkflowKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Inspect => "inspect",
            Self::Return => "return",
            Self::Register => "register",
        }
    }
}

/// Rendering/workflow mode. Owned exclusively by the orchestrator; the
/// rendering layer reads it and nothing else writes it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowMode {
    SignIn,
    Registration,
    Home,
    TransactionInFlight {
        kind: WorkflowKind,
        index: Option<usize>,
    },
}

/// Usage fee, read once at startup and cached for the process lifetime.
/// A mid-session fee change on the ledger is validated against stale data;
/// the ledger still enforces the real amount.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RentalFeeConfig {
    pub amount_to_use_bike: Amount,
}

/// Display-only balance record for the balance-check panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenAccount {
    pub account_id: AccountId,
    pub balance: Amount,
}

pub struct Orchestrator {
    fleet: Arc<dyn FleetGateway>,
    token: Arc<dyn TokenGateway>,
    session: Session,
    reader: FleetReader,
    fleet_contract: AccountId,
    fee: RentalFeeConfig,
    mode: WorkflowMode,
    snapshot: FleetSnapshot,
    balance_display: Option<TokenAccount>,
}

impl Orchestrator {
    /// Resolves the initial mode, caches the fee, and builds the first
    /// full fleet snapshot.
    pub async fn start(
        fleet: Arc<dyn FleetGateway>,
        token: Arc<dyn TokenGateway>,
        session: Session,
        config: &ClientConfig,
    ) -> Result<Self, ClientError> {
        let reader = FleetReader::new(Arc::clone(&fleet));
        let fee = RentalFeeConfig {
            amount_to_use_bike: fleet.amount_to_use_bike().await?,
        };
        let snapshot = reader.read_all().await?;
        let mode = match session.account_id() {
            None => WorkflowMode::SignIn,
            Some(account) => {
                if session.is_registered(token.as_ref(), &account).await? {
                    WorkflowMode::Home
                } else {
                    WorkflowMode::Registration
                }
            }
        };
        Ok(Self {
            fleet,
            token,
            session,
            reader,
            fleet_contract: config.fleet_contract.clone(),
            fee,
            mode,
            snapshot,
            balance_display: None,
        })
    }

    // read-only projection toward the rendering layer

    pub fn mode(&self) -> &WorkflowMode {
        &self.mode
    }

    pub fn snapshot(&self) -> &FleetSnapshot {
        &self.snapshot
    }

    pub fn fee(&self) -> RentalFeeConfig {
        self.fee
    }

    pub fn displayed_balance(&self) -> Option<&TokenAccount> {
        self.balance_display.as_ref()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn fleet_contract(&self) -> &AccountId {
        &self.fleet_contract
    }

    /// Takes the single-flight lock, or reports who holds it.
    fn acquire(&mut self, kind: WorkflowKind, index: Option<usize>) -> Result<(), ClientError> {
        if let WorkflowMode::TransactionInFlight { kind: held, .. } = &self.mode {
            return Err(ClientError::WorkflowBusy(held.name()));
        }
        self.mode = WorkflowMode::TransactionInFlight { kind, index };
        Ok(())
    }

    /// Pay-to-use: one transfer call carrying the bike index as payload.
    /// The fleet ledger authorizes usage as its reaction to the incoming
    /// transfer; the client sees only the transfer result and re-reads the
    /// bike to learn the joint outcome.
    ///
    /// Unlike inspect/return, this does not take the single-flight lock:
    /// the client awaits exactly one call here and never observes the
    /// ledger-side reaction, so there is no second step to bracket.
    pub async fn use_bike(&mut self, index: usize) -> Result<(), ClientError> {
        let signer = self.session.signer()?;
        // registration is assumed stable once granted; only the cached
        // gate is consulted, no re-read
        if self.mode == WorkflowMode::Registration {
            return Err(ClientError::NotRegistered(signer));
        }
        let balance = self.token.ft_balance_of(&signer).await?;
        let required = self.fee.amount_to_use_bike;
        if balance < required {
            return Err(ClientError::InsufficientFunds { balance, required });
        }
        let result = self
            .token
            .ft_transfer_call(
                &signer,
                &self.fleet_contract,
                required,
                &index.to_string(),
                CallOptions::with_deposit(ONE_YOCTO),
            )
            .await;
        // re-read regardless: the transfer may have landed even if the
        // call came back as a failure
        let refreshed = self.reader.refresh(&mut self.snapshot, index).await;
        result?;
        refreshed
    }

    /// Marks a bike as under inspection by the signer.
    pub async fn inspect_bike(&mut self, index: usize) -> Result<(), ClientError> {
        let signer = self.session.signer()?;
        self.acquire(WorkflowKind::Inspect, Some(index))?;
        let result = self
            .fleet
            .inspect_bike(&signer, index, CallOptions::default())
            .await;
        let refreshed = self.reader.refresh(&mut self.snapshot, index).await;
        self.mode = WorkflowMode::Home;
        result?;
        refreshed
    }

    /// Returns a bike the signer is using or inspecting.
    pub async fn return_bike(&mut self, index: usize) -> Result<(), ClientError> {
        let signer = self.session.signer()?;
        self.acquire(WorkflowKind::Return, Some(index))?;
        let result = self
            .fleet
            .return_bike(&signer, index, CallOptions::default())
            .await;
        let refreshed = self.reader.refresh(&mut self.snapshot, index).await;
        self.mode = WorkflowMode::Home;
        result?;
        refreshed
    }

    /// Registers the signer with the token ledger by depositing the fixed
    /// storage amount. Success is taken at face value: the mode moves to
    /// `Home` without reading the registration back.
    pub async fn register(&mut self) -> Result<(), ClientError> {
        let signer = self.session.signer()?;
        let prior = self.mode.clone();
        self.acquire(WorkflowKind::Register, None)?;
        let result = self
            .token
            .storage_deposit(&signer, CallOptions::with_deposit(STORAGE_DEPOSIT_AMOUNT))
            .await;
        match result {
            Ok(()) => {
                self.mode = WorkflowMode::Home;
                Ok(())
            }
            Err(err) => {
                self.mode = prior;
                Err(err)
            }
        }
    }

    /// Force-unregisters the signer, burning any remaining balance. The
    /// ledger is the only gate; no local precondition beyond sign-in.
    pub async fn unregister(&mut self) -> Result<(), ClientError> {
        let signer = self.session.signer()?;
        self.token
            .storage_unregister(&signer, true, CallOptions::with_deposit(ONE_YOCTO))
            .await
    }

    /// Peer-to-peer token transfer. No local balance check: the ledger
    /// enforces sufficiency and its rejection is surfaced verbatim.
    pub async fn transfer(
        &mut self,
        receiver: &AccountId,
        amount: Amount,
    ) -> Result<(), ClientError> {
        let signer = self.session.signer()?;
        self.token
            .ft_transfer(&signer, receiver, amount, CallOptions::with_deposit(ONE_YOCTO))
            .await
    }

    /// Pure read; safe for any account string, including accounts the
    /// ledger has never seen (those report a zero balance). Updates the
    /// display-only record.
    pub async fn check_balance(&mut self, account: &AccountId) -> Result<TokenAccount, ClientError> {
        let balance = self.token.ft_balance_of(account).await?;
        let record = TokenAccount {
            account_id: account.clone(),
            balance,
        };
        self.balance_display = Some(record.clone());
        Ok(record)
    }

    /// Ends the wallet session and drops back to the sign-in screen.
    pub fn sign_out(&mut self) {
        self.session.sign_out();
        self.mode = WorkflowMode::SignIn;
    }
}
