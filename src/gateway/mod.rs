//! Collaborator contracts for the two remote ledgers.
//!
//! The client never holds authoritative state; everything it knows about a
//! bike or a balance comes through these traits. View calls are free and
//! side-effect-free. Change calls require a signer, cost gas, and report
//! success or failure only — no intermediate progress is observable, and an
//! issued call cannot be aborted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub mod memory;

pub type AccountId = String;
pub type Amount = u128;
pub type Gas = u64;

pub type GatewayResult<T> = Result<T, ClientError>;

/// Default gas budget attached to change calls (300 Tgas).
pub const DEFAULT_GAS: Gas = 300_000_000_000_000;

/// Deposit attached to `storage_deposit` when registering an account.
pub const STORAGE_DEPOSIT_AMOUNT: Amount = 1_250_000_000_000_000_000_000;

/// One-yocto security deposit required by transfer-class change calls.
pub const ONE_YOCTO: Amount = 1;

/// Gas budget and attached deposit for one change call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallOptions {
    pub gas: Gas,
    pub deposit: Amount,
}

impl CallOptions {
    pub const fn with_deposit(deposit: Amount) -> Self {
        Self {
            gas: DEFAULT_GAS,
            deposit,
        }
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::with_deposit(0)
    }
}

/// Storage registration record returned by `storage_balance_of`.
/// A `None` record means the account is not registered.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageBalance {
    pub total: Amount,
    pub available: Amount,
}

/// Fleet ledger: bike availability, usage, and inspection.
#[async_trait]
pub trait FleetGateway: Send + Sync {
    // view calls
    async fn num_of_bikes(&self) -> GatewayResult<usize>;
    async fn is_available(&self, index: usize) -> GatewayResult<bool>;
    async fn who_is_using(&self, index: usize) -> GatewayResult<Option<AccountId>>;
    async fn who_is_inspecting(&self, index: usize) -> GatewayResult<Option<AccountId>>;
    async fn amount_to_use_bike(&self) -> GatewayResult<Amount>;

    // change calls
    async fn inspect_bike(
        &self,
        signer: &AccountId,
        index: usize,
        opts: CallOptions,
    ) -> GatewayResult<()>;
    async fn return_bike(
        &self,
        signer: &AccountId,
        index: usize,
        opts: CallOptions,
    ) -> GatewayResult<()>;
}

/// Token ledger: fungible balances and storage registration.
#[async_trait]
pub trait TokenGateway: Send + Sync {
    // view calls
    async fn ft_balance_of(&self, account: &AccountId) -> GatewayResult<Amount>;
    async fn storage_balance_of(
        &self,
        account: &AccountId,
    ) -> GatewayResult<Option<StorageBalance>>;

    // change calls
    async fn storage_deposit(&self, signer: &AccountId, opts: CallOptions) -> GatewayResult<()>;
    async fn storage_unregister(
        &self,
        signer: &AccountId,
        force: bool,
        opts: CallOptions,
    ) -> GatewayResult<()>;
    async fn ft_transfer(
        &self,
        signer: &AccountId,
        receiver: &AccountId,
        amount: Amount,
        opts: CallOptions,
    ) -> GatewayResult<()>;

    /// Transfer with a payload the receiving ledger reacts to. The client
    /// learns only the outcome of the transfer call itself; the receiver's
    /// reaction is a second, unobserved ledger-side step.
    async fn ft_transfer_call(
        &self,
        signer: &AccountId,
        receiver: &AccountId,
        amount: Amount,
        msg: &str,
        opts: CallOptions,
    ) -> GatewayResult<()>;
}
