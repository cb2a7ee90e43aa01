//! Wallet session and the derived registration fact.

use std::sync::{Arc, Mutex};

use crate::error::ClientError;
use crate::gateway::{AccountId, TokenGateway};

/// Wallet collaborator. Key management and the sign-in flow live outside
/// the client; this is the slice of it the orchestrator consumes.
pub trait Wallet: Send + Sync {
    fn is_signed_in(&self) -> bool;
    /// The ambient account identifier, if a session is active.
    fn account_id(&self) -> Option<AccountId>;
    /// Begins a session as `account`, replacing any existing one.
    fn sign_in(&self, account: AccountId);
    fn sign_out(&self);
}

/// Wallet stub holding the session in process memory. Used by tests and
/// the demo shell.
#[derive(Default)]
pub struct MemoryWallet {
    account: Mutex<Option<AccountId>>,
}

impl MemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(account: impl Into<AccountId>) -> Self {
        Self {
            account: Mutex::new(Some(account.into())),
        }
    }
}

impl Wallet for MemoryWallet {
    fn is_signed_in(&self) -> bool {
        self.account
            .lock()
            .expect("wallet session poisoned")
            .is_some()
    }

    fn account_id(&self) -> Option<AccountId> {
        self.account.lock().expect("wallet session poisoned").clone()
    }

    fn sign_in(&self, account: AccountId) {
        *self.account.lock().expect("wallet session poisoned") = Some(account);
    }

    fn sign_out(&self) {
        *self.account.lock().expect("wallet session poisoned") = None;
    }
}

/// Session model: the signed-in flag is local and cheap; the registration
/// fact is one token ledger view call and is never cached, because
/// registration can change exogenously between checks.
pub struct Session {
    wallet: Arc<dyn Wallet>,
}

impl Session {
    pub fn new(wallet: Arc<dyn Wallet>) -> Self {
        Self { wallet }
    }

    pub fn is_signed_in(&self) -> bool {
        self.wallet.is_signed_in()
    }

    pub fn account_id(&self) -> Option<AccountId> {
        self.wallet.account_id()
    }

    /// The account to sign change calls with, or `NotSignedIn`.
    pub fn signer(&self) -> Result<AccountId, ClientError> {
        self.wallet.account_id().ok_or(ClientError::NotSignedIn)
    }

    pub fn sign_in(&self, account: AccountId) {
        self.wallet.sign_in(account);
    }

    pub fn sign_out(&self) {
        self.wallet.sign_out();
    }

    /// Registered iff the account holds a storage balance record.
    pub async fn is_registered(
        &self,
        token: &dyn TokenGateway,
        account: &AccountId,
    ) -> Result<bool, ClientError> {
        Ok(token.storage_balance_of(account).await?.is_some())
    }
}
