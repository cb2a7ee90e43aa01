use thiserror::Error;

/// Canonical error type exposed by the rental client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure: a view or change call never returned.
    /// The remote effect, if any, is unknown until the next read.
    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Structured rejection from a ledger: unauthorized signer, on-ledger
    /// balance check, bad bike state. Surfaced verbatim.
    #[error("rejected by ledger: {0}")]
    RejectedByLedger(String),

    /// Local precondition failure: the usage fee exceeds the account
    /// balance. No remote call was made.
    #[error("insufficient funds: balance {balance} is below the usage fee {required}")]
    InsufficientFunds { balance: u128, required: u128 },

    /// The account holds no storage registration on the token ledger.
    #[error("account {0} is not registered with the token ledger")]
    NotRegistered(String),

    /// The operation needs a signed-in wallet session.
    #[error("no account is signed in")]
    NotSignedIn,

    /// Another mutating workflow already holds the single-flight lock.
    #[error("a {0} transaction is already in flight")]
    WorkflowBusy(&'static str),
}
