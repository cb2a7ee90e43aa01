//! Client core for a shared bike fleet whose authoritative state lives on
//! two independent remote ledgers: a fleet ledger (availability, usage,
//! inspection) and a token ledger (fungible balances and storage
//! registration).
//!
//! The client keeps nothing durable. Every fact is fetched on demand and
//! recombined locally:
//!
//! * [`gateway`] — the view/change contracts of both ledgers, plus
//!   in-memory reference ledgers for tests and demos.
//! * [`session`] — the wallet session and the storage-registration check.
//! * [`fleet`] — snapshot reconstruction from independent view calls.
//! * [`orchestrator`] — precondition gating, change-call sequencing, and
//!   the single-flight workflow mode.
//! * [`config`] — network and contract-account configuration.
//!
//! The reads are not atomic and the two ledgers share no transaction, so
//! snapshots are advisory by construction; the orchestrator re-reads any
//! bike an action touched, whatever the outcome, and leaves true mutual
//! exclusion to the ledgers.

pub mod config;
pub mod fleet;
pub mod gateway;
pub mod orchestrator;
pub mod session;

mod error;

pub use error::ClientError;
