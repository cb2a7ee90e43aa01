//! Client configuration: which network to talk to and where the two
//! ledger contracts live. Loadable from a JSON file, with a testnet
//! default for out-of-the-box runs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::gateway::AccountId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    pub network_id: String,
    pub node_url: String,
    /// Account of the fleet contract; also the receiver of usage fees.
    pub fleet_contract: AccountId,
    /// Account of the fungible token contract.
    pub token_contract: AccountId,
}

impl ClientConfig {
    pub fn testnet() -> Self {
        Self {
            network_id: "testnet".into(),
            node_url: "https://rpc.testnet.example.org".into(),
            fleet_contract: "fleet.testnet".into(),
            token_contract: "ft.fleet.testnet".into(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::testnet()
    }
}
