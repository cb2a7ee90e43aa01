//! Snapshot reconstruction for the fleet.
//!
//! The fleet ledger has no atomic multi-field read. A [`BikeSnapshot`] is
//! the pointwise combination of three independent view calls and is valid
//! only at the instant of the slowest of them; a use-transaction committing
//! between two reads can surface `available == true` alongside a user.
//! Treat every snapshot as advisory and re-read before decisions that
//! matter — never as a commit point.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::gateway::{AccountId, FleetGateway};

/// One bike, as last observed. `available` is true iff the ledger held the
/// bike in its available state when that particular call was served.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BikeSnapshot {
    pub available: bool,
    pub user: Option<AccountId>,
    pub inspector: Option<AccountId>,
}

impl BikeSnapshot {
    pub fn usable(&self) -> bool {
        self.available
    }

    pub fn inspectable(&self) -> bool {
        self.available
    }

    /// Return is offered only to the account currently holding the bike.
    pub fn returnable_by(&self, viewer: &AccountId) -> bool {
        self.user.as_deref() == Some(viewer.as_str())
            || self.inspector.as_deref() == Some(viewer.as_str())
    }
}

/// Index-aligned snapshots for the whole fleet. Entries are replaced,
/// never removed; the fleet size is fixed for the session.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FleetSnapshot {
    bikes: Vec<BikeSnapshot>,
}

impl FleetSnapshot {
    pub fn len(&self) -> usize {
        self.bikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bikes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BikeSnapshot> {
        self.bikes.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BikeSnapshot> {
        self.bikes.iter()
    }
}

/// Reads bikes from the fleet gateway and keeps a [`FleetSnapshot`] current.
pub struct FleetReader {
    gateway: Arc<dyn FleetGateway>,
}

impl FleetReader {
    pub fn new(gateway: Arc<dyn FleetGateway>) -> Self {
        Self { gateway }
    }

    /// Three independent view calls, combined pointwise. No skew detection
    /// or repair; a failed call fails the whole triple, and retrying is the
    /// caller's decision.
    pub async fn read(&self, index: usize) -> Result<BikeSnapshot, ClientError> {
        let available = self.gateway.is_available(index).await?;
        let user = self.gateway.who_is_using(index).await?;
        let inspector = self.gateway.who_is_inspecting(index).await?;
        Ok(BikeSnapshot {
            available,
            user,
            inspector,
        })
    }

    /// Reads the fleet size once, then every bike. Per-bike reads are
    /// issued concurrently; completion order is unconstrained and the
    /// result is ordered by index regardless.
    pub async fn read_all(&self) -> Result<FleetSnapshot, ClientError> {
        let size = self.gateway.num_of_bikes().await?;
        let bikes = try_join_all((0..size).map(|index| self.read(index))).await?;
        Ok(FleetSnapshot { bikes })
    }

    /// Re-reads one bike and replaces only that entry, leaving the rest of
    /// the snapshot untouched. A failed read (including an index the ledger
    /// rejects as out of range) propagates before the snapshot is touched;
    /// the bounds guard only covers a snapshot shorter than the ledger.
    pub async fn refresh(
        &self,
        snapshot: &mut FleetSnapshot,
        index: usize,
    ) -> Result<(), ClientError> {
        let bike = self.read(index).await?;
        if let Some(slot) = snapshot.bikes.get_mut(index) {
            *slot = bike;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::{InMemoryLedgers, DEFAULT_USAGE_FEE};
    use crate::gateway::{CallOptions, ONE_YOCTO};

    fn two_bike_world() -> InMemoryLedgers {
        let ledgers = InMemoryLedgers::new("fleet.testnet", 2, DEFAULT_USAGE_FEE);
        ledgers.register_with_balance("alice.testnet", 100);
        ledgers
    }

    #[tokio::test]
    async fn snapshot_matches_ledger_state_by_index() {
        let ledgers = two_bike_world();
        let token = ledgers.token_gateway();
        let alice = "alice.testnet".to_string();
        token
            .ft_transfer_call(
                &alice,
                &"fleet.testnet".to_string(),
                DEFAULT_USAGE_FEE,
                "1",
                CallOptions::with_deposit(ONE_YOCTO),
            )
            .await
            .unwrap();

        let reader = FleetReader::new(ledgers.fleet_gateway());
        let snapshot = reader.read_all().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get(0).unwrap().available);
        assert_eq!(snapshot.get(0).unwrap().user, None);
        let rented = snapshot.get(1).unwrap();
        assert!(!rented.available);
        assert_eq!(rented.user.as_deref(), Some("alice.testnet"));
        assert_eq!(rented.inspector, None);
    }

    #[tokio::test]
    async fn bulk_and_single_reads_agree() {
        let ledgers = two_bike_world();
        let fleet = ledgers.fleet_gateway();
        let alice = "alice.testnet".to_string();
        fleet
            .inspect_bike(&alice, 0, CallOptions::default())
            .await
            .unwrap();

        let reader = FleetReader::new(fleet);
        let snapshot = reader.read_all().await.unwrap();
        for index in 0..snapshot.len() {
            assert_eq!(
                snapshot.get(index).unwrap(),
                &reader.read(index).await.unwrap()
            );
        }
    }

    #[tokio::test]
    async fn refresh_replaces_only_the_target_entry() {
        let ledgers = two_bike_world();
        let fleet = ledgers.fleet_gateway();
        let reader = FleetReader::new(fleet.clone());
        let mut snapshot = reader.read_all().await.unwrap();

        let alice = "alice.testnet".to_string();
        fleet
            .inspect_bike(&alice, 0, CallOptions::default())
            .await
            .unwrap();
        fleet
            .inspect_bike(&alice, 1, CallOptions::default())
            .await
            .unwrap();

        reader.refresh(&mut snapshot, 1).await.unwrap();
        // entry 0 is stale by design: only the touched index is re-read
        assert!(snapshot.get(0).unwrap().available);
        assert_eq!(
            snapshot.get(1).unwrap().inspector.as_deref(),
            Some("alice.testnet")
        );

        // out-of-range refresh reads but changes nothing
        reader.refresh(&mut snapshot, 9).await.unwrap_err();
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn projection_follows_the_viewer() {
        let bike = BikeSnapshot {
            available: false,
            user: Some("alice.testnet".into()),
            inspector: None,
        };
        assert!(!bike.usable());
        assert!(!bike.inspectable());
        assert!(bike.returnable_by(&"alice.testnet".to_string()));
        assert!(!bike.returnable_by(&"bob.testnet".to_string()));
    }
}
