//! In-memory reference ledgers.
//!
//! Both gateways share one [`LedgerWorld`]: the fleet ledger pays inspection
//! rewards out of the token ledger, and the token ledger delivers
//! `ft_transfer_call` payloads to the fleet ledger's transfer-received hook.
//! These back the test suite and the demo shell; real deployments plug an
//! RPC transport into the same traits instead.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::ClientError;
use crate::gateway::{
    AccountId, Amount, CallOptions, FleetGateway, GatewayResult, StorageBalance, TokenGateway,
    STORAGE_DEPOSIT_AMOUNT,
};

pub const DEFAULT_NUM_OF_BIKES: usize = 5;
pub const DEFAULT_USAGE_FEE: Amount = 30;
pub const INSPECTION_REWARD: Amount = 15;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Bike {
    Available,
    InUse(AccountId),
    Inspection(AccountId),
}

/// Everything the ledgers did, in order. Mirrors what a block explorer
/// would show; tests assert against it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    Inspected {
        index: usize,
        account: AccountId,
    },
    Returned {
        index: usize,
        account: AccountId,
    },
    UsageFeePaid {
        index: usize,
        account: AccountId,
        amount: Amount,
    },
    RewardPaid {
        account: AccountId,
        amount: Amount,
    },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
    Registered {
        account: AccountId,
    },
    Unregistered {
        account: AccountId,
    },
}

struct LedgerWorld {
    bikes: Vec<Bike>,
    usage_fee: Amount,
    fleet_account: AccountId,
    balances: BTreeMap<AccountId, Amount>,
    registrations: BTreeMap<AccountId, StorageBalance>,
    events: Vec<LedgerEvent>,
    // per-method counters, so tests can assert "no remote call was made"
    view_calls: BTreeMap<&'static str, usize>,
    change_calls: BTreeMap<&'static str, usize>,
    fleet_changes_fail: bool,
    token_changes_fail: bool,
}

impl LedgerWorld {
    fn count_view(&mut self, method: &'static str) {
        *self.view_calls.entry(method).or_default() += 1;
    }

    fn count_change(&mut self, method: &'static str) {
        *self.change_calls.entry(method).or_default() += 1;
    }

    fn bike(&self, index: usize) -> Result<&Bike, ClientError> {
        self.bikes
            .get(index)
            .ok_or_else(|| ClientError::RejectedByLedger(format!("no bike at index {index}")))
    }

    fn balance(&self, account: &AccountId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn credit(&mut self, account: &AccountId, amount: Amount) {
        *self.balances.entry(account.clone()).or_default() += amount;
    }

    fn debit(&mut self, account: &AccountId, amount: Amount) -> Result<(), ClientError> {
        let balance = self.balance(account);
        if balance < amount {
            return Err(ClientError::RejectedByLedger(format!(
                "insufficient funds in account {account}"
            )));
        }
        self.balances.insert(account.clone(), balance - amount);
        Ok(())
    }

    fn require_registered(&self, account: &AccountId) -> Result<(), ClientError> {
        if self.registrations.contains_key(account) {
            Ok(())
        } else {
            Err(ClientError::RejectedByLedger(format!(
                "account {account} is not registered"
            )))
        }
    }

    /// The fleet ledger's reaction to an incoming fee transfer. Runs inside
    /// the transfer call: a rejection here fails the whole call with the
    /// funds returned to the sender.
    fn on_fee_received(&mut self, sender: &AccountId, amount: Amount, msg: &str) -> Result<(), ClientError> {
        let index: usize = msg
            .parse()
            .map_err(|_| ClientError::RejectedByLedger(format!("bad bike index payload: {msg}")))?;
        if amount != self.usage_fee {
            return Err(ClientError::RejectedByLedger(format!(
                "require {} ft to use the bike",
                self.usage_fee
            )));
        }
        if !matches!(self.bike(index)?, Bike::Available) {
            return Err(ClientError::RejectedByLedger("bike is not available".into()));
        }
        self.bikes[index] = Bike::InUse(sender.clone());
        self.events.push(LedgerEvent::UsageFeePaid {
            index,
            account: sender.clone(),
            amount,
        });
        Ok(())
    }
}

/// Builder/owner of the shared world. Hand out gateway handles with
/// [`InMemoryLedgers::fleet_gateway`] and [`InMemoryLedgers::token_gateway`].
pub struct InMemoryLedgers {
    world: Arc<Mutex<LedgerWorld>>,
}

impl InMemoryLedgers {
    pub fn new(fleet_account: impl Into<AccountId>, num_of_bikes: usize, usage_fee: Amount) -> Self {
        let fleet_account = fleet_account.into();
        let mut registrations = BTreeMap::new();
        // the fleet contract account holds the reward pool, so it is
        // registered from the start
        registrations.insert(
            fleet_account.clone(),
            StorageBalance {
                total: STORAGE_DEPOSIT_AMOUNT,
                available: 0,
            },
        );
        Self {
            world: Arc::new(Mutex::new(LedgerWorld {
                bikes: vec![Bike::Available; num_of_bikes],
                usage_fee,
                fleet_account,
                balances: BTreeMap::new(),
                registrations,
                events: Vec::new(),
                view_calls: BTreeMap::new(),
                change_calls: BTreeMap::new(),
                fleet_changes_fail: false,
                token_changes_fail: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerWorld> {
        self.world.lock().expect("ledger world poisoned")
    }

    pub fn fleet_gateway(&self) -> Arc<dyn FleetGateway> {
        Arc::new(InMemoryFleetGateway {
            world: Arc::clone(&self.world),
        })
    }

    pub fn token_gateway(&self) -> Arc<dyn TokenGateway> {
        Arc::new(InMemoryTokenGateway {
            world: Arc::clone(&self.world),
        })
    }

    /// Seed a registered account with a starting balance.
    pub fn register_with_balance(&self, account: impl Into<AccountId>, balance: Amount) {
        let account = account.into();
        let mut world = self.lock();
        world.registrations.insert(
            account.clone(),
            StorageBalance {
                total: STORAGE_DEPOSIT_AMOUNT,
                available: 0,
            },
        );
        world.balances.insert(account, balance);
    }

    /// Mint tokens into an account without recording a transfer event.
    pub fn mint(&self, account: impl Into<AccountId>, amount: Amount) {
        let account = account.into();
        self.lock().credit(&account, amount);
    }

    /// Make every fleet change call fail as if the transport dropped it.
    /// View calls keep working, so re-reads reveal the true state.
    pub fn fail_fleet_changes(&self, fail: bool) {
        self.lock().fleet_changes_fail = fail;
    }

    /// Same as [`Self::fail_fleet_changes`], for the token ledger.
    pub fn fail_token_changes(&self, fail: bool) {
        self.lock().token_changes_fail = fail;
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.lock().events.clone()
    }

    pub fn view_count(&self, method: &str) -> usize {
        self.lock().view_calls.get(method).copied().unwrap_or(0)
    }

    pub fn change_count(&self, method: &str) -> usize {
        self.lock().change_calls.get(method).copied().unwrap_or(0)
    }
}

pub struct InMemoryFleetGateway {
    world: Arc<Mutex<LedgerWorld>>,
}

impl InMemoryFleetGateway {
    fn lock(&self) -> MutexGuard<'_, LedgerWorld> {
        self.world.lock().expect("ledger world poisoned")
    }
}

#[async_trait]
impl FleetGateway for InMemoryFleetGateway {
    async fn num_of_bikes(&self) -> GatewayResult<usize> {
        let mut world = self.lock();
        world.count_view("num_of_bikes");
        Ok(world.bikes.len())
    }

    async fn is_available(&self, index: usize) -> GatewayResult<bool> {
        let mut world = self.lock();
        world.count_view("is_available");
        Ok(matches!(world.bike(index)?, Bike::Available))
    }

    async fn who_is_using(&self, index: usize) -> GatewayResult<Option<AccountId>> {
        let mut world = self.lock();
        world.count_view("who_is_using");
        Ok(match world.bike(index)? {
            Bike::InUse(user) => Some(user.clone()),
            _ => None,
        })
    }

    async fn who_is_inspecting(&self, index: usize) -> GatewayResult<Option<AccountId>> {
        let mut world = self.lock();
        world.count_view("who_is_inspecting");
        Ok(match world.bike(index)? {
            Bike::Inspection(inspector) => Some(inspector.clone()),
            _ => None,
        })
    }

    async fn amount_to_use_bike(&self) -> GatewayResult<Amount> {
        let mut world = self.lock();
        world.count_view("amount_to_use_bike");
        Ok(world.usage_fee)
    }

    async fn inspect_bike(
        &self,
        signer: &AccountId,
        index: usize,
        _opts: CallOptions,
    ) -> GatewayResult<()> {
        let mut world = self.lock();
        world.count_change("inspect_bike");
        if world.fleet_changes_fail {
            return Err(ClientError::GatewayUnavailable("fleet ledger".into()));
        }
        if !matches!(world.bike(index)?, Bike::Available) {
            return Err(ClientError::RejectedByLedger("bike is not available".into()));
        }
        world.bikes[index] = Bike::Inspection(signer.clone());
        world.events.push(LedgerEvent::Inspected {
            index,
            account: signer.clone(),
        });
        Ok(())
    }

    async fn return_bike(
        &self,
        signer: &AccountId,
        index: usize,
        _opts: CallOptions,
    ) -> GatewayResult<()> {
        let mut world = self.lock();
        world.count_change("return_bike");
        if world.fleet_changes_fail {
            return Err(ClientError::GatewayUnavailable("fleet ledger".into()));
        }
        match world.bike(index)?.clone() {
            Bike::Available => Err(ClientError::RejectedByLedger(
                "bike is already available".into(),
            )),
            Bike::InUse(user) => {
                if user != *signer {
                    return Err(ClientError::RejectedByLedger(
                        "fail due to wrong account".into(),
                    ));
                }
                world.bikes[index] = Bike::Available;
                world.events.push(LedgerEvent::Returned {
                    index,
                    account: signer.clone(),
                });
                Ok(())
            }
            Bike::Inspection(inspector) => {
                if inspector != *signer {
                    return Err(ClientError::RejectedByLedger(
                        "fail due to wrong account".into(),
                    ));
                }
                // the reward transfer runs first; the bike stays inspected
                // if it fails, matching the contract's callback ordering
                let fleet_account = world.fleet_account.clone();
                world.debit(&fleet_account, INSPECTION_REWARD)?;
                world.credit(signer, INSPECTION_REWARD);
                world.events.push(LedgerEvent::RewardPaid {
                    account: signer.clone(),
                    amount: INSPECTION_REWARD,
                });
                world.bikes[index] = Bike::Available;
                world.events.push(LedgerEvent::Returned {
                    index,
                    account: signer.clone(),
                });
                Ok(())
            }
        }
    }
}

pub struct InMemoryTokenGateway {
    world: Arc<Mutex<LedgerWorld>>,
}

impl InMemoryTokenGateway {
    fn lock(&self) -> MutexGuard<'_, LedgerWorld> {
        self.world.lock().expect("ledger world poisoned")
    }
}

#[async_trait]
impl TokenGateway for InMemoryTokenGateway {
    async fn ft_balance_of(&self, account: &AccountId) -> GatewayResult<Amount> {
        let mut world = self.lock();
        world.count_view("ft_balance_of");
        // unknown accounts report a zero balance, not an error
        Ok(world.balance(account))
    }

    async fn storage_balance_of(
        &self,
        account: &AccountId,
    ) -> GatewayResult<Option<StorageBalance>> {
        let mut world = self.lock();
        world.count_view("storage_balance_of");
        Ok(world.registrations.get(account).cloned())
    }

    async fn storage_deposit(&self, signer: &AccountId, opts: CallOptions) -> GatewayResult<()> {
        let mut world = self.lock();
        world.count_change("storage_deposit");
        if world.token_changes_fail {
            return Err(ClientError::GatewayUnavailable("token ledger".into()));
        }
        if opts.deposit < STORAGE_DEPOSIT_AMOUNT {
            return Err(ClientError::RejectedByLedger(
                "attached deposit is below the storage minimum".into(),
            ));
        }
        world.registrations.insert(
            signer.clone(),
            StorageBalance {
                total: opts.deposit,
                available: 0,
            },
        );
        world.events.push(LedgerEvent::Registered {
            account: signer.clone(),
        });
        Ok(())
    }

    async fn storage_unregister(
        &self,
        signer: &AccountId,
        force: bool,
        _opts: CallOptions,
    ) -> GatewayResult<()> {
        let mut world = self.lock();
        world.count_change("storage_unregister");
        if world.token_changes_fail {
            return Err(ClientError::GatewayUnavailable("token ledger".into()));
        }
        world.require_registered(signer)?;
        if !force && world.balance(signer) > 0 {
            return Err(ClientError::RejectedByLedger(
                "cannot unregister with a positive balance".into(),
            ));
        }
        world.registrations.remove(signer);
        world.balances.remove(signer);
        world.events.push(LedgerEvent::Unregistered {
            account: signer.clone(),
        });
        Ok(())
    }

    async fn ft_transfer(
        &self,
        signer: &AccountId,
        receiver: &AccountId,
        amount: Amount,
        _opts: CallOptions,
    ) -> GatewayResult<()> {
        let mut world = self.lock();
        world.count_change("ft_transfer");
        if world.token_changes_fail {
            return Err(ClientError::GatewayUnavailable("token ledger".into()));
        }
        world.require_registered(signer)?;
        world.require_registered(receiver)?;
        world.debit(signer, amount)?;
        world.credit(receiver, amount);
        world.events.push(LedgerEvent::Transfer {
            from: signer.clone(),
            to: receiver.clone(),
            amount,
        });
        Ok(())
    }

    async fn ft_transfer_call(
        &self,
        signer: &AccountId,
        receiver: &AccountId,
        amount: Amount,
        msg: &str,
        _opts: CallOptions,
    ) -> GatewayResult<()> {
        let mut world = self.lock();
        world.count_change("ft_transfer_call");
        if world.token_changes_fail {
            return Err(ClientError::GatewayUnavailable("token ledger".into()));
        }
        world.require_registered(signer)?;
        world.require_registered(receiver)?;
        if world.balance(signer) < amount {
            return Err(ClientError::RejectedByLedger(format!(
                "insufficient funds in account {signer}"
            )));
        }
        if *receiver == world.fleet_account {
            // the receiving ledger reacts before the funds settle; a
            // rejection bounces the whole call with balances untouched
            world.on_fee_received(signer, amount, msg)?;
        }
        world.debit(signer, amount)?;
        world.credit(receiver, amount);
        world.events.push(LedgerEvent::Transfer {
            from: signer.clone(),
            to: receiver.clone(),
            amount,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ONE_YOCTO;

    fn seeded() -> InMemoryLedgers {
        let ledgers = InMemoryLedgers::new("fleet.testnet", 3, DEFAULT_USAGE_FEE);
        ledgers.register_with_balance("alice.testnet", 100);
        ledgers.register_with_balance("bob.testnet", 0);
        ledgers.mint("fleet.testnet", 1_000);
        ledgers
    }

    #[tokio::test]
    async fn inspect_then_return_pays_the_reward() {
        let ledgers = seeded();
        let fleet = ledgers.fleet_gateway();
        let token = ledgers.token_gateway();
        let alice = "alice.testnet".to_string();

        fleet
            .inspect_bike(&alice, 1, CallOptions::default())
            .await
            .unwrap();
        assert_eq!(fleet.who_is_inspecting(1).await.unwrap(), Some(alice.clone()));
        assert!(!fleet.is_available(1).await.unwrap());

        fleet
            .return_bike(&alice, 1, CallOptions::default())
            .await
            .unwrap();
        assert!(fleet.is_available(1).await.unwrap());
        assert_eq!(
            token.ft_balance_of(&alice).await.unwrap(),
            100 + INSPECTION_REWARD
        );
    }

    #[tokio::test]
    async fn return_by_other_account_is_rejected() {
        let ledgers = seeded();
        let fleet = ledgers.fleet_gateway();
        let alice = "alice.testnet".to_string();
        let bob = "bob.testnet".to_string();

        fleet
            .inspect_bike(&alice, 0, CallOptions::default())
            .await
            .unwrap();
        let err = fleet
            .return_bike(&bob, 0, CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RejectedByLedger(_)));
        assert_eq!(fleet.who_is_inspecting(0).await.unwrap(), Some(alice));
    }

    #[tokio::test]
    async fn fee_transfer_marks_the_bike_in_use() {
        let ledgers = seeded();
        let fleet = ledgers.fleet_gateway();
        let token = ledgers.token_gateway();
        let alice = "alice.testnet".to_string();
        let receiver = "fleet.testnet".to_string();

        token
            .ft_transfer_call(
                &alice,
                &receiver,
                DEFAULT_USAGE_FEE,
                "2",
                CallOptions::with_deposit(ONE_YOCTO),
            )
            .await
            .unwrap();
        assert_eq!(fleet.who_is_using(2).await.unwrap(), Some(alice.clone()));
        assert_eq!(
            token.ft_balance_of(&alice).await.unwrap(),
            100 - DEFAULT_USAGE_FEE
        );
    }

    #[tokio::test]
    async fn wrong_fee_bounces_with_balances_untouched() {
        let ledgers = seeded();
        let token = ledgers.token_gateway();
        let fleet = ledgers.fleet_gateway();
        let alice = "alice.testnet".to_string();
        let receiver = "fleet.testnet".to_string();

        let err = token
            .ft_transfer_call(
                &alice,
                &receiver,
                DEFAULT_USAGE_FEE + 1,
                "0",
                CallOptions::with_deposit(ONE_YOCTO),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RejectedByLedger(_)));
        assert_eq!(token.ft_balance_of(&alice).await.unwrap(), 100);
        assert!(fleet.is_available(0).await.unwrap());
    }

    #[tokio::test]
    async fn transfer_to_unregistered_receiver_is_rejected() {
        let ledgers = seeded();
        let token = ledgers.token_gateway();
        let alice = "alice.testnet".to_string();
        let nobody = "nobody.testnet".to_string();

        let err = token
            .ft_transfer(&alice, &nobody, 10, CallOptions::with_deposit(ONE_YOCTO))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RejectedByLedger(_)));
        // balance lookups on unknown accounts still report zero
        assert_eq!(token.ft_balance_of(&nobody).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unregister_burns_the_remaining_balance() {
        let ledgers = seeded();
        let token = ledgers.token_gateway();
        let alice = "alice.testnet".to_string();

        token
            .storage_unregister(&alice, true, CallOptions::with_deposit(ONE_YOCTO))
            .await
            .unwrap();
        assert!(token.storage_balance_of(&alice).await.unwrap().is_none());
        assert_eq!(token.ft_balance_of(&alice).await.unwrap(), 0);
    }
}
