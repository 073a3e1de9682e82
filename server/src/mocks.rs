//! In-memory doubles for the store, wallet, and snapshot ports.
//!
//! These mirror the atomicity contracts of the real implementations closely
//! enough to exercise the ledger, payout, and loop logic without a Redis or
//! wallet deployment.

use crate::session::Session;
use crate::snapshot::SnapshotProvider;
use crate::store::{StateStore, StoreError};
use crate::wallet::{
    CreditRequest, DebitRequest, TransactionStatus, WalletError, WalletGateway, WalletReply,
};
use async_trait::async_trait;
use plinko_types::{now_ms, Snapshot};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct MemoryInner {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    leases: HashMap<String, (String, u64)>,
}

/// In-memory [`StateStore`]. TTLs on plain keys are ignored (tests never
/// outlive them); lease TTLs are honored against the wall clock.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    fail: AtomicBool,
    fail_appends: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail, to exercise swallow paths.
    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Fail only wager appends, to exercise the post-debit rollback path.
    pub fn fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    fn outage() -> StoreError {
        StoreError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "simulated store outage",
        )))
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(Self::outage())
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.lock().strings.get(key).cloned())
    }

    async fn set_string(
        &self,
        key: &str,
        value: &str,
        _ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.check()?;
        self.lock().strings.insert(key.into(), value.into());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        let mut inner = self.lock();
        inner.strings.remove(key);
        inner.hashes.remove(key);
        Ok(())
    }

    async fn acquire_or_extend_lease(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.check()?;
        let now = now_ms();
        let expires = now + ttl.as_millis() as u64;
        let mut inner = self.lock();
        match inner.leases.get_mut(key) {
            Some((current, deadline)) if *deadline > now && current != holder => Ok(false),
            _ => {
                inner.leases.insert(key.into(), (holder.into(), expires));
                Ok(true)
            }
        }
    }

    async fn wager_append(
        &self,
        key: &str,
        player_id: &str,
        wager_json: &str,
        _ttl: Duration,
    ) -> Result<(), StoreError> {
        self.check()?;
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(Self::outage());
        }
        let mut inner = self.lock();
        let hash = inner.hashes.entry(key.into()).or_default();
        let mut list: Vec<Value> = hash
            .get(player_id)
            .map(|raw| serde_json::from_str(raw).unwrap_or_default())
            .unwrap_or_default();
        let wager: Value =
            serde_json::from_str(wager_json).map_err(|source| StoreError::Corrupt {
                key: key.into(),
                source,
            })?;
        list.push(wager);
        hash.insert(player_id.into(), serde_json::to_string(&list).unwrap_or_default());
        Ok(())
    }

    async fn wager_remove(
        &self,
        key: &str,
        player_id: &str,
        transaction_id: &str,
    ) -> Result<Option<String>, StoreError> {
        self.check()?;
        let mut inner = self.lock();
        let Some(hash) = inner.hashes.get_mut(key) else {
            return Ok(None);
        };
        let Some(raw) = hash.get(player_id) else {
            return Ok(None);
        };
        let mut list: Vec<Value> = serde_json::from_str(raw).unwrap_or_default();
        let position = list
            .iter()
            .position(|w| w.get("transactionId").and_then(Value::as_str) == Some(transaction_id));
        let Some(position) = position else {
            return Ok(None);
        };
        let removed = list.remove(position);
        if list.is_empty() {
            hash.remove(player_id);
        } else {
            hash.insert(player_id.into(), serde_json::to_string(&list).unwrap_or_default());
        }
        Ok(Some(removed.to_string()))
    }

    async fn wager_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.check()?;
        Ok(self.lock().hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_incr_float(&self, key: &str, field: &str, by: f64) -> Result<(), StoreError> {
        self.check()?;
        let mut inner = self.lock();
        let hash = inner.hashes.entry(key.into()).or_default();
        let current: f64 = hash.get(field).and_then(|v| v.parse().ok()).unwrap_or(0.0);
        hash.insert(field.into(), (current + by).to_string());
        Ok(())
    }

    async fn hash_incr_int(&self, key: &str, field: &str, by: i64) -> Result<(), StoreError> {
        self.check()?;
        let mut inner = self.lock();
        let hash = inner.hashes.entry(key.into()).or_default();
        let current: i64 = hash.get(field).and_then(|v| v.parse().ok()).unwrap_or(0);
        hash.insert(field.into(), (current + by).to_string());
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.check()?;
        Ok(self.lock().hashes.get(key).cloned().unwrap_or_default())
    }
}

/// Snapshot provider returning whatever the test last installed.
#[derive(Default)]
pub struct StaticSnapshots {
    snapshot: Mutex<Option<Snapshot>>,
}

impl StaticSnapshots {
    pub fn new(snapshot: Option<Snapshot>) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn install(&self, snapshot: Option<Snapshot>) {
        *self.snapshot.lock().unwrap_or_else(|p| p.into_inner()) = snapshot;
    }
}

#[async_trait]
impl SnapshotProvider for StaticSnapshots {
    async fn get_snapshot(&self, _market: &str) -> Option<Snapshot> {
        self.snapshot
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

/// How the scripted wallet answers the next calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalletMode {
    /// Debits and credits succeed against the tracked balance.
    Succeed,
    /// Debits reply FAILED (insufficient balance).
    DeclineDebits,
    /// Every call errors at the transport level.
    Unreachable,
    /// Debits succeed but credits error at the transport level.
    CreditsUnreachable,
}

/// Wallet double that tracks a balance and records every request.
pub struct ScriptedWallet {
    balance: Mutex<f64>,
    mode: Mutex<WalletMode>,
    pub debits: Mutex<Vec<DebitRequest>>,
    pub credits: Mutex<Vec<CreditRequest>>,
}

impl ScriptedWallet {
    pub fn new(balance: f64) -> Self {
        Self {
            balance: Mutex::new(balance),
            mode: Mutex::new(WalletMode::Succeed),
            debits: Mutex::new(Vec::new()),
            credits: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: WalletMode) {
        *self.mode.lock().unwrap_or_else(|p| p.into_inner()) = mode;
    }

    pub fn balance(&self) -> f64 {
        *self.balance.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn mode(&self) -> WalletMode {
        *self.mode.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn transport_error() -> WalletError {
        WalletError::Unavailable("simulated wallet outage".into())
    }
}

#[async_trait]
impl WalletGateway for ScriptedWallet {
    async fn debit(&self, request: &DebitRequest) -> Result<WalletReply, WalletError> {
        self.debits
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());
        match self.mode() {
            WalletMode::Unreachable => Err(Self::transport_error()),
            WalletMode::DeclineDebits => Ok(WalletReply {
                status: TransactionStatus::Failed,
                new_balance: self.balance(),
                message: Some("insufficient funds".into()),
            }),
            WalletMode::Succeed | WalletMode::CreditsUnreachable => {
                let mut balance = self.balance.lock().unwrap_or_else(|p| p.into_inner());
                *balance -= request.bet_amount;
                Ok(WalletReply {
                    status: TransactionStatus::Success,
                    new_balance: *balance,
                    message: None,
                })
            }
        }
    }

    async fn credit(&self, request: &CreditRequest) -> Result<WalletReply, WalletError> {
        self.credits
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());
        match self.mode() {
            WalletMode::Unreachable | WalletMode::CreditsUnreachable => {
                Err(Self::transport_error())
            }
            _ => {
                let mut balance = self.balance.lock().unwrap_or_else(|p| p.into_inner());
                *balance += request.win_amount;
                Ok(WalletReply {
                    status: TransactionStatus::Success,
                    new_balance: *balance,
                    message: None,
                })
            }
        }
    }
}

/// A ready-made session for tests.
pub fn test_session() -> Session {
    Session {
        session_token: "sess-token".into(),
        player_id: "player-1".into(),
        tenant_id: "tenant-1".into(),
        currency: "USD".into(),
    }
}
