//! Market-data snapshot access.
//!
//! Ingestion is out of scope; the engine only consumes the latest snapshot
//! the ingestion process left in the store and judges its freshness.

use crate::store::{read_json, StateStore};
use async_trait::async_trait;
use plinko_types::{keys, Snapshot};
use std::sync::Arc;
use tracing::warn;

#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Latest snapshot for the market, if any has been published.
    async fn get_snapshot(&self, market: &str) -> Option<Snapshot>;
}

pub struct RedisSnapshotProvider {
    store: Arc<dyn StateStore>,
}

impl RedisSnapshotProvider {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SnapshotProvider for RedisSnapshotProvider {
    async fn get_snapshot(&self, market: &str) -> Option<Snapshot> {
        match read_json::<Snapshot>(&*self.store, &keys::snapshot(market)).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(market, error = %err, "snapshot read failed");
                None
            }
        }
    }
}
