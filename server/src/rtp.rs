//! Durable per-market RTP counters.
//!
//! The tracker is telemetry for the decision engine, not ledger data: every
//! operation swallows store failures with a warning so a flaky store can
//! never fail a round. Counters auto-reset once the play count reaches the
//! configured limit, keeping the governor responsive to recent play.

use crate::store::{StateStore, StoreError};
use plinko_types::{keys, RtpMetrics};
use std::sync::Arc;
use tracing::{info, warn};

const FIELD_TOTAL_BET: &str = "totalBet";
const FIELD_TOTAL_WON: &str = "totalWon";
const FIELD_PLAY_COUNT: &str = "playCount";

pub struct RtpTracker {
    store: Arc<dyn StateStore>,
    threshold_playcount: u64,
    limit_playcount: u64,
}

impl RtpTracker {
    pub fn new(store: Arc<dyn StateStore>, threshold_playcount: u64, limit_playcount: u64) -> Self {
        Self {
            store,
            threshold_playcount,
            limit_playcount,
        }
    }

    /// Record a stake. Resets the counters first when the play limit was hit.
    pub async fn record_bet(&self, market: &str, amount: f64) {
        if let Err(err) = self.try_record_bet(market, amount).await {
            warn!(market, error = %err, "rtp record_bet failed");
        }
    }

    async fn try_record_bet(&self, market: &str, amount: f64) -> Result<(), StoreError> {
        let key = keys::rtp(market);
        let metrics = self.read(market).await?;
        if metrics.play_count >= self.limit_playcount {
            info!(
                market,
                play_count = metrics.play_count,
                "rtp play limit reached, resetting counters"
            );
            self.store.delete(&key).await?;
        }
        self.store.hash_incr_float(&key, FIELD_TOTAL_BET, amount).await?;
        self.store.hash_incr_int(&key, FIELD_PLAY_COUNT, 1).await?;
        Ok(())
    }

    /// Record a payout.
    pub async fn record_win(&self, market: &str, amount: f64) {
        let key = keys::rtp(market);
        if let Err(err) = self.store.hash_incr_float(&key, FIELD_TOTAL_WON, amount).await {
            warn!(market, error = %err, "rtp record_win failed");
        }
    }

    /// Current counters; zeroes when unset or unreadable.
    pub async fn metrics(&self, market: &str) -> RtpMetrics {
        match self.read(market).await {
            Ok(metrics) => metrics,
            Err(err) => {
                warn!(market, error = %err, "rtp read failed, using zeroes");
                RtpMetrics::default()
            }
        }
    }

    pub fn has_enough_data(&self, metrics: &RtpMetrics) -> bool {
        metrics.play_count >= self.threshold_playcount
    }

    pub async fn reset(&self, market: &str) {
        if let Err(err) = self.store.delete(&keys::rtp(market)).await {
            warn!(market, error = %err, "rtp reset failed");
        }
    }

    async fn read(&self, market: &str) -> Result<RtpMetrics, StoreError> {
        let fields = self.store.hash_get_all(&keys::rtp(market)).await?;
        let get_f64 = |name: &str| {
            fields
                .get(name)
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        Ok(RtpMetrics {
            total_bet: get_f64(FIELD_TOTAL_BET),
            total_won: get_f64(FIELD_TOTAL_WON),
            play_count: fields
                .get(FIELD_PLAY_COUNT)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MemoryStore;

    fn tracker(store: Arc<MemoryStore>, limit: u64) -> RtpTracker {
        RtpTracker::new(store, 100, limit)
    }

    #[tokio::test]
    async fn counts_bets_and_wins() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(store, 1_000);
        tracker.record_bet("M", 25.0).await;
        tracker.record_bet("M", 75.0).await;
        tracker.record_win("M", 40.0).await;
        let metrics = tracker.metrics("M").await;
        assert_eq!(metrics.total_bet, 100.0);
        assert_eq!(metrics.total_won, 40.0);
        assert_eq!(metrics.play_count, 2);
        assert_eq!(metrics.current_rtp(), 40.0);
    }

    #[tokio::test]
    async fn resets_at_play_limit() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(store.clone(), 1_000);
        // Seed counters at the limit.
        let key = keys::rtp("M");
        store.hash_incr_float(&key, "totalBet", 50_000.0).await.unwrap();
        store.hash_incr_float(&key, "totalWon", 48_000.0).await.unwrap();
        store.hash_incr_int(&key, "playCount", 1_000).await.unwrap();

        tracker.record_bet("M", 50.0).await;
        let metrics = tracker.metrics("M").await;
        assert_eq!(metrics.play_count, 1);
        assert_eq!(metrics.total_bet, 50.0);
        assert_eq!(metrics.total_won, 0.0);
    }

    #[tokio::test]
    async fn below_limit_keeps_counting() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(store.clone(), 3);
        tracker.record_bet("M", 10.0).await;
        tracker.record_bet("M", 10.0).await;
        assert_eq!(tracker.metrics("M").await.play_count, 2);
        // Third bet crosses nothing yet; the fourth sees play_count == 3 and resets.
        tracker.record_bet("M", 10.0).await;
        assert_eq!(tracker.metrics("M").await.play_count, 3);
        tracker.record_bet("M", 10.0).await;
        let metrics = tracker.metrics("M").await;
        assert_eq!(metrics.play_count, 1);
        assert_eq!(metrics.total_bet, 10.0);
    }

    #[tokio::test]
    async fn swallows_store_failures() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(store.clone(), 1_000);
        store.fail_all(true);
        // None of these may panic or propagate.
        tracker.record_bet("M", 10.0).await;
        tracker.record_win("M", 10.0).await;
        tracker.reset("M").await;
        assert_eq!(tracker.metrics("M").await, RtpMetrics::default());
        store.fail_all(false);
        assert_eq!(tracker.metrics("M").await.play_count, 0);
    }

    #[tokio::test]
    async fn enough_data_threshold() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(store, 1_000);
        let mut metrics = RtpMetrics::default();
        assert!(!tracker.has_enough_data(&metrics));
        metrics.play_count = 100;
        assert!(tracker.has_enough_data(&metrics));
    }
}
