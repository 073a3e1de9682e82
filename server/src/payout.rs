//! Payout pipeline and refunder.
//!
//! Runs detached from the scheduler tick. Wallet credits across the round go
//! out concurrently with bounded parallelism and are all awaited before the
//! round's keys are cleaned up; a failed credit is logged per bet and never
//! aborts the round.

use crate::rooms::Broadcaster;
use crate::rtp::RtpTracker;
use crate::store::{read_json, StateStore, StoreError};
use crate::wallet::{CreditKind, CreditRequest, TransactionStatus, WalletGateway};
use futures::stream::{self, StreamExt};
use plinko_engine::settle_player;
use plinko_types::events::PayoutEvent;
use plinko_types::{keys, ServerEvent, SymbolResult, Wager};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Concurrent wallet credits in flight per round.
const CREDIT_CONCURRENCY: usize = 8;

pub struct PayoutPipeline {
    store: Arc<dyn StateStore>,
    wallet: Arc<dyn WalletGateway>,
    rtp: Arc<RtpTracker>,
    rooms: Arc<dyn Broadcaster>,
    game: String,
}

struct PlayerPayout {
    player_id: String,
    event: PayoutEvent,
}

impl PayoutPipeline {
    pub fn new(
        store: Arc<dyn StateStore>,
        wallet: Arc<dyn WalletGateway>,
        rtp: Arc<RtpTracker>,
        rooms: Arc<dyn Broadcaster>,
        game: String,
    ) -> Self {
        Self {
            store,
            wallet,
            rtp,
            rooms,
            game,
        }
    }

    /// Settle one finished round. Errors are logged, never propagated: the
    /// scheduler has already moved on.
    pub async fn settle_round(&self, market: &str, round_id: &str) {
        if let Err(err) = self.run(market, round_id).await {
            warn!(market, round = round_id, error = %err, "payout pipeline failed");
        }
    }

    async fn run(&self, market: &str, round_id: &str) -> Result<(), StoreError> {
        let bets_key = keys::bets(market, round_id);
        let results_key = keys::results(market, round_id);

        let results: Option<Vec<SymbolResult>> = read_json(&*self.store, &results_key).await?;
        let wagers_by_player = self.store.wager_all(&bets_key).await?;

        let Some(results) = results.filter(|r| !r.is_empty()) else {
            self.store.delete(&bets_key).await?;
            return Ok(());
        };
        if wagers_by_player.is_empty() {
            self.store.delete(&bets_key).await?;
            self.store.delete(&results_key).await?;
            return Ok(());
        }

        let multipliers: HashMap<String, f64> = results
            .iter()
            .map(|r| (r.symbol.clone(), r.multiplier))
            .collect();

        let mut payouts: Vec<PlayerPayout> = Vec::new();
        let mut credits: Vec<CreditRequest> = Vec::new();
        for (player_id, raw_list) in wagers_by_player {
            let wagers: Vec<Wager> = match serde_json::from_str(&raw_list) {
                Ok(wagers) => wagers,
                Err(err) => {
                    error!(market, round = round_id, player = %player_id, error = %err,
                        "corrupt wager list, skipping player");
                    continue;
                }
            };
            let settlement = settle_player(&wagers, &multipliers);
            for (wager, bet) in wagers.iter().zip(&settlement.bets) {
                if bet.payout > 0.0 {
                    credits.push(CreditRequest {
                        session_token: wager.session_token.clone(),
                        win_amount: bet.payout,
                        currency: wager.currency.clone(),
                        transaction_id: Uuid::new_v4().to_string(),
                        player_id: Some(wager.player_id.clone()),
                        tenant_id: Some(wager.tenant_id.clone()),
                        kind: CreditKind::Win,
                        metadata: Some(json!({
                            "game": self.game.clone(),
                            "wagerTxId": wager.transaction_id.clone(),
                        })),
                    });
                }
            }
            let currency = wagers
                .first()
                .map(|w| w.currency.clone())
                .unwrap_or_default();
            payouts.push(PlayerPayout {
                player_id,
                event: PayoutEvent {
                    round_id: round_id.to_string(),
                    currency,
                    total_wager: settlement.total_wager,
                    total_payout: settlement.total_payout,
                    net_profit: settlement.total_payout - settlement.total_wager,
                    bets: settlement.bets,
                },
            });
        }

        // Issue every winner credit before anything is cleaned up.
        let wallet = &self.wallet;
        stream::iter(credits)
            .map(|credit| async move {
                match wallet.credit(&credit).await {
                    Ok(reply) if reply.status == TransactionStatus::Success => {}
                    Ok(_) => error!(
                        tx = %credit.transaction_id,
                        amount = credit.win_amount,
                        "payout credit declined"
                    ),
                    Err(err) => error!(
                        tx = %credit.transaction_id,
                        amount = credit.win_amount,
                        error = %err,
                        "payout credit failed"
                    ),
                }
            })
            .buffer_unordered(CREDIT_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        for payout in &payouts {
            self.rooms
                .emit_player(&payout.player_id, &ServerEvent::Payout(payout.event.clone()));
            if payout.event.total_payout > 0.0 {
                self.rtp.record_win(market, payout.event.total_payout).await;
            }
        }
        info!(
            market,
            round = round_id,
            players = payouts.len(),
            "round settled"
        );

        self.store.delete(&bets_key).await?;
        self.store.delete(&results_key).await?;
        Ok(())
    }

    /// Refund every outstanding wager of a round, then drop the hash.
    /// Used by the circuit breaker; refunds are best effort and logged
    /// individually.
    pub async fn refund_round(&self, market: &str, round_id: &str, reason: &str) {
        let bets_key = keys::bets(market, round_id);
        let wagers_by_player = match self.store.wager_all(&bets_key).await {
            Ok(wagers) => wagers,
            Err(err) => {
                error!(market, round = round_id, error = %err, "refund sweep could not read wagers");
                return;
            }
        };

        let mut refunds: Vec<CreditRequest> = Vec::new();
        for (player_id, raw_list) in wagers_by_player {
            let wagers: Vec<Wager> = match serde_json::from_str(&raw_list) {
                Ok(wagers) => wagers,
                Err(err) => {
                    error!(market, round = round_id, player = %player_id, error = %err,
                        "corrupt wager list, cannot refund player");
                    continue;
                }
            };
            for wager in wagers {
                refunds.push(CreditRequest {
                    session_token: wager.session_token.clone(),
                    win_amount: wager.amount,
                    currency: wager.currency.clone(),
                    transaction_id: Uuid::new_v4().to_string(),
                    player_id: Some(wager.player_id.clone()),
                    tenant_id: Some(wager.tenant_id.clone()),
                    kind: CreditKind::Refund,
                    metadata: Some(json!({
                        "reason": reason,
                        "originalRound": round_id,
                        "originalBetId": wager.transaction_id.clone(),
                    })),
                });
            }
        }
        let count = refunds.len();

        let wallet = &self.wallet;
        stream::iter(refunds)
            .map(|credit| async move {
                match wallet.credit(&credit).await {
                    Ok(reply) if reply.status == TransactionStatus::Success => {}
                    Ok(_) => error!(tx = %credit.transaction_id, "refund credit declined"),
                    Err(err) => {
                        error!(tx = %credit.transaction_id, error = %err, "refund credit failed")
                    }
                }
            })
            .buffer_unordered(CREDIT_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        if let Err(err) = self.store.delete(&bets_key).await {
            error!(market, round = round_id, error = %err, "refund sweep could not drop wager hash");
        }
        info!(market, round = round_id, refunds = count, "round refunded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MemoryStore, ScriptedWallet, WalletMode};
    use crate::rooms::Rooms;
    use crate::store::write_json;
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryStore>,
        wallet: Arc<ScriptedWallet>,
        rooms: Arc<Rooms>,
        pipeline: PayoutPipeline,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let wallet = Arc::new(ScriptedWallet::new(0.0));
        let rooms = Arc::new(Rooms::new(16));
        let rtp = Arc::new(RtpTracker::new(store.clone(), 100, 10_000));
        let pipeline = PayoutPipeline::new(
            store.clone(),
            wallet.clone(),
            rtp,
            rooms.clone(),
            "plinko".into(),
        );
        Fixture {
            store,
            wallet,
            rooms,
            pipeline,
        }
    }

    fn result(symbol: &str, delta: f64, index: usize, multiplier: f64) -> SymbolResult {
        SymbolResult {
            symbol: symbol.into(),
            delta,
            multiplier_index: index,
            multiplier,
            reason: "green".into(),
        }
    }

    fn wager(tx: &str, player: &str, amount: f64, symbols: &[&str]) -> Wager {
        Wager {
            transaction_id: tx.into(),
            player_id: player.into(),
            tenant_id: "tenant-1".into(),
            session_token: format!("sess-{player}"),
            currency: "USD".into(),
            amount,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            placed_at: 0,
        }
    }

    async fn seed_wager(store: &MemoryStore, market: &str, round: &str, wager: &Wager) {
        store
            .wager_append(
                &keys::bets(market, round),
                &wager.player_id,
                &serde_json::to_string(wager).unwrap(),
                Duration::from_secs(300),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn settles_a_happy_path_round() {
        let f = fixture();
        write_json(
            &*f.store,
            &keys::results("M", "r1"),
            &vec![result("A", 0.45, 0, 4.0), result("B", -0.1, 3, 0.0)],
            None,
        )
        .await
        .unwrap();
        seed_wager(&f.store, "M", "r1", &wager("tx-1", "player-1", 100.0, &["A", "B"])).await;

        let mut player_room = f.rooms.subscribe_player("player-1");
        f.pipeline.settle_round("M", "r1").await;

        // 50 * 4 + 50 * 0 = 200 credited as a win.
        let credits = f.wallet.credits.lock().unwrap();
        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].win_amount, 200.0);
        assert_eq!(credits[0].kind, CreditKind::Win);
        assert_eq!(
            credits[0].metadata.as_ref().unwrap()["wagerTxId"],
            "tx-1"
        );
        drop(credits);

        let event = player_room.recv().await.unwrap();
        match &*event {
            ServerEvent::Payout(payout) => {
                assert_eq!(payout.round_id, "r1");
                assert_eq!(payout.total_wager, 100.0);
                assert!((payout.total_payout - 200.0).abs() < 1e-9);
                assert!((payout.net_profit - 100.0).abs() < 1e-9);
                assert_eq!(payout.bets.len(), 1);
            }
            other => panic!("expected payout event, got {other:?}"),
        }

        // RTP saw the win; round keys are gone.
        let rtp = f.store.hash_get_all(&keys::rtp("M")).await.unwrap();
        assert_eq!(rtp["totalWon"].parse::<f64>().unwrap(), 200.0);
        assert!(f.store.wager_all(&keys::bets("M", "r1")).await.unwrap().is_empty());
        assert!(f.store.get_string(&keys::results("M", "r1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn losing_round_emits_event_without_credit() {
        let f = fixture();
        write_json(
            &*f.store,
            &keys::results("M", "r1"),
            &vec![result("A", -1.0, 3, 0.0)],
            None,
        )
        .await
        .unwrap();
        seed_wager(&f.store, "M", "r1", &wager("tx-1", "player-1", 40.0, &["A"])).await;

        let mut player_room = f.rooms.subscribe_player("player-1");
        f.pipeline.settle_round("M", "r1").await;

        assert!(f.wallet.credits.lock().unwrap().is_empty());
        let event = player_room.recv().await.unwrap();
        match &*event {
            ServerEvent::Payout(payout) => {
                assert_eq!(payout.total_payout, 0.0);
                assert_eq!(payout.net_profit, -40.0);
            }
            other => panic!("expected payout event, got {other:?}"),
        }
        // No win recorded for a zero payout.
        let rtp = f.store.hash_get_all(&keys::rtp("M")).await.unwrap();
        assert!(rtp.get("totalWon").is_none());
    }

    #[tokio::test]
    async fn missing_results_only_clears_the_hash() {
        let f = fixture();
        seed_wager(&f.store, "M", "r1", &wager("tx-1", "player-1", 10.0, &["A"])).await;
        f.pipeline.settle_round("M", "r1").await;
        assert!(f.wallet.credits.lock().unwrap().is_empty());
        assert!(f.store.wager_all(&keys::bets("M", "r1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn credit_failures_do_not_block_cleanup() {
        let f = fixture();
        write_json(
            &*f.store,
            &keys::results("M", "r1"),
            &vec![result("A", 1.0, 8, 5.0)],
            None,
        )
        .await
        .unwrap();
        seed_wager(&f.store, "M", "r1", &wager("tx-1", "player-1", 10.0, &["A"])).await;
        f.wallet.set_mode(WalletMode::CreditsUnreachable);

        let mut player_room = f.rooms.subscribe_player("player-1");
        f.pipeline.settle_round("M", "r1").await;

        // The event still fires with computed totals and the keys are gone.
        let event = player_room.recv().await.unwrap();
        match &*event {
            ServerEvent::Payout(payout) => assert_eq!(payout.total_payout, 50.0),
            other => panic!("expected payout event, got {other:?}"),
        }
        assert!(f.store.wager_all(&keys::bets("M", "r1")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn multiple_players_settle_independently() {
        let f = fixture();
        write_json(
            &*f.store,
            &keys::results("M", "r1"),
            &vec![result("A", 1.0, 1, 2.0), result("B", 0.0, 4, 0.5)],
            None,
        )
        .await
        .unwrap();
        seed_wager(&f.store, "M", "r1", &wager("tx-1", "player-1", 10.0, &["A"])).await;
        seed_wager(&f.store, "M", "r1", &wager("tx-2", "player-2", 20.0, &["A", "B"])).await;

        f.pipeline.settle_round("M", "r1").await;

        let credits = f.wallet.credits.lock().unwrap();
        assert_eq!(credits.len(), 2);
        let mut amounts: Vec<f64> = credits.iter().map(|c| c.win_amount).collect();
        amounts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        // player-1: 10*2 = 20; player-2: 10*2 + 10*0.5 = 25.
        assert_eq!(amounts, vec![20.0, 25.0]);
    }

    #[tokio::test]
    async fn refund_sweep_returns_every_stake() {
        let f = fixture();
        seed_wager(&f.store, "M", "r1", &wager("tx-1", "player-1", 40.0, &["A"])).await;
        seed_wager(&f.store, "M", "r1", &wager("tx-2", "player-2", 60.0, &["A", "B"])).await;

        f.pipeline.refund_round("M", "r1", "market_outage").await;

        let credits = f.wallet.credits.lock().unwrap();
        assert_eq!(credits.len(), 2);
        for credit in credits.iter() {
            assert_eq!(credit.kind, CreditKind::Refund);
            let metadata = credit.metadata.as_ref().unwrap();
            assert_eq!(metadata["reason"], "market_outage");
            assert_eq!(metadata["originalRound"], "r1");
        }
        assert_eq!(f.wallet.balance(), 100.0);
        assert!(f.store.wager_all(&keys::bets("M", "r1")).await.unwrap().is_empty());
    }
}
