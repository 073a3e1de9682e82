//! Per-market round loop.
//!
//! One task per market drives the BETTING -> ACCUMULATION -> DROPPING ->
//! PAYOUT cycle. Every tick re-establishes leadership (lease) and market
//! health (snapshot freshness) before touching state; the loop is the single
//! writer for its market while it holds the lease.
//!
//! Ordering rule for every transition: persist the complete new round blob,
//! then broadcast it. Readers of the store never observe a phase the room has
//! already moved past.

use crate::lease::LeaseManager;
use crate::payout::PayoutPipeline;
use crate::rooms::Broadcaster;
use crate::rtp::RtpTracker;
use crate::snapshot::SnapshotProvider;
use crate::store::{read_json, write_json, StateStore, StoreError};
use plinko_engine::{compute_delta, DecisionEngine, PhaseClock, SymbolDelta, TransitionResult};
use plinko_types::events::{MarketAvailability, MarketStatus, RoundError};
use plinko_types::{keys, now_ms, GameConfig, Phase, RoundState, ServerEvent, Snapshot, StockState};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Retry cadence while another instance leads the market.
const NOT_LEADER_RETRY: Duration = Duration::from_secs(5);
/// Retry cadence while market data is stale.
const UNHEALTHY_RETRY: Duration = Duration::from_secs(2);
/// Retry cadence after a failed tick.
const ERROR_RETRY: Duration = Duration::from_secs(5);
/// Retry cadence when a snapshot carries no symbols yet.
const EMPTY_SNAPSHOT_RETRY: Duration = Duration::from_secs(1);
/// Lifetime of round-scoped keys past the round.
const ROUND_KEY_TTL: Duration = Duration::from_secs(300);

pub struct MarketLoop {
    market: String,
    config: GameConfig,
    clock: PhaseClock,
    engine: DecisionEngine,
    store: Arc<dyn StateStore>,
    snapshots: Arc<dyn SnapshotProvider>,
    lease: Arc<LeaseManager>,
    rooms: Arc<dyn Broadcaster>,
    payout: Arc<PayoutPipeline>,
    rtp: Arc<RtpTracker>,
    rng: StdRng,
    boot_ms: u64,
    round_seq: u64,
}

impl MarketLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        market: String,
        config: GameConfig,
        store: Arc<dyn StateStore>,
        snapshots: Arc<dyn SnapshotProvider>,
        lease: Arc<LeaseManager>,
        rooms: Arc<dyn Broadcaster>,
        payout: Arc<PayoutPipeline>,
        rtp: Arc<RtpTracker>,
    ) -> Self {
        Self {
            market,
            clock: PhaseClock::new(&config),
            engine: DecisionEngine::new(&config),
            config,
            store,
            snapshots,
            lease,
            rooms,
            payout,
            rtp,
            rng: StdRng::from_entropy(),
            boot_ms: now_ms(),
            round_seq: 0,
        }
    }

    /// Spawn the loop as its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!(market = %self.market, "round loop starting");
        loop {
            let delay = self.tick().await;
            tokio::time::sleep(delay).await;
        }
    }

    /// One scheduler tick. Returns the delay until the next tick; exactly one
    /// tick is ever pending because the caller sleeps on the returned delay.
    pub async fn tick(&mut self) -> Duration {
        // Leadership first: a non-leader must not even read ahead.
        if !self.lease.acquire_or_extend(&self.market).await {
            return NOT_LEADER_RETRY;
        }

        // Health second.
        let now = now_ms();
        let snapshot = self.snapshots.get_snapshot(&self.market).await;
        let fresh = snapshot
            .as_ref()
            .map(|s| s.is_fresh(self.config.snapshot_freshness_seconds, now))
            .unwrap_or(false);
        let Some(snapshot) = snapshot.filter(|_| fresh) else {
            self.trip_circuit_breaker(now).await;
            return UNHEALTHY_RETRY;
        };

        match self.advance(snapshot, now).await {
            Ok(delay) => delay,
            Err(err) => {
                warn!(market = %self.market, error = %err, "tick failed");
                ERROR_RETRY
            }
        }
    }

    async fn advance(&mut self, snapshot: Snapshot, now: u64) -> Result<Duration, StoreError> {
        let state: Option<RoundState> =
            read_json(&*self.store, &keys::state(&self.market)).await?;
        let Some(state) = state else {
            return self.enter_betting(snapshot, now).await;
        };

        if state.phase == Phase::Paused {
            info!(market = %self.market, "market data recovered, reopening");
            self.rooms.emit_market(
                &self.market,
                &ServerEvent::MarketStatus(MarketStatus {
                    status: MarketAvailability::Open,
                    reason: None,
                    timestamp: now,
                }),
            );
            return self.enter_betting(snapshot, now).await;
        }

        match self.clock.check_transition(state.phase, state.end_time, now) {
            TransitionResult::Wait(delay) => Ok(delay),
            TransitionResult::TransitionTo { phase, end_time_ms } => match phase {
                Phase::Accumulation => {
                    self.enter_accumulation(state, snapshot, now, end_time_ms).await
                }
                Phase::Dropping => self.enter_dropping(state, snapshot, now, end_time_ms).await,
                Phase::Payout => self.enter_payout(state, now, end_time_ms).await,
                Phase::Betting => self.enter_betting(snapshot, now).await,
                // The cycle never schedules Paused; only the breaker does.
                Phase::Paused => Ok(ERROR_RETRY),
            },
        }
    }

    /// Persist the blob, then broadcast it. Persist-before-broadcast is the
    /// ordering contract for every transition.
    async fn publish(&self, state: &RoundState) -> Result<(), StoreError> {
        write_json(&*self.store, &keys::state(&self.market), state, None).await?;
        self.rooms
            .emit_market(&self.market, &ServerEvent::GameState(state.clone()));
        Ok(())
    }

    fn next_round_id(&mut self) -> String {
        self.round_seq += 1;
        format!("{}-{}", self.boot_ms, self.round_seq)
    }

    async fn enter_betting(
        &mut self,
        snapshot: Snapshot,
        now: u64,
    ) -> Result<Duration, StoreError> {
        let mut universe: Vec<&String> = snapshot.symbols.keys().collect();
        if universe.is_empty() {
            warn!(market = %self.market, "snapshot has no symbols, retrying");
            return Ok(EMPTY_SNAPSHOT_RETRY);
        }
        universe.sort();
        let count = self.config.stock_count.min(universe.len());
        let chosen: Vec<String> = universe
            .choose_multiple(&mut self.rng, count)
            .map(|s| (*s).clone())
            .collect();

        let round_id = self.next_round_id();
        write_json(
            &*self.store,
            &keys::stocks(&self.market, &round_id),
            &chosen,
            Some(ROUND_KEY_TTL),
        )
        .await?;

        let stocks = chosen
            .iter()
            .map(|symbol| StockState::new(symbol.clone(), snapshot.price(symbol)))
            .collect();
        let state = RoundState {
            phase: Phase::Betting,
            round_id,
            server_time: now,
            end_time: self.clock.phase_end(Phase::Betting, now),
            stocks,
            can_unbet: true,
            message: None,
        };
        self.publish(&state).await?;
        info!(market = %self.market, round = %state.round_id, symbols = count, "betting open");
        Ok(PhaseClock::tick_delay(state.end_time, now))
    }

    async fn enter_accumulation(
        &mut self,
        mut state: RoundState,
        snapshot: Snapshot,
        now: u64,
        end_time: u64,
    ) -> Result<Duration, StoreError> {
        write_json(
            &*self.store,
            &keys::start_snapshot(&self.market, &state.round_id),
            &snapshot,
            Some(ROUND_KEY_TTL),
        )
        .await?;

        for stock in &mut state.stocks {
            let price = snapshot.price(&stock.symbol);
            stock.current_price = price;
            stock.start_price = price;
        }
        state.phase = Phase::Accumulation;
        state.server_time = now;
        state.end_time = end_time;
        state.can_unbet = false;
        self.publish(&state).await?;
        info!(market = %self.market, round = %state.round_id, "prices frozen");
        Ok(PhaseClock::tick_delay(end_time, now))
    }

    async fn enter_dropping(
        &mut self,
        mut state: RoundState,
        end_snapshot: Snapshot,
        now: u64,
        end_time: u64,
    ) -> Result<Duration, StoreError> {
        let start_snapshot: Snapshot = read_json(
            &*self.store,
            &keys::start_snapshot(&self.market, &state.round_id),
        )
        .await?
        .unwrap_or_else(|| end_snapshot.clone());

        let deltas: Vec<SymbolDelta> = state
            .stocks
            .iter()
            .map(|stock| {
                let start = start_snapshot
                    .price(&stock.symbol)
                    .or(stock.start_price)
                    .unwrap_or(0.0);
                let end = end_snapshot.price(&stock.symbol).unwrap_or(start);
                SymbolDelta {
                    symbol: stock.symbol.clone(),
                    delta: compute_delta(start, end),
                }
            })
            .collect();

        let metrics = self.rtp.metrics(&self.market).await;
        let results = self.engine.decide(&deltas, &metrics, &mut self.rng);
        for result in &results {
            debug!(
                market = %self.market,
                round = %state.round_id,
                symbol = %result.symbol,
                delta = result.delta,
                slot = result.multiplier_index,
                multiplier = result.multiplier,
                reason = %result.reason,
                "slot decided"
            );
        }
        write_json(
            &*self.store,
            &keys::results(&self.market, &state.round_id),
            &results,
            Some(ROUND_KEY_TTL),
        )
        .await?;

        for (stock, result) in state.stocks.iter_mut().zip(&results) {
            stock.current_price = end_snapshot.price(&stock.symbol).or(stock.current_price);
            stock.delta = Some(result.delta);
            stock.multiplier_index = Some(result.multiplier_index);
            stock.multiplier = Some(result.multiplier);
        }
        state.phase = Phase::Dropping;
        state.server_time = now;
        state.end_time = end_time;
        state.can_unbet = false;
        self.publish(&state).await?;
        info!(market = %self.market, round = %state.round_id, "results announced");
        Ok(PhaseClock::tick_delay(end_time, now))
    }

    async fn enter_payout(
        &mut self,
        mut state: RoundState,
        now: u64,
        end_time: u64,
    ) -> Result<Duration, StoreError> {
        state.phase = Phase::Payout;
        state.server_time = now;
        state.end_time = end_time;
        state.can_unbet = false;
        self.publish(&state).await?;

        // Settlement runs detached; the tick must not wait on wallet I/O.
        let pipeline = Arc::clone(&self.payout);
        let market = self.market.clone();
        let round_id = state.round_id.clone();
        tokio::spawn(async move {
            pipeline.settle_round(&market, &round_id).await;
        });
        Ok(PhaseClock::tick_delay(end_time, now))
    }

    /// First unhealthy tick: cancel and refund an in-flight round if wagers
    /// could still be open, then pause the market. Later unhealthy ticks are
    /// no-ops until recovery.
    async fn trip_circuit_breaker(&mut self, now: u64) {
        if let Err(err) = self.try_trip(now).await {
            warn!(market = %self.market, error = %err, "circuit breaker trip failed");
        }
    }

    async fn try_trip(&mut self, now: u64) -> Result<(), StoreError> {
        let state: Option<RoundState> =
            read_json(&*self.store, &keys::state(&self.market)).await?;
        if let Some(state) = &state {
            if state.phase == Phase::Paused {
                return Ok(());
            }
        }
        warn!(market = %self.market, "market data stale, pausing");

        if let Some(state) = &state {
            if matches!(state.phase, Phase::Betting | Phase::Accumulation) {
                self.rooms.emit_market(
                    &self.market,
                    &ServerEvent::GameError(RoundError {
                        code: "ROUND_CANCELLED".into(),
                        message: "Bets refunded".into(),
                    }),
                );
                self.payout
                    .refund_round(&self.market, &state.round_id, "market_outage")
                    .await;
            }
        }

        let (round_id, stocks) = match state {
            Some(state) => (state.round_id, state.stocks),
            None => (self.next_round_id(), Vec::new()),
        };
        let paused = RoundState {
            phase: Phase::Paused,
            round_id,
            server_time: now,
            end_time: now + UNHEALTHY_RETRY.as_millis() as u64,
            stocks,
            can_unbet: false,
            message: Some("Market data unstable".into()),
        };
        self.publish(&paused).await?;
        self.rooms.emit_market(
            &self.market,
            &ServerEvent::MarketStatus(MarketStatus {
                status: MarketAvailability::Closed,
                reason: Some("Market data unstable".into()),
                timestamp: now,
            }),
        );
        Ok(())
    }

    /// Pick `count` distinct indices; exposed for deterministic sampling tests.
    #[cfg(test)]
    fn sample_symbols(&mut self, universe: &[String], count: usize) -> Vec<String> {
        universe
            .choose_multiple(&mut self.rng, count.min(universe.len()))
            .cloned()
            .collect()
    }
}
