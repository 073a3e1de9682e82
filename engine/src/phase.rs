//! Round phase state machine.
//!
//! A round progresses through four timed phases:
//! 1. **Betting** - wagers accepted, live prices displayed
//! 2. **Accumulation** - start prices frozen, no wagers
//! 3. **Dropping** - deltas computed, results announced
//! 4. **Payout** - winners credited
//!
//! then cycles back to Betting. **Paused** sits outside the cycle: the
//! circuit breaker enters it and the health check leaves it.
//!
//! The machine is pure: the caller supplies `now` and the persisted phase
//! end time, and gets back either a wait duration or the next phase with its
//! end time. All storage and broadcasting happen elsewhere.

use plinko_types::{GameConfig, Phase};
use std::time::Duration;

/// Upper bound on a single tick wait while a phase is running.
pub const MAX_TICK_INTERVAL_MS: u64 = 1_000;

/// Result of a phase transition check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionResult {
    /// Phase still running; re-arm the tick after this delay.
    Wait(Duration),
    /// Phase is over; enter `phase` ending at `end_time_ms`.
    TransitionTo { phase: Phase, end_time_ms: u64 },
}

/// Pure phase timing over a [`GameConfig`].
#[derive(Clone, Debug)]
pub struct PhaseClock {
    bet_time_ms: u64,
    delta_time_ms: u64,
    drop_time_ms: u64,
    payout_time_ms: u64,
}

impl PhaseClock {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            bet_time_ms: config.bet_time_ms,
            delta_time_ms: config.delta_time_ms,
            drop_time_ms: config.drop_time_ms,
            payout_time_ms: config.payout_time_ms,
        }
    }

    /// The phase that follows `phase` in the cycle.
    ///
    /// Paused is not part of the cycle; recovery re-enters Betting.
    pub fn next_phase(phase: Phase) -> Phase {
        match phase {
            Phase::Betting => Phase::Accumulation,
            Phase::Accumulation => Phase::Dropping,
            Phase::Dropping => Phase::Payout,
            Phase::Payout => Phase::Betting,
            Phase::Paused => Phase::Betting,
        }
    }

    /// Duration of a timed phase in milliseconds.
    pub fn duration_for(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Betting => self.bet_time_ms,
            Phase::Accumulation => self.delta_time_ms,
            Phase::Dropping => self.drop_time_ms,
            Phase::Payout => self.payout_time_ms,
            // Paused has no scheduled end; the breaker re-checks on its own cadence.
            Phase::Paused => 0,
        }
    }

    /// End time for entering `phase` at `now_ms`.
    pub fn phase_end(&self, phase: Phase, now_ms: u64) -> u64 {
        now_ms.saturating_add(self.duration_for(phase))
    }

    /// Decide what the tick should do given the persisted phase end time.
    pub fn check_transition(
        &self,
        current_phase: Phase,
        end_time_ms: u64,
        now_ms: u64,
    ) -> TransitionResult {
        if now_ms < end_time_ms {
            return TransitionResult::Wait(Self::tick_delay(end_time_ms, now_ms));
        }
        let next = Self::next_phase(current_phase);
        TransitionResult::TransitionTo {
            phase: next,
            end_time_ms: self.phase_end(next, now_ms),
        }
    }

    /// Wait until the phase end, capped at [`MAX_TICK_INTERVAL_MS`] so the
    /// loop keeps renewing its lease and health check while a phase runs.
    pub fn tick_delay(end_time_ms: u64, now_ms: u64) -> Duration {
        Duration::from_millis(end_time_ms.saturating_sub(now_ms).min(MAX_TICK_INTERVAL_MS))
    }
}
