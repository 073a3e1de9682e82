//! RTP-governed multiplier slot selection.
//!
//! The direction of a symbol's price move fixes the color zone; the RTP
//! governor fixes the band within it. The selected slot is drawn uniformly
//! from the candidate set, with randomness injected by the caller.

use crate::zones::{Band, Zone, ZoneMap};
use plinko_types::{GameConfig, RtpMetrics, SymbolResult};
use rand::Rng;

/// Percentage price change between snapshots, rounded to 3 decimals.
/// Degenerate start prices yield a flat delta.
pub fn compute_delta(start: f64, end: f64) -> f64 {
    if start <= 0.0 {
        return 0.0;
    }
    round3((end - start) / start * 100.0)
}

fn round3(value: f64) -> f64 {
    (value * 1_000.0).round() / 1_000.0
}

/// Price move of one symbol over the accumulation window.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolDelta {
    pub symbol: String,
    pub delta: f64,
}

/// Slot selector for one multiplier board.
#[derive(Clone, Debug)]
pub struct DecisionEngine {
    zones: ZoneMap,
    desired_rtp: f64,
    threshold_playcount: u64,
}

impl DecisionEngine {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            zones: ZoneMap::from_multipliers(&config.multipliers),
            desired_rtp: config.desired_rtp,
            threshold_playcount: config.threshold_playcount,
        }
    }

    pub fn zones(&self) -> &ZoneMap {
        &self.zones
    }

    /// Select a slot per symbol. Does not mutate any state.
    pub fn decide(
        &self,
        deltas: &[SymbolDelta],
        metrics: &RtpMetrics,
        rng: &mut impl Rng,
    ) -> Vec<SymbolResult> {
        let band = self.governor_band(metrics);
        deltas
            .iter()
            .map(|d| {
                let (zone, band, reason) = classify(d.delta, band);
                let candidates = self.zones.candidates(zone, band);
                let index = candidates[rng.gen_range(0..candidates.len())];
                SymbolResult {
                    symbol: d.symbol.clone(),
                    delta: d.delta,
                    multiplier_index: index,
                    multiplier: self.zones.multiplier(index),
                    reason: reason.to_string(),
                }
            })
            .collect()
    }

    /// Which band the governor steers toward, given the current counters.
    ///
    /// Below the play-count threshold there is not enough data to bias, and
    /// an exactly-on-target RTP needs no correction either.
    fn governor_band(&self, metrics: &RtpMetrics) -> Band {
        if metrics.play_count < self.threshold_playcount {
            return Band::Full;
        }
        let rtp = metrics.current_rtp();
        if rtp < self.desired_rtp {
            Band::High
        } else if rtp > self.desired_rtp {
            Band::Low
        } else {
            Band::Full
        }
    }
}

/// Zone and band for one delta under the governor's current bias.
/// Falling symbols always land red; the governor never biases a loss.
fn classify(delta: f64, governor: Band) -> (Zone, Band, &'static str) {
    if delta < 0.0 {
        return (Zone::Red, Band::Full, "red");
    }
    let zone = if delta == 0.0 { Zone::Yellow } else { Zone::Green };
    let reason = match (zone, governor) {
        (Zone::Yellow, Band::Full) => "yellow",
        (Zone::Yellow, Band::High) => "yellow_high",
        (Zone::Yellow, Band::Low) => "yellow_low",
        (Zone::Green, Band::Full) => "green",
        (Zone::Green, Band::High) => "green_high",
        (Zone::Green, Band::Low) => "green_low",
        (Zone::Red, _) => "red",
    };
    (zone, governor, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine() -> DecisionEngine {
        DecisionEngine::new(&GameConfig::default())
    }

    fn deltas(values: &[(&str, f64)]) -> Vec<SymbolDelta> {
        values
            .iter()
            .map(|(s, d)| SymbolDelta {
                symbol: s.to_string(),
                delta: *d,
            })
            .collect()
    }

    fn fresh_metrics() -> RtpMetrics {
        RtpMetrics::default()
    }

    fn metrics(total_bet: f64, total_won: f64, play_count: u64) -> RtpMetrics {
        RtpMetrics {
            total_bet,
            total_won,
            play_count,
        }
    }

    #[test]
    fn delta_math() {
        assert_eq!(compute_delta(100.0, 100.45), 0.45);
        assert_eq!(compute_delta(200.0, 199.80), -0.1);
        assert_eq!(compute_delta(0.0, 55.0), 0.0);
        assert_eq!(compute_delta(-3.0, 55.0), 0.0);
        // Rounding to 3 decimals.
        assert_eq!(compute_delta(3.0, 3.001), 0.033);
    }

    #[test]
    fn negative_delta_always_lands_red() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let results = engine.decide(&deltas(&[("B", -0.1)]), &fresh_metrics(), &mut rng);
            assert!([3, 5].contains(&results[0].multiplier_index));
            assert_eq!(results[0].multiplier, 0.0);
            assert_eq!(results[0].reason, "red");
        }
    }

    #[test]
    fn positive_delta_below_threshold_uses_full_green() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let results = engine.decide(&deltas(&[("A", 0.45)]), &fresh_metrics(), &mut rng);
            let index = results[0].multiplier_index;
            assert!([0, 1, 7, 8].contains(&index));
            assert_eq!(results[0].reason, "green");
            seen.insert(index);
        }
        // Uniform over the zone: every slot should show up in 200 draws.
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn zeroed_rng_picks_first_candidate() {
        // Happy-path scenario: A +0.45 lands green slot 0 (4x), B -0.10 lands red.
        let engine = engine();
        let mut rng = StepRng::new(0, 0);
        let results = engine.decide(
            &deltas(&[("A", 0.45), ("B", -0.1)]),
            &fresh_metrics(),
            &mut rng,
        );
        assert_eq!(results[0].multiplier_index, 0);
        assert_eq!(results[0].multiplier, 4.0);
        assert_eq!(results[1].multiplier, 0.0);
    }

    #[test]
    fn low_rtp_steers_high() {
        // currentRTP 94.2 < desired 96.5 with 1250 plays.
        let engine = engine();
        let m = metrics(100_000.0, 94_200.0, 1_250);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let results = engine.decide(&deltas(&[("A", 1.0), ("B", 0.0)]), &m, &mut rng);
            assert!([0, 8].contains(&results[0].multiplier_index));
            assert_eq!(results[0].reason, "green_high");
            assert!([2, 6].contains(&results[1].multiplier_index));
            assert_eq!(results[1].reason, "yellow_high");
        }
    }

    #[test]
    fn high_rtp_steers_low() {
        // currentRTP 98.2 > desired with 1500 plays.
        let engine = engine();
        let m = metrics(100_000.0, 98_200.0, 1_500);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let results = engine.decide(&deltas(&[("A", 1.0), ("B", 0.0)]), &m, &mut rng);
            assert!([1, 7].contains(&results[0].multiplier_index));
            assert_eq!(results[0].reason, "green_low");
            assert_eq!(results[1].multiplier_index, 4);
            assert_eq!(results[1].reason, "yellow_low");
        }
    }

    #[test]
    fn exact_target_rtp_is_unbiased() {
        let engine = engine();
        let m = metrics(100_000.0, 96_500.0, 5_000);
        let mut rng = StdRng::seed_from_u64(9);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let results = engine.decide(&deltas(&[("A", 2.0)]), &m, &mut rng);
            seen.insert(results[0].multiplier_index);
            assert_eq!(results[0].reason, "green");
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn governor_waits_for_threshold() {
        // 99 plays with a wildly low RTP must still draw from the full zone.
        let engine = engine();
        let m = metrics(10_000.0, 1_000.0, 99);
        let mut rng = StdRng::seed_from_u64(13);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let results = engine.decide(&deltas(&[("A", 0.5)]), &m, &mut rng);
            seen.insert(results[0].multiplier_index);
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn index_always_within_board() {
        let engine = engine();
        let mut rng = StdRng::seed_from_u64(17);
        for delta in [-5.0, -0.001, 0.0, 0.001, 5.0] {
            for m in [fresh_metrics(), metrics(1_000.0, 2_000.0, 500)] {
                let results = engine.decide(&deltas(&[("A", delta)]), &m, &mut rng);
                assert!(results[0].multiplier_index < engine.zones().board_len());
            }
        }
    }
}
