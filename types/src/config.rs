//! Game configuration shared by the engine and the server.

use serde::{Deserialize, Serialize};

/// Default multiplier board: two zero slots flanked by fractional slots, with
/// the big winners at the edges.
pub const DEFAULT_MULTIPLIERS: [f64; 9] = [4.0, 2.0, 1.4, 0.0, 0.5, 0.0, 1.2, 1.5, 5.0];

/// Tunable game parameters for every market this process runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    /// Ordered multiplier board, length >= 2.
    pub multipliers: Vec<f64>,
    /// Symbols selected per round.
    pub stock_count: usize,
    pub bet_time_ms: u64,
    pub delta_time_ms: u64,
    pub drop_time_ms: u64,
    pub payout_time_ms: u64,
    /// Target long-run payout percentage.
    pub desired_rtp: f64,
    /// Minimum plays before the RTP governor activates.
    pub threshold_playcount: u64,
    /// Plays at which the RTP counters auto-reset.
    pub limit_playcount: u64,
    /// Snapshot age beyond which the market is unhealthy, seconds.
    pub snapshot_freshness_seconds: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            multipliers: DEFAULT_MULTIPLIERS.to_vec(),
            stock_count: 5,
            bet_time_ms: 20_000,
            delta_time_ms: 10_000,
            drop_time_ms: 10_000,
            payout_time_ms: 5_000,
            desired_rtp: 96.5,
            threshold_playcount: 100,
            limit_playcount: 10_000,
            snapshot_freshness_seconds: 5,
        }
    }
}

impl GameConfig {
    /// Reject configurations the round loop cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.multipliers.len() < 2 {
            return Err("multiplier board needs at least 2 slots".into());
        }
        if self.multipliers.iter().any(|m| *m < 0.0 || !m.is_finite()) {
            return Err("multipliers must be finite and non-negative".into());
        }
        if self.stock_count == 0 {
            return Err("stock_count must be greater than zero".into());
        }
        for (name, ms) in [
            ("bet_time_ms", self.bet_time_ms),
            ("delta_time_ms", self.delta_time_ms),
            ("drop_time_ms", self.drop_time_ms),
            ("payout_time_ms", self.payout_time_ms),
        ] {
            if ms == 0 {
                return Err(format!("{name} must be greater than zero"));
            }
        }
        if !(0.0..=200.0).contains(&self.desired_rtp) {
            return Err("desired_rtp must be within 0..=200".into());
        }
        if self.limit_playcount == 0 {
            return Err("limit_playcount must be greater than zero".into());
        }
        Ok(())
    }
}

/// Parse a `PLINKO_MULTIPLIERS`-style comma-separated float list.
pub fn parse_multipliers(raw: &str) -> Result<Vec<f64>, String> {
    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| format!("invalid multiplier: {part:?}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_degenerate_boards() {
        let mut config = GameConfig::default();
        config.multipliers = vec![1.0];
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.multipliers = vec![1.0, -0.5];
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.bet_time_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_multiplier_lists() {
        assert_eq!(
            parse_multipliers("4, 2,1.4 ,0,0.5,0,1.2,1.5,5").unwrap(),
            DEFAULT_MULTIPLIERS.to_vec()
        );
        assert!(parse_multipliers("4,x,2").is_err());
    }
}
