//! Return-To-Player counters.

use serde::{Deserialize, Serialize};

/// Snapshot of a market's durable RTP counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtpMetrics {
    pub total_bet: f64,
    pub total_won: f64,
    pub play_count: u64,
}

impl RtpMetrics {
    /// Payout ratio as a percentage; zero until anything was staked.
    pub fn current_rtp(&self) -> f64 {
        if self.total_bet > 0.0 {
            self.total_won / self.total_bet * 100.0
        } else {
            0.0
        }
    }
}
