//! Round state and market-data snapshot types.
//!
//! The round-state blob is the authoritative description of a market's
//! current phase. Each phase transition writes a complete new blob to the
//! shared store and then broadcasts it to the market room; clients never see
//! partial updates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Phase of a market round.
///
/// Rounds cycle `Betting -> Accumulation -> Dropping -> Payout -> Betting`.
/// `Paused` is entered by the circuit breaker when market data goes stale and
/// left once a fresh snapshot is observed again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Betting,
    Accumulation,
    Dropping,
    Payout,
    Paused,
}

impl Phase {
    /// Wagers may be placed or cancelled only while betting.
    pub fn accepts_wagers(self) -> bool {
        matches!(self, Phase::Betting)
    }
}

/// Per-symbol state inside the round blob.
///
/// `start_price` is populated at ACCUMULATION entry, `delta`, `multiplier`
/// and `multiplier_index` at DROPPING entry. Earlier phases leave them unset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockState {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
}

impl StockState {
    pub fn new(symbol: impl Into<String>, current_price: Option<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            current_price,
            start_price: None,
            delta: None,
            multiplier_index: None,
            multiplier: None,
        }
    }
}

/// Authoritative round state for one market, stored as a single JSON blob
/// under `plinko:state:{market}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundState {
    pub phase: Phase,
    pub round_id: String,
    /// Server wall clock at the time the blob was written, epoch ms.
    pub server_time: u64,
    /// When the current phase ends, epoch ms. Always >= `server_time`.
    pub end_time: u64,
    pub stocks: Vec<StockState>,
    pub can_unbet: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A single symbol quote inside a market-data snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolQuote {
    pub price: f64,
}

/// Market-data snapshot as published by the ingestion process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub symbols: HashMap<String, SymbolQuote>,
    /// Capture time, epoch ms.
    pub captured_at: u64,
}

impl Snapshot {
    /// True when the snapshot is younger than `max_age_seconds` at `now_ms`.
    pub fn is_fresh(&self, max_age_seconds: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.captured_at) <= max_age_seconds * 1_000
    }

    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.symbols.get(symbol).map(|q| q.price)
    }
}

/// Per-symbol outcome of a round, persisted as an array under
/// `plinko:{market}:{roundId}:results`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolResult {
    pub symbol: String,
    pub delta: f64,
    pub multiplier_index: usize,
    pub multiplier: f64,
    /// Short audit tag naming the selection branch taken.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_serializes_screaming() {
        assert_eq!(
            serde_json::to_string(&Phase::Accumulation).unwrap(),
            "\"ACCUMULATION\""
        );
        let p: Phase = serde_json::from_str("\"PAUSED\"").unwrap();
        assert_eq!(p, Phase::Paused);
    }

    #[test]
    fn round_state_round_trips_camel_case() {
        let state = RoundState {
            phase: Phase::Betting,
            round_id: "r-1".into(),
            server_time: 1_000,
            end_time: 21_000,
            stocks: vec![StockState::new("AAPL", Some(187.2))],
            can_unbet: true,
            message: None,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"roundId\""));
        assert!(json.contains("\"canUnbet\""));
        assert!(!json.contains("\"message\""));
        let back: RoundState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn snapshot_freshness_window() {
        let snap = Snapshot {
            symbols: HashMap::new(),
            captured_at: 10_000,
        };
        assert!(snap.is_fresh(5, 14_999));
        assert!(snap.is_fresh(5, 15_000));
        assert!(!snap.is_fresh(5, 15_001));
        // A snapshot from the future is fresh.
        assert!(snap.is_fresh(5, 9_000));
    }
}
