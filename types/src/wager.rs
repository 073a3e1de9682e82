//! Wager records, round-scoped.
//!
//! Wagers live in a hash keyed by player id under
//! `plinko:bets:{market}:{roundId}`; each field value is a JSON list of
//! `Wager`. The list is only ever mutated through the store's atomic
//! append/remove scripts.

use serde::{Deserialize, Serialize};

/// A single player stake on one or more symbols within a round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wager {
    pub transaction_id: String,
    pub player_id: String,
    pub tenant_id: String,
    pub session_token: String,
    pub currency: String,
    pub amount: f64,
    pub symbols: Vec<String>,
    /// Placement time, epoch ms.
    pub placed_at: u64,
}

/// Hard cap on symbols per wager.
pub const MAX_SYMBOLS_PER_WAGER: usize = 20;

impl Wager {
    /// Stake attributed to each chosen symbol.
    pub fn amount_per_symbol(&self) -> f64 {
        if self.symbols.is_empty() {
            0.0
        } else {
            self.amount / self.symbols.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wager(amount: f64, symbols: &[&str]) -> Wager {
        Wager {
            transaction_id: "tx-1".into(),
            player_id: "p1".into(),
            tenant_id: "t1".into(),
            session_token: "s1".into(),
            currency: "USD".into(),
            amount,
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            placed_at: 0,
        }
    }

    #[test]
    fn splits_stake_evenly() {
        assert_eq!(wager(100.0, &["A", "B"]).amount_per_symbol(), 50.0);
        assert_eq!(wager(99.0, &["A", "B", "C"]).amount_per_symbol(), 33.0);
        assert_eq!(wager(10.0, &[]).amount_per_symbol(), 0.0);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&wager(5.0, &["A"])).unwrap();
        assert!(json.contains("\"transactionId\":\"tx-1\""));
        assert!(json.contains("\"placedAt\":0"));
    }
}
