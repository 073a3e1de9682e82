//! Payout settlement math.
//!
//! A wager's stake splits evenly across its chosen symbols; each share pays
//! the multiplier the round assigned to that symbol. Symbols missing from the
//! result map pay nothing.

use plinko_types::events::BetBreakdown;
use plinko_types::Wager;
use std::collections::HashMap;

/// Settled totals for one player in one round.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerSettlement {
    pub total_wager: f64,
    pub total_payout: f64,
    pub bets: Vec<BetBreakdown>,
}

/// Settle all of one player's wagers against the round's result multipliers.
pub fn settle_player(wagers: &[Wager], multipliers: &HashMap<String, f64>) -> PlayerSettlement {
    let mut settlement = PlayerSettlement::default();
    for wager in wagers {
        let per_symbol = wager.amount_per_symbol();
        let win: f64 = wager
            .symbols
            .iter()
            .map(|symbol| per_symbol * multipliers.get(symbol).copied().unwrap_or(0.0))
            .sum();
        settlement.total_wager += wager.amount;
        settlement.total_payout += win;
        settlement.bets.push(BetBreakdown {
            bet_id: wager.transaction_id.clone(),
            symbols: wager.symbols.clone(),
            wager: wager.amount,
            payout: win,
            multiplier: if wager.amount > 0.0 { win / wager.amount } else { 0.0 },
        });
    }
    settlement
}
