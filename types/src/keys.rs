//! Shared state store key layout.
//!
//! Every key is owned by a market, never by an instance. Round-scoped keys
//! embed the round id and carry a TTL a few minutes past the round so crashed
//! leaders leave nothing behind.

/// Latest round-state blob for a market.
pub fn state(market: &str) -> String {
    format!("plinko:state:{market}")
}

/// Symbol list selected for a round.
pub fn stocks(market: &str, round_id: &str) -> String {
    format!("plinko:{market}:{round_id}:stocks")
}

/// Start snapshot captured at ACCUMULATION entry.
pub fn start_snapshot(market: &str, round_id: &str) -> String {
    format!("plinko:{market}:{round_id}:start_snap")
}

/// Per-symbol result array written at DROPPING entry.
pub fn results(market: &str, round_id: &str) -> String {
    format!("plinko:{market}:{round_id}:results")
}

/// Wager hash, field per player id.
pub fn bets(market: &str, round_id: &str) -> String {
    format!("plinko:bets:{market}:{round_id}")
}

/// Durable RTP counter hash.
pub fn rtp(market: &str) -> String {
    format!("plinko:rtp:{market}")
}

/// Leader lease for the market's round loop.
pub fn lease(market: &str) -> String {
    format!("lock:gameloop:{market}")
}

/// Live market-data snapshot written by the ingestion process.
pub fn snapshot(market: &str) -> String {
    format!("marketdata:snapshot:{market}")
}

/// Session record for an authenticated socket.
pub fn session(token: &str) -> String {
    format!("session:{token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_protocol() {
        assert_eq!(state("CryptoStream"), "plinko:state:CryptoStream");
        assert_eq!(bets("M", "r-7"), "plinko:bets:M:r-7");
        assert_eq!(results("M", "r-7"), "plinko:M:r-7:results");
        assert_eq!(lease("M"), "lock:gameloop:M");
    }
}
