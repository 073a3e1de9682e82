//! Realtime protocol: events the engine produces and messages it consumes.
//!
//! Server events serialize as `{"event": "...", "data": {...}}`; client
//! messages arrive as `{"action": "...", ...}`. Market-room events fan out to
//! every socket joined to the market; payout and bet receipts go only to the
//! player's balance room or the originating socket.

use crate::round::RoundState;
use serde::{Deserialize, Serialize};

/// One line of the per-bet payout breakdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetBreakdown {
    pub bet_id: String,
    pub symbols: Vec<String>,
    pub wager: f64,
    pub payout: f64,
    /// Effective multiplier for the whole bet: `payout / wager`.
    pub multiplier: f64,
}

/// Aggregated payout event for one player in one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutEvent {
    pub round_id: String,
    pub currency: String,
    pub total_wager: f64,
    pub total_payout: f64,
    pub net_profit: f64,
    pub bets: Vec<BetBreakdown>,
}

/// Market availability, broadcast on circuit-breaker trips and recoveries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStatus {
    pub status: MarketAvailability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketAvailability {
    Open,
    Closed,
}

/// Reply to a successful `place_bet`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetReceipt {
    pub status: String,
    pub new_balance: f64,
    pub round_id: String,
    pub transaction_id: String,
}

/// Reply to a successful `cancel_bet`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelReceipt {
    pub status: String,
    pub refund_amount: f64,
    pub new_balance: f64,
}

/// Error surfaced to the originating client, never broadcast.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientError {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
    pub message: String,
}

/// Round-level error broadcast to the market room (e.g. cancellation).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundError {
    pub code: String,
    pub message: String,
}

/// Every event the engine emits over the realtime transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "game:state")]
    GameState(RoundState),
    #[serde(rename = "game:payout")]
    Payout(PayoutEvent),
    #[serde(rename = "game:error")]
    GameError(RoundError),
    #[serde(rename = "market-status")]
    MarketStatus(MarketStatus),
    #[serde(rename = "bet:accepted")]
    BetAccepted(BetReceipt),
    #[serde(rename = "bet:cancelled")]
    BetCancelled(CancelReceipt),
    #[serde(rename = "bet:error")]
    BetError(ClientError),
}

/// Messages a client may send over the socket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    PlaceBet {
        amount: f64,
        stocks: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    CancelBet { transaction_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::Phase;

    #[test]
    fn server_event_wire_shape() {
        let event = ServerEvent::MarketStatus(MarketStatus {
            status: MarketAvailability::Closed,
            reason: Some("stale market data".into()),
            timestamp: 5,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"market-status\""));
        assert!(json.contains("\"status\":\"CLOSED\""));
    }

    #[test]
    fn client_messages_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"place_bet","amount":25.0,"stocks":["AAPL","TSLA"]}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::PlaceBet {
                amount: 25.0,
                stocks: vec!["AAPL".into(), "TSLA".into()],
            }
        );
        let msg: ClientMessage =
            serde_json::from_str(r#"{"action":"cancel_bet","transactionId":"tx-9"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CancelBet {
                transaction_id: "tx-9".into()
            }
        );
    }

    #[test]
    fn game_state_event_embeds_blob() {
        let event = ServerEvent::GameState(RoundState {
            phase: Phase::Payout,
            round_id: "r".into(),
            server_time: 1,
            end_time: 2,
            stocks: vec![],
            can_unbet: false,
            message: None,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"game:state\""));
        assert!(json.contains("\"phase\":\"PAYOUT\""));
    }
}
