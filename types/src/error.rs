//! Domain errors surfaced to the realtime transport.

use crate::events::ClientError;
use thiserror::Error;

/// Everything that can go wrong with a player-facing bet operation.
///
/// These map one-to-one onto the error codes the client protocol documents;
/// they are sent to the originating socket only.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BetError {
    #[error("betting is closed for this round")]
    BettingClosed,
    #[error("bet amount must be greater than zero")]
    InvalidAmount,
    #[error("select between 1 and 20 distinct symbols")]
    InvalidSelection,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("wallet is unavailable, try again")]
    WalletUnavailable,
    #[error("no wager with that transaction id")]
    NotFound,
    #[error("cancellation failed, contact support")]
    CancellationFailed,
    #[error("authentication required")]
    AuthRequired,
    #[error("session is invalid or expired")]
    InvalidSession,
    #[error("market is closed")]
    MarketClosed,
}

impl BetError {
    pub fn code(&self) -> &'static str {
        match self {
            BetError::BettingClosed => "BETTING_CLOSED",
            BetError::InvalidAmount => "INVALID_AMOUNT",
            BetError::InvalidSelection => "INVALID_SELECTION",
            BetError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            BetError::WalletUnavailable => "WALLET_UNAVAILABLE",
            BetError::NotFound => "NOT_FOUND",
            BetError::CancellationFailed => "CANCELLATION_FAILED",
            BetError::AuthRequired => "AUTH_REQUIRED",
            BetError::InvalidSession => "INVALID_SESSION",
            BetError::MarketClosed => "MARKET_CLOSED",
        }
    }

    /// Shape this error for the originating client.
    pub fn to_client_error(&self) -> ClientError {
        ClientError {
            kind: "bet_error".into(),
            code: self.code().into(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_shape() {
        let err = BetError::InsufficientBalance.to_client_error();
        assert_eq!(err.kind, "bet_error");
        assert_eq!(err.code, "INSUFFICIENT_BALANCE");
        assert!(!err.message.is_empty());
    }
}
