//! Round-scoped wager ledger.
//!
//! Money moves before state: a wager only enters the round hash after the
//! wallet debit succeeded, and a cancel only refunds after the wager left the
//! hash. Both hash mutations run as atomic scripts inside the store, so two
//! instances can serve the same player concurrently.

use crate::rtp::RtpTracker;
use crate::session::Session;
use crate::store::{read_json, StateStore};
use crate::wallet::{CreditKind, CreditRequest, DebitRequest, TransactionStatus, WalletGateway};
use plinko_types::events::{BetReceipt, CancelReceipt};
use plinko_types::wager::MAX_SYMBOLS_PER_WAGER;
use plinko_types::{keys, now_ms, BetError, RoundState, Wager};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use uuid::Uuid;

/// Wager hash lifetime past its round.
pub const WAGER_TTL: Duration = Duration::from_secs(300);

pub struct WagerLedger {
    store: Arc<dyn StateStore>,
    wallet: Arc<dyn WalletGateway>,
    rtp: Arc<RtpTracker>,
    game: String,
}

impl WagerLedger {
    pub fn new(
        store: Arc<dyn StateStore>,
        wallet: Arc<dyn WalletGateway>,
        rtp: Arc<RtpTracker>,
        game: String,
    ) -> Self {
        Self {
            store,
            wallet,
            rtp,
            game,
        }
    }

    pub async fn place_bet(
        &self,
        market: &str,
        session: &Session,
        amount: f64,
        symbols: Vec<String>,
    ) -> Result<BetReceipt, BetError> {
        if !(amount > 0.0) || !amount.is_finite() {
            return Err(BetError::InvalidAmount);
        }
        if symbols.is_empty() || symbols.len() > MAX_SYMBOLS_PER_WAGER {
            return Err(BetError::InvalidSelection);
        }
        let distinct: HashSet<&String> = symbols.iter().collect();
        if distinct.len() != symbols.len() {
            return Err(BetError::InvalidSelection);
        }

        let state = self.betting_round(market).await?;
        let transaction_id = Uuid::new_v4().to_string();
        let debit = DebitRequest {
            session_token: session.session_token.clone(),
            bet_amount: amount,
            currency: session.currency.clone(),
            transaction_id: transaction_id.clone(),
            player_id: Some(session.player_id.clone()),
            tenant_id: Some(session.tenant_id.clone()),
            metadata: Some(json!({
                "game": self.game.clone(),
                "roundId": state.round_id.clone(),
                "symbols": symbols.clone(),
                "tenantId": session.tenant_id.clone(),
            })),
        };
        let reply = self.wallet.debit(&debit).await.map_err(|err| {
            warn!(market, player = %session.player_id, error = %err, "wallet debit failed");
            BetError::WalletUnavailable
        })?;
        if reply.status != TransactionStatus::Success {
            return Err(BetError::InsufficientBalance);
        }

        self.rtp.record_bet(market, amount).await;

        let wager = Wager {
            transaction_id: transaction_id.clone(),
            player_id: session.player_id.clone(),
            tenant_id: session.tenant_id.clone(),
            session_token: session.session_token.clone(),
            currency: session.currency.clone(),
            amount,
            symbols,
            placed_at: now_ms(),
        };
        let wager_json = match serde_json::to_string(&wager) {
            Ok(json) => json,
            Err(err) => {
                error!(market, tx = %transaction_id, error = %err, "wager encoding failed after debit");
                self.rollback_debit(session, &wager).await;
                return Err(BetError::WalletUnavailable);
            }
        };
        let bets_key = keys::bets(market, &state.round_id);
        if let Err(err) = self
            .store
            .wager_append(&bets_key, &session.player_id, &wager_json, WAGER_TTL)
            .await
        {
            // The debit already happened; undo it rather than keep money
            // with no recorded wager.
            error!(market, tx = %transaction_id, error = %err, "wager append failed after debit");
            self.rollback_debit(session, &wager).await;
            return Err(BetError::WalletUnavailable);
        }

        Ok(BetReceipt {
            status: "ACCEPTED".into(),
            new_balance: reply.new_balance,
            round_id: state.round_id,
            transaction_id,
        })
    }

    pub async fn cancel_bet(
        &self,
        market: &str,
        session: &Session,
        transaction_id: &str,
    ) -> Result<CancelReceipt, BetError> {
        let state = self.betting_round(market).await?;
        let bets_key = keys::bets(market, &state.round_id);
        let removed = self
            .store
            .wager_remove(&bets_key, &session.player_id, transaction_id)
            .await
            .map_err(|err| {
                // Nothing was removed; the player can retry.
                warn!(market, tx = transaction_id, error = %err, "wager remove failed");
                BetError::WalletUnavailable
            })?;
        let Some(removed) = removed else {
            return Err(BetError::NotFound);
        };
        let wager: Wager = serde_json::from_str(&removed).map_err(|err| {
            error!(market, tx = transaction_id, error = %err, "removed wager is corrupt, cannot refund");
            BetError::CancellationFailed
        })?;

        let credit = CreditRequest {
            session_token: session.session_token.clone(),
            win_amount: wager.amount,
            currency: wager.currency.clone(),
            transaction_id: Uuid::new_v4().to_string(),
            player_id: Some(session.player_id.clone()),
            tenant_id: Some(session.tenant_id.clone()),
            kind: CreditKind::Refund,
            metadata: Some(json!({
                "reason": "user_cancel",
                "originalBetId": wager.transaction_id.clone(),
            })),
        };
        match self.wallet.credit(&credit).await {
            Ok(reply) if reply.status == TransactionStatus::Success => Ok(CancelReceipt {
                status: "CANCELLED".into(),
                refund_amount: wager.amount,
                new_balance: reply.new_balance,
            }),
            Ok(_) => {
                error!(market, tx = transaction_id, "refund credit declined, wager already removed");
                Err(BetError::CancellationFailed)
            }
            Err(err) => {
                error!(market, tx = transaction_id, error = %err, "refund credit failed, wager already removed");
                Err(BetError::CancellationFailed)
            }
        }
    }

    /// The market's current round, provided wagers are open for it.
    /// A store failure fails closed.
    async fn betting_round(&self, market: &str) -> Result<RoundState, BetError> {
        let state = read_json::<RoundState>(&*self.store, &keys::state(market))
            .await
            .map_err(|err| {
                warn!(market, error = %err, "round state read failed");
                BetError::BettingClosed
            })?;
        let Some(state) = state else {
            return Err(BetError::BettingClosed);
        };
        if !state.phase.accepts_wagers() || now_ms() >= state.end_time {
            return Err(BetError::BettingClosed);
        }
        Ok(state)
    }

    /// Undo a debit whose wager never reached the hash.
    async fn rollback_debit(&self, session: &Session, wager: &Wager) {
        let credit = CreditRequest {
            session_token: session.session_token.clone(),
            win_amount: wager.amount,
            currency: wager.currency.clone(),
            transaction_id: Uuid::new_v4().to_string(),
            player_id: Some(session.player_id.clone()),
            tenant_id: Some(session.tenant_id.clone()),
            kind: CreditKind::Refund,
            metadata: Some(json!({
                "reason": "bet_rollback",
                "originalBetId": wager.transaction_id.clone(),
            })),
        };
        if let Err(err) = self.wallet.credit(&credit).await {
            error!(
                tx = %wager.transaction_id,
                error = %err,
                "rollback credit failed; debit stands without a wager"
            );
        }
    }
}
