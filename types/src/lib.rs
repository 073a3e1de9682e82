//! Shared domain types for the Plinko market engine.
//!
//! Everything here is plain data: round state, wagers, realtime events,
//! RTP metrics, and the game configuration. All wire and persisted shapes
//! are JSON via serde, with camelCase field names to match the client
//! protocol and the shared state store layout.

pub mod config;
pub mod error;
pub mod events;
pub mod keys;
pub mod round;
pub mod rtp;
pub mod wager;

pub use config::GameConfig;
pub use error::BetError;
pub use events::{ClientMessage, MarketStatus, ServerEvent};
pub use round::{Phase, RoundState, Snapshot, StockState, SymbolQuote, SymbolResult};
pub use rtp::RtpMetrics;
pub use wager::Wager;

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
