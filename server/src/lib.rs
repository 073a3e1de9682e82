//! The Plinko market engine service.
//!
//! Hosts one round loop per configured market, the realtime WebSocket
//! surface, and the wallet/store plumbing. Cross-instance coordination runs
//! entirely through the shared state store: a per-market lease keeps loops
//! single-writer, and all shared mutations are atomic store operations.

pub mod api;
pub mod config;
pub mod game_loop;
pub mod ledger;
pub mod lease;
pub mod metrics;
pub mod mocks;
pub mod payout;
pub mod rooms;
pub mod rtp;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod wallet;

pub use api::{Api, AppState};
pub use config::Args;
pub use game_loop::MarketLoop;
