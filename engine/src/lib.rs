//! Pure decision logic for the Plinko market engine.
//!
//! This crate is deterministic and free of I/O. It provides:
//! - the round phase state machine ([`phase`]),
//! - the multiplier zone partition ([`zones`]),
//! - the RTP-governed slot decision engine ([`decision`]),
//! - the payout settlement math ([`payout`]).
//!
//! Randomness is injected by the caller, so every code path can be driven
//! deterministically in tests.

pub mod decision;
pub mod payout;
pub mod phase;
pub mod zones;

pub use decision::{compute_delta, DecisionEngine, SymbolDelta};
pub use payout::{settle_player, PlayerSettlement};
pub use phase::{PhaseClock, TransitionResult};
pub use zones::ZoneMap;
