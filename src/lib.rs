//! Recurring color game engine: minute-aligned betting rounds with
//! deterministic period ids, scheduled outcome overrides, atomic bet
//! settlement and an HTTP/WebSocket surface.

pub mod api;
pub mod config;
pub mod engine;
pub mod errors;
pub mod outcome;
pub mod period;
pub mod service;
pub mod store;
pub mod types;

pub use config::GameConfig;
pub use engine::{EventBus, GameEvent, GameScheduler, RoundManager, SettlementEngine};
pub use errors::{GameError, GameResult, StoreError};
pub use outcome::OutcomeResolver;
pub use period::Period;
pub use service::GameService;
pub use store::{MemoryStore, RocksStore, Store};
pub use types::{Bet, BetSelection, Color, Round, RoundOutcome, Size, UserAccount};
