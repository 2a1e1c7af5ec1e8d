//! The round engine: lifecycle state machine, settlement, events and the
//! timer loop that drives them.

pub mod events;
pub mod lifecycle;
pub mod scheduler;
pub mod settlement;

pub use events::{EventBus, GameEvent};
pub use lifecycle::{RoundManager, RoundSnapshot};
pub use scheduler::GameScheduler;
pub use settlement::{score_bet, SettlementEngine, SettlementReport};
