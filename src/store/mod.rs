//! Persistence abstractions and backends.
//!
//! Each concern gets its own trait; the engine holds a single `Arc<dyn Store>`
//! over the blanket supertrait. Two backends: `MemoryStore` for tests and dev
//! mode, `RocksStore` for durable deployments. The money-moving operations
//! (`place_bet`, `settle_bet`) are atomic within a backend: a partial write
//! can never debit without a bet record or credit without a settlement mark.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::GameResult;
use crate::period::Period;
use crate::types::{Bet, BetResult, HistoryRecord, Round, ScheduledOutcome, UserAccount};

mod memory;
mod rocks;

pub use memory::MemoryStore;
pub use rocks::RocksStore;

/// Round records and the single-slot "current round" pointer.
#[async_trait]
pub trait RoundStore: Send + Sync {
    /// Persist a freshly opened round. Fails with `DuplicatePeriod` if a
    /// round with the same period already exists; never overwrites.
    async fn insert_round(&self, round: &Round) -> GameResult<()>;

    /// Persist an updated round (outcome + completion flag).
    async fn update_round(&self, round: &Round) -> GameResult<()>;

    async fn round(&self, period: &Period) -> GameResult<Option<Round>>;

    /// The at-most-one round with `is_completed == false`.
    async fn current_round(&self) -> GameResult<Option<Round>>;

    /// Completed rounds, most recent first.
    async fn completed_rounds(&self, limit: usize) -> GameResult<Vec<Round>>;
}

/// Bet records plus the balance-moving operations tied to them.
#[async_trait]
pub trait BetStore: Send + Sync {
    /// Atomically: verify the user's balance covers the stake, debit it and
    /// persist the bet. Returns the balance after the debit. Nothing is
    /// written on `InsufficientBalance` or `UserNotFound`.
    async fn place_bet(&self, bet: &Bet) -> GameResult<f64>;

    /// Atomically: record the bet's result, credit the payout on a win and
    /// append the history record. Returns `false` without touching anything
    /// when the bet already carries a result, so retries cannot pay twice.
    async fn settle_bet(
        &self,
        bet_id: Uuid,
        result: &BetResult,
        history: &HistoryRecord,
    ) -> GameResult<bool>;

    async fn bets_for_period(&self, period: &Period) -> GameResult<Vec<Bet>>;

    /// A user's bets, most recent first.
    async fn bets_for_user(&self, user_id: &str, limit: usize) -> GameResult<Vec<Bet>>;
}

/// Player accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user(&self, user_id: &str) -> GameResult<Option<UserAccount>>;

    async fn upsert_user(&self, user: &UserAccount) -> GameResult<()>;
}

/// Operator-scheduled outcome overrides.
#[async_trait]
pub trait OverrideStore: Send + Sync {
    /// The override applying at `now`: window contains `now`, status is
    /// scheduled or active. Ties break to the most recently started.
    async fn active_override(&self, now: DateTime<Utc>) -> GameResult<Option<ScheduledOutcome>>;

    async fn insert_override(&self, outcome: &ScheduledOutcome) -> GameResult<()>;
}

/// Append-only settlement audit trail.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// A user's settlement records, most recent first.
    async fn history_for_user(&self, user_id: &str, limit: usize) -> GameResult<Vec<HistoryRecord>>;
}

/// Everything the engine needs from persistence, behind one object.
pub trait Store: RoundStore + BetStore + UserStore + OverrideStore + HistoryStore {}

impl<T> Store for T where T: RoundStore + BetStore + UserStore + OverrideStore + HistoryStore {}
