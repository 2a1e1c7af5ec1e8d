//! Core domain types for the color game.
//!
//! Rounds, bets, user accounts and scheduled outcomes as they are persisted
//! and served over the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::period::Period;

/// Color partition of the 0-9 outcome space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Red,
    Violet,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Green => write!(f, "green"),
            Color::Red => write!(f, "red"),
            Color::Violet => write!(f, "violet"),
        }
    }
}

/// Size partition of the 0-9 outcome space: 5-9 are big, 0-4 small.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    Big,
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Small => write!(f, "small"),
            Size::Big => write!(f, "big"),
        }
    }
}

/// What a bet is staked on.
///
/// Wire format keeps the `bet_type` / `bet_value` field pair, e.g.
/// `{"bet_type": "color", "bet_value": "red"}` or
/// `{"bet_type": "number", "bet_value": 7}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "bet_type", content = "bet_value", rename_all = "lowercase")]
pub enum BetSelection {
    Color(Color),
    Number(u8),
    Size(Size),
}

impl BetSelection {
    /// A number selection must land inside the 0-9 outcome space.
    pub fn is_valid(&self) -> bool {
        match self {
            BetSelection::Number(n) => *n <= 9,
            _ => true,
        }
    }
}

impl fmt::Display for BetSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetSelection::Color(c) => write!(f, "color:{}", c),
            BetSelection::Number(n) => write!(f, "number:{}", n),
            BetSelection::Size(s) => write!(f, "size:{}", s),
        }
    }
}

/// Resolved result of a round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub number: u8,
    pub color: Color,
    pub size: Size,
}

/// Derived round state. `Resolving` covers the window after the round's end
/// time but before settlement has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Open,
    Resolving,
    Completed,
}

/// One betting round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub period: Period,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `None` until the round is resolved; written together with
    /// `is_completed` in a single update.
    pub outcome: Option<RoundOutcome>,
    pub is_completed: bool,
}

impl Round {
    /// A freshly opened round with no outcome yet.
    pub fn open(period: Period, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            period,
            start_time,
            end_time,
            outcome: None,
            is_completed: false,
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> RoundStatus {
        if self.is_completed {
            RoundStatus::Completed
        } else if now < self.end_time {
            RoundStatus::Open
        } else {
            RoundStatus::Resolving
        }
    }

    /// Bets are accepted strictly before the end time of an uncompleted round.
    pub fn accepts_bets(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed && now < self.end_time
    }

    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.end_time - now).num_seconds().max(0)
    }
}

/// Projected window of a future round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingRound {
    pub period: Period,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// A user's stake on one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub id: Uuid,
    pub user_id: String,
    pub period: Period,
    pub selection: BetSelection,
    pub amount: f64,
    pub multiplier: f64,
    pub placed_at: DateTime<Utc>,
    /// Settlement verdict, written exactly once when the round resolves.
    pub result: Option<BetResult>,
}

/// Outcome of settling a single bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetResult {
    pub won: bool,
    pub payout: f64,
    pub settled_at: DateTime<Utc>,
}

/// Player account. The balance only moves through the store's atomic
/// debit/credit operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: String,
    pub name: String,
    pub balance: f64,
}

/// Lifecycle state of a scheduled outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

/// Operator-scheduled outcome. While its window contains the resolution time
/// and its status is scheduled or active, it forces the winning number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledOutcome {
    pub id: Uuid,
    pub number: u8,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: OverrideStatus,
}

impl ScheduledOutcome {
    /// Whether this override applies at `now`.
    pub fn applies_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, OverrideStatus::Scheduled | OverrideStatus::Active)
            && self.start_time <= now
            && now < self.end_time
    }
}

/// Per-user settlement history row, appended once per settled bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub user_id: String,
    pub bet_id: Uuid,
    pub period: Period,
    pub selection: BetSelection,
    pub amount: f64,
    pub won: bool,
    pub payout: f64,
    pub settled_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Builds the history row for a bet that carries a settlement result.
    pub fn from_settled(bet: &Bet, result: &BetResult) -> Self {
        Self {
            user_id: bet.user_id.clone(),
            bet_id: bet.id,
            period: bet.period.clone(),
            selection: bet.selection,
            amount: bet.amount,
            won: result.won,
            payout: result.payout,
            settled_at: result.settled_at,
        }
    }
}
