//! Crate-wide error taxonomy.
//!
//! `GameError` is what operations surface to callers; `StoreError` wraps
//! backend failures and converts into `GameError` transparently.

use thiserror::Error;

use crate::period::Period;

/// Storage backend failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend: {0}")]
    Backend(String),

    #[error("corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("inconsistent record: {0}")]
    Inconsistent(String),
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Errors surfaced by game operations.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("insufficient balance: have {balance:.2}, need {required:.2}")]
    InsufficientBalance { balance: f64, required: f64 },

    #[error("round {period} is not open for betting")]
    RoundClosed { period: Period },

    #[error("no round is currently open")]
    NoActiveRound,

    #[error("round {0} already exists")]
    DuplicatePeriod(Period),

    #[error("round {0} is still in progress")]
    RoundInProgress(Period),

    #[error("invalid bet: {0}")]
    InvalidBet(String),

    #[error("invalid override: {0}")]
    InvalidOverride(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("scheduler is already running")]
    SchedulerAlreadyRunning,

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts_into_game_error() {
        fn load() -> GameResult<()> {
            Err(StoreError::NotFound("round 20260821143032".to_string()))?;
            Ok(())
        }
        match load() {
            Err(GameError::Store(StoreError::NotFound(msg))) => {
                assert!(msg.contains("20260821143032"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = GameError::InsufficientBalance {
            balance: 12.5,
            required: 100.0,
        };
        assert_eq!(
            err.to_string(),
            "insufficient balance: have 12.50, need 100.00"
        );

        let err = GameError::RoundClosed {
            period: Period::from("20260821143032".to_string()),
        };
        assert!(err.to_string().contains("not open for betting"));
    }
}
