//! In-memory backend for tests and development mode.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BetStore, HistoryStore, OverrideStore, RoundStore, UserStore};
use crate::errors::{GameError, GameResult, StoreError};
use crate::period::Period;
use crate::types::{Bet, BetResult, HistoryRecord, Round, ScheduledOutcome, UserAccount};

/// DashMap-backed store. Balance read-modify-write is serialized through a
/// per-user async mutex, mirroring the row-level locking the durable backend
/// provides.
#[derive(Default)]
pub struct MemoryStore {
    rounds: DashMap<Period, Round>,
    bets: DashMap<Uuid, Bet>,
    users: DashMap<String, UserAccount>,
    overrides: DashMap<Uuid, ScheduledOutcome>,
    history: DashMap<String, Vec<HistoryRecord>>,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Test hook: insert a bet record directly, bypassing balance checks.
    pub fn insert_bet_unchecked(&self, bet: Bet) {
        self.bets.insert(bet.id, bet);
    }
}

#[async_trait]
impl RoundStore for MemoryStore {
    async fn insert_round(&self, round: &Round) -> GameResult<()> {
        match self.rounds.entry(round.period.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(GameError::DuplicatePeriod(round.period.clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(round.clone());
                Ok(())
            }
        }
    }

    async fn update_round(&self, round: &Round) -> GameResult<()> {
        let mut entry = self.rounds.get_mut(&round.period).ok_or_else(|| {
            StoreError::NotFound(format!("round {}", round.period))
        })?;
        *entry = round.clone();
        Ok(())
    }

    async fn round(&self, period: &Period) -> GameResult<Option<Round>> {
        Ok(self.rounds.get(period).map(|r| r.clone()))
    }

    async fn current_round(&self) -> GameResult<Option<Round>> {
        Ok(self
            .rounds
            .iter()
            .find(|r| !r.is_completed)
            .map(|r| r.clone()))
    }

    async fn completed_rounds(&self, limit: usize) -> GameResult<Vec<Round>> {
        let mut rounds: Vec<Round> = self
            .rounds
            .iter()
            .filter(|r| r.is_completed)
            .map(|r| r.clone())
            .collect();
        rounds.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        rounds.truncate(limit);
        Ok(rounds)
    }
}

#[async_trait]
impl BetStore for MemoryStore {
    async fn place_bet(&self, bet: &Bet) -> GameResult<f64> {
        let lock = self.user_lock(&bet.user_id);
        let _guard = lock.lock().await;

        let mut user = self
            .users
            .get_mut(&bet.user_id)
            .ok_or_else(|| GameError::UserNotFound(bet.user_id.clone()))?;
        if user.balance < bet.amount {
            return Err(GameError::InsufficientBalance {
                balance: user.balance,
                required: bet.amount,
            });
        }

        user.balance -= bet.amount;
        let balance = user.balance;
        drop(user);

        self.bets.insert(bet.id, bet.clone());
        Ok(balance)
    }

    async fn settle_bet(
        &self,
        bet_id: Uuid,
        result: &BetResult,
        history: &HistoryRecord,
    ) -> GameResult<bool> {
        let user_id = {
            let bet = self
                .bets
                .get(&bet_id)
                .ok_or_else(|| StoreError::NotFound(format!("bet {}", bet_id)))?;
            if bet.result.is_some() {
                return Ok(false);
            }
            bet.user_id.clone()
        };

        let lock = self.user_lock(&user_id);
        let _guard = lock.lock().await;

        // Re-check under the lock: a concurrent settler may have won the race.
        let mut bet = self
            .bets
            .get_mut(&bet_id)
            .ok_or_else(|| StoreError::NotFound(format!("bet {}", bet_id)))?;
        if bet.result.is_some() {
            return Ok(false);
        }

        if result.won {
            let mut user = self
                .users
                .get_mut(&user_id)
                .ok_or_else(|| GameError::UserNotFound(user_id.clone()))?;
            user.balance += result.payout;
        }

        bet.result = Some(result.clone());
        drop(bet);

        self.history
            .entry(user_id)
            .or_default()
            .push(history.clone());
        Ok(true)
    }

    async fn bets_for_period(&self, period: &Period) -> GameResult<Vec<Bet>> {
        let mut bets: Vec<Bet> = self
            .bets
            .iter()
            .filter(|b| &b.period == period)
            .map(|b| b.clone())
            .collect();
        bets.sort_by(|a, b| a.placed_at.cmp(&b.placed_at));
        Ok(bets)
    }

    async fn bets_for_user(&self, user_id: &str, limit: usize) -> GameResult<Vec<Bet>> {
        let mut bets: Vec<Bet> = self
            .bets
            .iter()
            .filter(|b| b.user_id == user_id)
            .map(|b| b.clone())
            .collect();
        bets.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        bets.truncate(limit);
        Ok(bets)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn user(&self, user_id: &str) -> GameResult<Option<UserAccount>> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn upsert_user(&self, user: &UserAccount) -> GameResult<()> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }
}

#[async_trait]
impl OverrideStore for MemoryStore {
    async fn active_override(&self, now: DateTime<Utc>) -> GameResult<Option<ScheduledOutcome>> {
        Ok(self
            .overrides
            .iter()
            .filter(|o| o.applies_at(now))
            .max_by_key(|o| o.start_time)
            .map(|o| o.clone()))
    }

    async fn insert_override(&self, outcome: &ScheduledOutcome) -> GameResult<()> {
        if outcome.number > 9 {
            return Err(GameError::InvalidOverride(format!(
                "number {} is outside 0-9",
                outcome.number
            )));
        }
        self.overrides.insert(outcome.id, outcome.clone());
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn history_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> GameResult<Vec<HistoryRecord>> {
        let mut records = self
            .history
            .get(user_id)
            .map(|h| h.clone())
            .unwrap_or_default();
        records.sort_by(|a, b| b.settled_at.cmp(&a.settled_at));
        records.truncate(limit);
        Ok(records)
    }
}
