//! Durable backend on RocksDB.
//!
//! JSON values under printable prefix keys. Secondary indexes embed an
//! inverted millisecond timestamp (`u64::MAX - ts`, big-endian hex) so a
//! forward prefix scan yields newest-first ordering. Multi-key mutations go
//! through a single `WriteBatch`, which keeps the money-moving operations
//! crash-atomic; a per-user mutex serializes balance read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{BetStore, HistoryStore, OverrideStore, RoundStore, UserStore};
use crate::config::StorageConfig;
use crate::errors::{GameError, GameResult, StoreError};
use crate::period::Period;
use crate::types::{Bet, BetResult, HistoryRecord, Round, ScheduledOutcome, UserAccount};

const ROUND_PREFIX: &str = "round:period:";
const ROUND_CURRENT_KEY: &[u8] = b"round:current";
const ROUND_COMPLETED_PREFIX: &str = "round:index:completed:";
const BET_PREFIX: &str = "bet:id:";
const BET_PERIOD_INDEX_PREFIX: &str = "bet:index:period:";
const BET_USER_INDEX_PREFIX: &str = "bet:index:user:";
const USER_PREFIX: &str = "user:";
const OVERRIDE_PREFIX: &str = "override:";
const HISTORY_PREFIX: &str = "history:user:";

pub struct RocksStore {
    db: Arc<DB>,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

fn inverted_ts(t: DateTime<Utc>) -> String {
    let millis = t.timestamp_millis().max(0) as u64;
    hex::encode((u64::MAX - millis).to_be_bytes())
}

impl RocksStore {
    pub fn open<P: AsRef<Path>>(path: P, config: &StorageConfig) -> GameResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path).map_err(StoreError::from)?;
        Ok(Self {
            db: Arc::new(db),
            user_locks: DashMap::new(),
        })
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut rows = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
            if rows.len() >= limit {
                break;
            }
        }
        Ok(rows)
    }

    fn load_bet(&self, bet_id: Uuid) -> Result<Option<Bet>, StoreError> {
        self.get_json(format!("{}{}", BET_PREFIX, bet_id).as_bytes())
    }

    fn load_user(&self, user_id: &str) -> Result<Option<UserAccount>, StoreError> {
        self.get_json(format!("{}{}", USER_PREFIX, user_id).as_bytes())
    }

    /// The trailing key segment after the last `:` separator.
    fn key_suffix(key: &[u8]) -> Option<&str> {
        let text = std::str::from_utf8(key).ok()?;
        text.rsplit(':').next()
    }
}

#[async_trait]
impl RoundStore for RocksStore {
    async fn insert_round(&self, round: &Round) -> GameResult<()> {
        let key = format!("{}{}", ROUND_PREFIX, round.period);
        if self.db.get(key.as_bytes()).map_err(StoreError::from)?.is_some() {
            return Err(GameError::DuplicatePeriod(round.period.clone()));
        }

        let bytes = serde_json::to_vec(round).map_err(StoreError::from)?;
        let mut batch = WriteBatch::default();
        batch.put(key.as_bytes(), &bytes);
        batch.put(ROUND_CURRENT_KEY, round.period.as_str().as_bytes());
        self.db.write(batch).map_err(StoreError::from)?;
        Ok(())
    }

    async fn update_round(&self, round: &Round) -> GameResult<()> {
        let key = format!("{}{}", ROUND_PREFIX, round.period);
        if self.db.get(key.as_bytes()).map_err(StoreError::from)?.is_none() {
            return Err(StoreError::NotFound(format!("round {}", round.period)).into());
        }

        let bytes = serde_json::to_vec(round).map_err(StoreError::from)?;
        let mut batch = WriteBatch::default();
        batch.put(key.as_bytes(), &bytes);
        if round.is_completed {
            batch.delete(ROUND_CURRENT_KEY);
            let index_key = format!(
                "{}{}:{}",
                ROUND_COMPLETED_PREFIX,
                inverted_ts(round.start_time),
                round.period
            );
            batch.put(index_key.as_bytes(), round.period.as_str().as_bytes());
        }
        self.db.write(batch).map_err(StoreError::from)?;
        Ok(())
    }

    async fn round(&self, period: &Period) -> GameResult<Option<Round>> {
        Ok(self.get_json(format!("{}{}", ROUND_PREFIX, period).as_bytes())?)
    }

    async fn current_round(&self) -> GameResult<Option<Round>> {
        let Some(bytes) = self.db.get(ROUND_CURRENT_KEY).map_err(StoreError::from)? else {
            return Ok(None);
        };
        let period = Period::from(
            String::from_utf8(bytes)
                .map_err(|e| StoreError::Inconsistent(format!("current round pointer: {}", e)))?,
        );
        let round: Option<Round> = self.get_json(format!("{}{}", ROUND_PREFIX, period).as_bytes())?;
        // A stale pointer left by a partial shutdown is treated as absent.
        Ok(round.filter(|r| !r.is_completed))
    }

    async fn completed_rounds(&self, limit: usize) -> GameResult<Vec<Round>> {
        let rows = self.scan_prefix(ROUND_COMPLETED_PREFIX, limit)?;
        let mut rounds = Vec::with_capacity(rows.len());
        for (_key, value) in rows {
            let period = Period::from(
                String::from_utf8(value)
                    .map_err(|e| StoreError::Inconsistent(format!("completed index: {}", e)))?,
            );
            if let Some(round) = self.get_json(format!("{}{}", ROUND_PREFIX, period).as_bytes())? {
                rounds.push(round);
            }
        }
        Ok(rounds)
    }
}

#[async_trait]
impl BetStore for RocksStore {
    async fn place_bet(&self, bet: &Bet) -> GameResult<f64> {
        let lock = self.user_lock(&bet.user_id);
        let _guard = lock.lock().await;

        let mut user = self
            .load_user(&bet.user_id)?
            .ok_or_else(|| GameError::UserNotFound(bet.user_id.clone()))?;
        if user.balance < bet.amount {
            return Err(GameError::InsufficientBalance {
                balance: user.balance,
                required: bet.amount,
            });
        }
        user.balance -= bet.amount;

        let mut batch = WriteBatch::default();
        batch.put(
            format!("{}{}", USER_PREFIX, user.id).as_bytes(),
            &serde_json::to_vec(&user).map_err(StoreError::from)?,
        );
        batch.put(
            format!("{}{}", BET_PREFIX, bet.id).as_bytes(),
            &serde_json::to_vec(bet).map_err(StoreError::from)?,
        );
        batch.put(
            format!("{}{}:{}", BET_PERIOD_INDEX_PREFIX, bet.period, bet.id).as_bytes(),
            b"",
        );
        batch.put(
            format!(
                "{}{}:{}:{}",
                BET_USER_INDEX_PREFIX,
                bet.user_id,
                inverted_ts(bet.placed_at),
                bet.id
            )
            .as_bytes(),
            b"",
        );
        self.db.write(batch).map_err(StoreError::from)?;
        Ok(user.balance)
    }

    async fn settle_bet(
        &self,
        bet_id: Uuid,
        result: &BetResult,
        history: &HistoryRecord,
    ) -> GameResult<bool> {
        let bet = self
            .load_bet(bet_id)?
            .ok_or_else(|| StoreError::NotFound(format!("bet {}", bet_id)))?;
        if bet.result.is_some() {
            return Ok(false);
        }

        let lock = self.user_lock(&bet.user_id);
        let _guard = lock.lock().await;

        // Re-check under the lock so a retried settlement cannot pay twice.
        let mut bet = self
            .load_bet(bet_id)?
            .ok_or_else(|| StoreError::NotFound(format!("bet {}", bet_id)))?;
        if bet.result.is_some() {
            return Ok(false);
        }
        bet.result = Some(result.clone());

        let mut batch = WriteBatch::default();
        if result.won {
            let mut user = self
                .load_user(&bet.user_id)?
                .ok_or_else(|| GameError::UserNotFound(bet.user_id.clone()))?;
            user.balance += result.payout;
            batch.put(
                format!("{}{}", USER_PREFIX, user.id).as_bytes(),
                &serde_json::to_vec(&user).map_err(StoreError::from)?,
            );
        }
        batch.put(
            format!("{}{}", BET_PREFIX, bet.id).as_bytes(),
            &serde_json::to_vec(&bet).map_err(StoreError::from)?,
        );
        batch.put(
            format!(
                "{}{}:{}:{}",
                HISTORY_PREFIX,
                bet.user_id,
                inverted_ts(result.settled_at),
                bet.id
            )
            .as_bytes(),
            &serde_json::to_vec(history).map_err(StoreError::from)?,
        );
        self.db.write(batch).map_err(StoreError::from)?;
        Ok(true)
    }

    async fn bets_for_period(&self, period: &Period) -> GameResult<Vec<Bet>> {
        let prefix = format!("{}{}:", BET_PERIOD_INDEX_PREFIX, period);
        let rows = self.scan_prefix(&prefix, usize::MAX)?;
        let mut bets = Vec::with_capacity(rows.len());
        for (key, _value) in rows {
            let Some(id_text) = Self::key_suffix(&key) else {
                continue;
            };
            let bet_id = Uuid::parse_str(id_text)
                .map_err(|e| StoreError::Inconsistent(format!("bet index key: {}", e)))?;
            if let Some(bet) = self.load_bet(bet_id)? {
                bets.push(bet);
            }
        }
        bets.sort_by(|a, b| a.placed_at.cmp(&b.placed_at));
        Ok(bets)
    }

    async fn bets_for_user(&self, user_id: &str, limit: usize) -> GameResult<Vec<Bet>> {
        let prefix = format!("{}{}:", BET_USER_INDEX_PREFIX, user_id);
        let rows = self.scan_prefix(&prefix, limit)?;
        let mut bets = Vec::with_capacity(rows.len());
        for (key, _value) in rows {
            let Some(id_text) = Self::key_suffix(&key) else {
                continue;
            };
            let bet_id = Uuid::parse_str(id_text)
                .map_err(|e| StoreError::Inconsistent(format!("bet index key: {}", e)))?;
            if let Some(bet) = self.load_bet(bet_id)? {
                bets.push(bet);
            }
        }
        Ok(bets)
    }
}

#[async_trait]
impl UserStore for RocksStore {
    async fn user(&self, user_id: &str) -> GameResult<Option<UserAccount>> {
        Ok(self.load_user(user_id)?)
    }

    async fn upsert_user(&self, user: &UserAccount) -> GameResult<()> {
        let bytes = serde_json::to_vec(user).map_err(StoreError::from)?;
        self.db
            .put(format!("{}{}", USER_PREFIX, user.id).as_bytes(), &bytes)
            .map_err(StoreError::from)?;
        Ok(())
    }
}

#[async_trait]
impl OverrideStore for RocksStore {
    async fn active_override(&self, now: DateTime<Utc>) -> GameResult<Option<ScheduledOutcome>> {
        let rows = self.scan_prefix(OVERRIDE_PREFIX, usize::MAX)?;
        let mut best: Option<ScheduledOutcome> = None;
        for (_key, value) in rows {
            let outcome: ScheduledOutcome =
                serde_json::from_slice(&value).map_err(StoreError::from)?;
            if !outcome.applies_at(now) {
                continue;
            }
            if best
                .as_ref()
                .map(|b| outcome.start_time > b.start_time)
                .unwrap_or(true)
            {
                best = Some(outcome);
            }
        }
        Ok(best)
    }

    async fn insert_override(&self, outcome: &ScheduledOutcome) -> GameResult<()> {
        if outcome.number > 9 {
            return Err(GameError::InvalidOverride(format!(
                "number {} is outside 0-9",
                outcome.number
            )));
        }
        let bytes = serde_json::to_vec(outcome).map_err(StoreError::from)?;
        // Most recently started sorts first, matching the tie-break rule.
        let key = format!(
            "{}{}:{}",
            OVERRIDE_PREFIX,
            inverted_ts(outcome.start_time),
            outcome.id
        );
        self.db
            .put(key.as_bytes(), &bytes)
            .map_err(StoreError::from)?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for RocksStore {
    async fn history_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> GameResult<Vec<HistoryRecord>> {
        let prefix = format!("{}{}:", HISTORY_PREFIX, user_id);
        let rows = self.scan_prefix(&prefix, limit)?;
        let mut records = Vec::with_capacity(rows.len());
        for (_key, value) in rows {
            records.push(serde_json::from_slice(&value).map_err(StoreError::from)?);
        }
        Ok(records)
    }
}
