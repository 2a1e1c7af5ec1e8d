//! Round lifecycle: the single mutable "current round" slot and the
//! open/inspect/close operations around it.
//!
//! Only the scheduler transitions the slot; every other task reads a cloned
//! snapshot. Read paths never write.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::settlement::{SettlementEngine, SettlementReport};
use crate::config::RoundConfig;
use crate::errors::{GameError, GameResult};
use crate::outcome::OutcomeResolver;
use crate::period::Period;
use crate::store::{BetStore, RoundStore, Store};
use crate::types::{Bet, Round, RoundStatus, UpcomingRound};

/// Read-only view of the current round at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct RoundSnapshot {
    pub period: Period,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: RoundStatus,
    pub time_left_secs: i64,
    pub is_active: bool,
}

impl RoundSnapshot {
    fn of(round: &Round, now: DateTime<Utc>) -> Self {
        let time_left_secs = round.seconds_remaining(now);
        Self {
            period: round.period.clone(),
            start_time: round.start_time,
            end_time: round.end_time,
            status: round.status(now),
            time_left_secs,
            is_active: round.accepts_bets(now),
        }
    }
}

/// Owns the current round. `Open -> Resolving -> Completed`, strictly in
/// timestamp order, with at most one uncompleted round at any instant.
pub struct RoundManager {
    store: Arc<dyn Store>,
    resolver: OutcomeResolver,
    settlement: SettlementEngine,
    duration: ChronoDuration,
    cooldown: ChronoDuration,
    current: RwLock<Option<Round>>,
}

impl RoundManager {
    pub fn new(
        store: Arc<dyn Store>,
        resolver: OutcomeResolver,
        settlement: SettlementEngine,
        round_config: &RoundConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            settlement,
            duration: ChronoDuration::seconds(round_config.duration_secs as i64),
            cooldown: ChronoDuration::seconds(round_config.cooldown_secs as i64),
            current: RwLock::new(None),
        }
    }

    /// Open a new round starting at `now` and install it as current.
    ///
    /// The round is persisted before the slot is updated, so a storage
    /// failure never leaves a phantom round as current.
    pub async fn open_round(&self, now: DateTime<Utc>) -> GameResult<Round> {
        let mut guard = self.current.write().await;
        if let Some(existing) = guard.as_ref() {
            if !existing.is_completed {
                return Err(GameError::RoundInProgress(existing.period.clone()));
            }
        }

        let round = Round::open(Period::at(now), now, now + self.duration);
        self.store.insert_round(&round).await?;
        *guard = Some(round.clone());
        Ok(round)
    }

    /// Snapshot of the current round, `None` if no round was ever opened.
    pub async fn current_snapshot(&self, now: DateTime<Utc>) -> Option<RoundSnapshot> {
        let guard = self.current.read().await;
        guard.as_ref().map(|round| RoundSnapshot::of(round, now))
    }

    /// Synthesize the next `n` round windows by chaining forward from the
    /// current round's end. Pure; persists nothing.
    pub async fn upcoming_periods(&self, now: DateTime<Utc>, n: usize) -> Vec<UpcomingRound> {
        let guard = self.current.read().await;
        let mut start = match guard.as_ref() {
            Some(round) => round.end_time + self.cooldown,
            None => now,
        };
        drop(guard);

        let mut upcoming = Vec::with_capacity(n);
        for _ in 0..n {
            let end = start + self.duration;
            upcoming.push(UpcomingRound {
                period: Period::at(start),
                start_time: start,
                end_time: end,
            });
            start = end + self.cooldown;
        }
        upcoming
    }

    /// Place a bet against the currently open round, returning the balance
    /// after the debit.
    ///
    /// The open check and the store write happen under one read guard of the
    /// current-round lock, so a concurrent close either waits this placement
    /// out or rejects it outright. A debited bet is therefore always visible
    /// to the settlement pass.
    pub async fn place_bet(&self, bet: &Bet, now: DateTime<Utc>) -> GameResult<f64> {
        let guard = self.current.read().await;
        match guard.as_ref() {
            Some(round) if round.period == bet.period => {
                if !round.accepts_bets(now) {
                    return Err(GameError::RoundClosed {
                        period: bet.period.clone(),
                    });
                }
            }
            Some(_) => {
                return Err(GameError::RoundClosed {
                    period: bet.period.clone(),
                })
            }
            None => return Err(GameError::NoActiveRound),
        }
        self.store.place_bet(bet).await
    }

    /// Resolve the current round's outcome, persist it and settle its bets.
    /// Returns the completed round with its settlement report.
    ///
    /// Re-entrant safe: when the current round is already completed this
    /// re-runs only the (idempotent) settlement pass, so a duplicate timer
    /// fire cannot double-pay and a failed settlement can be retried.
    pub async fn close_and_resolve(
        &self,
        now: DateTime<Utc>,
    ) -> GameResult<(Round, SettlementReport)> {
        // The write guard stays held through settlement: placements hold the
        // read guard across their store write, so none can land between the
        // bets snapshot and the payout batch.
        let mut guard = self.current.write().await;
        let Some(round) = guard.as_ref() else {
            return Err(GameError::NoActiveRound);
        };

        if round.is_completed {
            let completed = round.clone();
            let report = self.settlement.settle_round(&completed).await?;
            return Ok((completed, report));
        }

        let outcome = self.resolver.resolve(now).await;
        let mut completed = round.clone();
        completed.outcome = Some(outcome);
        completed.is_completed = true;
        // Outcome and completion flag land in one update.
        self.store.update_round(&completed).await?;
        *guard = Some(completed.clone());

        let report = self.settlement.settle_round(&completed).await?;
        Ok((completed, report))
    }

    /// Startup recovery: adopt an uncompleted round left behind by a crash.
    /// If its window already ended, resolve and settle it immediately so the
    /// loop starts from a clean slate. Returns the round that was closed.
    pub async fn recover(&self, now: DateTime<Utc>) -> GameResult<Option<Round>> {
        let Some(existing) = self.store.current_round().await? else {
            return Ok(None);
        };

        if existing.end_time <= now {
            warn!(period = %existing.period, "recovering expired round left by previous run");
            *self.current.write().await = Some(existing.clone());
            let (completed, _report) = self.close_and_resolve(now).await?;
            Ok(Some(completed))
        } else {
            info!(period = %existing.period, "resuming open round from previous run");
            *self.current.write().await = Some(existing);
            Ok(None)
        }
    }
}
