//! Bet settlement: scoring against a resolved round and paying winners.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::{GameError, GameResult};
use crate::period::Period;
use crate::store::{BetStore, Store};
use crate::types::{Bet, BetResult, BetSelection, Color, HistoryRecord, Round, RoundOutcome};

/// Payout ratio for a winning bet, keyed by what was staked on.
///
/// Violet is the rare color (2 of 10 numbers), hence the longer odds.
pub fn payout_ratio(selection: &BetSelection) -> f64 {
    match selection {
        BetSelection::Color(Color::Violet) => 4.5,
        BetSelection::Color(_) => 2.0,
        BetSelection::Number(_) => 9.0,
        BetSelection::Size(_) => 2.0,
    }
}

/// Score a single bet against the round outcome. Pure; losers pay 0.
pub fn score_bet(bet: &Bet, outcome: &RoundOutcome, settled_at: DateTime<Utc>) -> BetResult {
    let won = match bet.selection {
        BetSelection::Color(color) => color == outcome.color,
        BetSelection::Number(number) => number == outcome.number,
        BetSelection::Size(size) => size == outcome.size,
    };
    let payout = if won {
        bet.amount * bet.multiplier * payout_ratio(&bet.selection)
    } else {
        0.0
    };
    BetResult {
        won,
        payout,
        settled_at,
    }
}

/// Outcome of one settlement pass over a round.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementReport {
    pub period: Period,
    pub settled: usize,
    /// Bets already carrying a result (re-run of an earlier pass).
    pub skipped: usize,
    pub failed: usize,
    pub total_paid: f64,
}

/// Settles every bet placed against a resolved round, exactly once each.
pub struct SettlementEngine {
    store: Arc<dyn Store>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// One pass over the round's bets. A failure on one bet is logged and
    /// skipped; it never aborts the rest of the batch. Safe to re-run: bets
    /// that already have a result are left alone.
    pub async fn settle_round(&self, round: &Round) -> GameResult<SettlementReport> {
        let outcome = round
            .outcome
            .ok_or_else(|| GameError::RoundInProgress(round.period.clone()))?;
        let bets = self.store.bets_for_period(&round.period).await?;
        let settled_at = Utc::now();

        let mut report = SettlementReport {
            period: round.period.clone(),
            settled: 0,
            skipped: 0,
            failed: 0,
            total_paid: 0.0,
        };

        for bet in bets {
            if bet.result.is_some() {
                report.skipped += 1;
                continue;
            }
            let result = score_bet(&bet, &outcome, settled_at);
            let history = HistoryRecord::from_settled(&bet, &result);
            match self.store.settle_bet(bet.id, &result, &history).await {
                Ok(true) => {
                    report.settled += 1;
                    report.total_paid += result.payout;
                }
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        bet_id = %bet.id,
                        user_id = %bet.user_id,
                        "skipping bet that failed to settle: {}",
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            period = %report.period,
            settled = report.settled,
            skipped = report.skipped,
            failed = report.failed,
            total_paid = report.total_paid,
            "round settled"
        );
        Ok(report)
    }
}
