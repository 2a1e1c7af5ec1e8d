//! Public game operations: bet intake and the read queries the API serves.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{RoundManager, RoundSnapshot};
use crate::errors::{GameError, GameResult};
use crate::period::Period;
use crate::store::{BetStore, HistoryStore, RoundStore, Store, UserStore};
use crate::types::{Bet, BetSelection, HistoryRecord, Round, UpcomingRound};

/// A successfully placed bet together with the balance after the debit.
#[derive(Debug, Clone)]
pub struct PlacedBet {
    pub bet: Bet,
    pub balance: f64,
}

/// Facade the API layer calls. Validation happens here; atomicity happens in
/// the store; round-open checks go through the lifecycle manager.
pub struct GameService {
    store: Arc<dyn Store>,
    manager: Arc<RoundManager>,
    max_query_limit: usize,
}

impl GameService {
    pub fn new(store: Arc<dyn Store>, manager: Arc<RoundManager>, max_query_limit: usize) -> Self {
        Self {
            store,
            manager,
            max_query_limit,
        }
    }

    /// Validate and place a bet against an open round, debiting the stake
    /// atomically. Nothing is written when any check fails.
    pub async fn place_bet(
        &self,
        user_id: &str,
        period: Period,
        selection: BetSelection,
        amount: f64,
        multiplier: f64,
    ) -> GameResult<PlacedBet> {
        if !selection.is_valid() {
            return Err(GameError::InvalidBet(
                "number selection must be between 0 and 9".to_string(),
            ));
        }
        if !(amount > 0.0) {
            return Err(GameError::InvalidBet("amount must be positive".to_string()));
        }
        if !(multiplier >= 1.0) {
            return Err(GameError::InvalidBet(
                "multiplier must be at least 1".to_string(),
            ));
        }

        if self.store.user(user_id).await?.is_none() {
            return Err(GameError::UserNotFound(user_id.to_string()));
        }

        let now = Utc::now();
        let bet = Bet {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            period,
            selection,
            amount,
            multiplier,
            placed_at: now,
            result: None,
        };
        // The manager performs the open-round check and the debit under one
        // guard; an already-resolved period never accepts new stakes.
        let balance = self.manager.place_bet(&bet, now).await?;
        info!(
            bet_id = %bet.id,
            user_id = %bet.user_id,
            period = %bet.period,
            selection = %bet.selection,
            amount = bet.amount,
            "bet placed"
        );
        Ok(PlacedBet { bet, balance })
    }

    /// Snapshot of the current round, `None` between server start and the
    /// first open.
    pub async fn current_round(&self) -> Option<RoundSnapshot> {
        self.manager.current_snapshot(Utc::now()).await
    }

    /// The next `n` round windows (n clamped to the configured maximum).
    pub async fn upcoming_periods(&self, n: usize) -> Vec<UpcomingRound> {
        let n = n.clamp(1, self.max_query_limit);
        self.manager.upcoming_periods(Utc::now(), n).await
    }

    /// Completed rounds, most recent first.
    pub async fn round_history(&self, limit: usize) -> GameResult<Vec<Round>> {
        let limit = limit.clamp(1, self.max_query_limit);
        self.store.completed_rounds(limit).await
    }

    /// A user's bets, most recent first.
    pub async fn user_bets(&self, user_id: &str, limit: usize) -> GameResult<Vec<Bet>> {
        let limit = limit.clamp(1, self.max_query_limit);
        debug!(user_id, limit, "loading user bets");
        self.store.bets_for_user(user_id, limit).await
    }

    /// A user's settlement records, most recent first.
    pub async fn user_history(&self, user_id: &str, limit: usize) -> GameResult<Vec<HistoryRecord>> {
        let limit = limit.clamp(1, self.max_query_limit);
        self.store.history_for_user(user_id, limit).await
    }

    pub async fn user_balance(&self, user_id: &str) -> GameResult<f64> {
        let user = self
            .store
            .user(user_id)
            .await?
            .ok_or_else(|| GameError::UserNotFound(user_id.to_string()))?;
        Ok(user.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoundConfig;
    use crate::engine::SettlementEngine;
    use crate::outcome::OutcomeResolver;
    use crate::store::{MemoryStore, UserStore};
    use crate::types::{Color, UserAccount};

    async fn service_with_round() -> (Arc<MemoryStore>, GameService, Period) {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_user(&UserAccount {
                id: "alice".to_string(),
                name: "Alice".to_string(),
                balance: 500.0,
            })
            .await
            .unwrap();

        let manager = Arc::new(RoundManager::new(
            store.clone(),
            OutcomeResolver::new(store.clone()),
            SettlementEngine::new(store.clone()),
            &RoundConfig::default(),
        ));
        let round = manager.open_round(Utc::now()).await.unwrap();
        let service = GameService::new(store.clone(), manager, 100);
        (store, service, round.period)
    }

    #[tokio::test]
    async fn test_place_bet_happy_path() {
        let (_store, service, period) = service_with_round().await;
        let placed = service
            .place_bet("alice", period, BetSelection::Color(Color::Red), 100.0, 1.0)
            .await
            .unwrap();
        assert_eq!(placed.balance, 400.0);
        assert!(placed.bet.result.is_none());

        let bets = service.user_bets("alice", 10).await.unwrap();
        assert_eq!(bets.len(), 1);
    }

    #[tokio::test]
    async fn test_place_bet_validation_order() {
        let (_store, service, period) = service_with_round().await;

        assert!(matches!(
            service
                .place_bet("alice", period.clone(), BetSelection::Number(12), 10.0, 1.0)
                .await,
            Err(GameError::InvalidBet(_))
        ));
        assert!(matches!(
            service
                .place_bet("alice", period.clone(), BetSelection::Color(Color::Red), 0.0, 1.0)
                .await,
            Err(GameError::InvalidBet(_))
        ));
        assert!(matches!(
            service
                .place_bet("alice", period.clone(), BetSelection::Color(Color::Red), 10.0, 0.5)
                .await,
            Err(GameError::InvalidBet(_))
        ));
        assert!(matches!(
            service
                .place_bet("ghost", period, BetSelection::Color(Color::Red), 10.0, 1.0)
                .await,
            Err(GameError::UserNotFound(_))
        ));

        // None of the rejected attempts moved money.
        assert_eq!(service.user_balance("alice").await.unwrap(), 500.0);
    }

    #[tokio::test]
    async fn test_bet_against_stale_period_is_rejected() {
        let (_store, service, _period) = service_with_round().await;
        let stale = Period::from("20200101000032".to_string());
        assert!(matches!(
            service
                .place_bet("alice", stale, BetSelection::Color(Color::Red), 10.0, 1.0)
                .await,
            Err(GameError::RoundClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_balance_unchanged() {
        let (_store, service, period) = service_with_round().await;
        assert!(matches!(
            service
                .place_bet("alice", period, BetSelection::Color(Color::Red), 900.0, 1.0)
                .await,
            Err(GameError::InsufficientBalance { .. })
        ));
        assert_eq!(service.user_balance("alice").await.unwrap(), 500.0);
        assert!(service.user_bets("alice", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_limits_are_clamped() {
        let (_store, service, _period) = service_with_round().await;
        assert_eq!(service.upcoming_periods(10_000).await.len(), 100);
        assert_eq!(service.upcoming_periods(0).await.len(), 1);
    }
}
