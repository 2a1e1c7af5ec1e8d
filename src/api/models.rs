//! Request and response models for the API endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::RoundSnapshot;
use crate::period::Period;
use crate::types::{Bet, BetSelection, Round, UpcomingRound};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Current round state; `round` is null before the first round opens.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentRoundResponse {
    pub round: Option<RoundSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpcomingRoundsResponse {
    pub rounds: Vec<UpcomingRound>,
}

/// A completed round as served in history listings.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedRoundView {
    pub period: Period,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub winning_number: u8,
    pub winning_color: crate::types::Color,
    pub size: crate::types::Size,
}

impl CompletedRoundView {
    /// Only completed rounds have a view; open ones are filtered out.
    pub fn from_round(round: &Round) -> Option<Self> {
        let outcome = round.outcome?;
        Some(Self {
            period: round.period.clone(),
            start_time: round.start_time,
            end_time: round.end_time,
            winning_number: outcome.number,
            winning_color: outcome.color,
            size: outcome.size,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundHistoryResponse {
    pub rounds: Vec<CompletedRoundView>,
}

/// Bet placement request body. The selection keeps the `bet_type` /
/// `bet_value` wire pair via the flattened enum.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceBetRequest {
    pub user_id: String,
    pub period: Period,
    #[serde(flatten)]
    pub selection: BetSelection,
    pub amount: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceBetResponse {
    pub bet_id: Uuid,
    pub period: Period,
    pub amount: f64,
    pub multiplier: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserBetsResponse {
    pub bets: Vec<Bet>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserHistoryResponse {
    pub records: Vec<crate::types::HistoryRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: f64,
}

/// Shared `?limit=` / `?count=` query parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountQuery {
    #[serde(default = "default_count")]
    pub count: usize,
}

/// Per-user bet listings default to a deeper page than round history.
#[derive(Debug, Clone, Deserialize)]
pub struct UserBetsQuery {
    #[serde(default = "default_user_bets_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

fn default_count() -> usize {
    10
}

fn default_user_bets_limit() -> usize {
    50
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Color;

    #[test]
    fn test_place_bet_request_wire_format() {
        let request: PlaceBetRequest = serde_json::from_value(serde_json::json!({
            "user_id": "alice",
            "period": "20260821143032",
            "bet_type": "color",
            "bet_value": "red",
            "amount": 100.0
        }))
        .unwrap();
        assert_eq!(request.selection, BetSelection::Color(Color::Red));
        assert_eq!(request.multiplier, 1.0);
    }

    #[test]
    fn test_completed_round_view_requires_outcome() {
        let start = Utc::now();
        let open = Round::open(Period::at(start), start, start + chrono::Duration::seconds(60));
        assert!(CompletedRoundView::from_round(&open).is_none());
    }
}
