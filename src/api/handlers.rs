//! HTTP handlers. Thin wrappers over `GameService`; validation and money
//! movement live below this layer.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use std::sync::Arc;
use tracing::debug;

use super::errors::ApiError;
use super::middleware::RequestId;
use super::models::{
    BalanceResponse, CompletedRoundView, CountQuery, CurrentRoundResponse, HealthResponse,
    LimitQuery, PlaceBetRequest, PlaceBetResponse, RoundHistoryResponse, UpcomingRoundsResponse,
    UserBetsQuery, UserBetsResponse, UserHistoryResponse,
};
use super::monitoring::MetricsRegistry;
use crate::engine::EventBus;
use crate::service::GameService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GameService>,
    pub events: EventBus,
    pub metrics: Arc<MetricsRegistry>,
    pub version: String,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
    })
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let body = state.metrics.to_prometheus_format();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

pub async fn current_round_handler(State(state): State<AppState>) -> Json<CurrentRoundResponse> {
    Json(CurrentRoundResponse {
        round: state.service.current_round().await,
    })
}

pub async fn upcoming_rounds_handler(
    State(state): State<AppState>,
    Query(query): Query<CountQuery>,
) -> Json<UpcomingRoundsResponse> {
    Json(UpcomingRoundsResponse {
        rounds: state.service.upcoming_periods(query.count).await,
    })
}

pub async fn round_history_handler(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<RoundHistoryResponse>, ApiError> {
    let rounds = state
        .service
        .round_history(query.limit)
        .await
        .map_err(|err| ApiError::from_game(request_id, err))?;
    Ok(Json(RoundHistoryResponse {
        rounds: rounds
            .iter()
            .filter_map(CompletedRoundView::from_round)
            .collect(),
    }))
}

pub async fn place_bet_handler(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Json(request): Json<PlaceBetRequest>,
) -> Result<Json<PlaceBetResponse>, ApiError> {
    debug!(request_id = %request_id, user_id = %request.user_id, "bet request received");
    let placed = state
        .service
        .place_bet(
            &request.user_id,
            request.period,
            request.selection,
            request.amount,
            request.multiplier,
        )
        .await
        .map_err(|err| ApiError::from_game(request_id, err))?;

    state.metrics.record_bet(placed.bet.amount);
    Ok(Json(PlaceBetResponse {
        bet_id: placed.bet.id,
        period: placed.bet.period,
        amount: placed.bet.amount,
        multiplier: placed.bet.multiplier,
        balance: placed.balance,
    }))
}

pub async fn user_bets_handler(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(user_id): Path<String>,
    Query(query): Query<UserBetsQuery>,
) -> Result<Json<UserBetsResponse>, ApiError> {
    let bets = state
        .service
        .user_bets(&user_id, query.limit)
        .await
        .map_err(|err| ApiError::from_game(request_id, err))?;
    Ok(Json(UserBetsResponse { bets }))
}

pub async fn user_history_handler(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(user_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<UserHistoryResponse>, ApiError> {
    let records = state
        .service
        .user_history(&user_id, query.limit)
        .await
        .map_err(|err| ApiError::from_game(request_id, err))?;
    Ok(Json(UserHistoryResponse { records }))
}

pub async fn user_balance_handler(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state
        .service
        .user_balance(&user_id)
        .await
        .map_err(|err| ApiError::from_game(request_id, err))?;
    Ok(Json(BalanceResponse { user_id, balance }))
}
