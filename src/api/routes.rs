//! Route definitions.

use axum::{
    middleware::{self, Next},
    routing::{get, post},
    Router,
};

use super::handlers::{
    current_round_handler, health_handler, metrics_handler, place_bet_handler,
    round_history_handler, upcoming_rounds_handler, user_balance_handler, user_bets_handler,
    user_history_handler, AppState,
};
use super::websocket::ws_handler;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/rounds/current", get(current_round_handler))
        .route("/api/v1/rounds/upcoming", get(upcoming_rounds_handler))
        .route("/api/v1/rounds/history", get(round_history_handler))
        .route("/api/v1/bets", post(place_bet_handler))
        .route("/api/v1/users/:user_id/bets", get(user_bets_handler))
        .route("/api/v1/users/:user_id/history", get(user_history_handler))
        .route("/api/v1/users/:user_id/balance", get(user_balance_handler))
        .route("/ws", get(ws_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            count_requests,
        ))
        .with_state(state)
}

async fn count_requests(
    axum::extract::State(state): axum::extract::State<AppState>,
    request: axum::extract::Request,
    next: Next,
) -> axum::response::Response {
    state.metrics.record_http_request();
    next.run(request).await
}
