//! WebSocket fan-out of round events.
//!
//! Clients receive every `GameEvent` as JSON. Countdown ticks are noisy, so
//! `?ticks=false` (or a `{"ticks": false}` message at any point) mutes them
//! for clients that only want opens and results.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use super::handlers::AppState;
use crate::engine::GameEvent;

#[derive(Debug, Clone, Deserialize)]
pub struct WsQuery {
    #[serde(default = "default_ticks")]
    pub ticks: bool,
}

/// In-band subscription update; absent fields leave the setting unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct WsSubscription {
    pub ticks: Option<bool>,
}

fn default_ticks() -> bool {
    true
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

async fn handle_socket(socket: WebSocket, state: AppState, query: WsQuery) {
    state.metrics.websocket_opened();
    debug!(ticks = query.ticks, "websocket client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();
    let mut ticks = query.ticks;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(GameEvent::CountdownTick { .. }) if !ticks => continue,
                    Ok(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(payload) => payload,
                            Err(err) => {
                                warn!(error = %err, "failed to serialize event");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    // Slow client fell behind the broadcast buffer; resume
                    // from the current position rather than dropping it.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket client lagged, skipping events");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(subscription) = serde_json::from_str::<WsSubscription>(&text) {
                            if let Some(want_ticks) = subscription.ticks {
                                ticks = want_ticks;
                            }
                        }
                    }
                    // Binary frames are ignored; events only flow outward.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.metrics.websocket_closed();
    debug!("websocket client disconnected");
}
