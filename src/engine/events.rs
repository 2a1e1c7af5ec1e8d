//! In-process broadcast of round transitions.
//!
//! Fire-and-forget, at-least-once: receivers must tolerate duplicate ticks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::period::Period;
use crate::types::{Color, Size};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Events the scheduler publishes as a round moves through its lifecycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    RoundOpened {
        period: Period,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration_secs: u64,
    },
    CountdownTick {
        period: Period,
        seconds_left: u64,
    },
    RoundResult {
        period: Period,
        winning_number: u8,
        winning_color: Color,
        size: Size,
        /// Sum of payouts credited when the round settled.
        total_paid: f64,
    },
}

/// Thin wrapper over a tokio broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GameEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Send to whoever is listening. Zero receivers is not an error.
    pub fn emit(&self, event: GameEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_receivers_is_fine() {
        let bus = EventBus::new();
        bus.emit(GameEvent::CountdownTick {
            period: Period::at(Utc::now()),
            seconds_left: 10,
        });
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let period = Period::at(Utc::now());
        for seconds_left in (1..=3).rev() {
            bus.emit(GameEvent::CountdownTick {
                period: period.clone(),
                seconds_left,
            });
        }
        for expected in (1..=3).rev() {
            match rx.recv().await.unwrap() {
                GameEvent::CountdownTick { seconds_left, .. } => {
                    assert_eq!(seconds_left, expected)
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }
}
