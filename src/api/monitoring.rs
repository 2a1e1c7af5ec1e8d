//! Metrics registry with Prometheus text export.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

use tracing::debug;

use crate::engine::{EventBus, GameEvent};

/// Game and transport counters, exported at `/metrics`.
#[derive(Clone)]
pub struct MetricsRegistry {
    pub rounds_opened_total: Arc<AtomicU64>,
    pub rounds_completed_total: Arc<AtomicU64>,
    pub bets_placed_total: Arc<AtomicU64>,
    pub total_wagered: Arc<Mutex<f64>>,
    pub total_paid: Arc<Mutex<f64>>,
    pub http_requests_total: Arc<AtomicU64>,
    pub websocket_connections_active: Arc<AtomicU64>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            rounds_opened_total: Arc::new(AtomicU64::new(0)),
            rounds_completed_total: Arc::new(AtomicU64::new(0)),
            bets_placed_total: Arc::new(AtomicU64::new(0)),
            total_wagered: Arc::new(Mutex::new(0.0)),
            total_paid: Arc::new(Mutex::new(0.0)),
            http_requests_total: Arc::new(AtomicU64::new(0)),
            websocket_connections_active: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record_http_request(&self) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bet(&self, amount: f64) {
        self.bets_placed_total.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut wagered) = self.total_wagered.lock() {
            *wagered += amount;
        }
    }

    pub fn record_payout(&self, amount: f64) {
        if let Ok(mut paid) = self.total_paid.lock() {
            *paid += amount;
        }
    }

    pub fn websocket_opened(&self) {
        self.websocket_connections_active
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn websocket_closed(&self) {
        self.websocket_connections_active
            .fetch_sub(1, Ordering::Relaxed);
    }

    /// Count round events off the event bus so game counters stay accurate
    /// no matter which code path drove the round.
    pub fn start_event_counter(self: &Arc<Self>, events: &EventBus) {
        let registry = self.clone();
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                match event {
                    GameEvent::RoundOpened { .. } => {
                        registry.rounds_opened_total.fetch_add(1, Ordering::Relaxed);
                    }
                    GameEvent::RoundResult { total_paid, .. } => {
                        registry
                            .rounds_completed_total
                            .fetch_add(1, Ordering::Relaxed);
                        registry.record_payout(total_paid);
                    }
                    GameEvent::CountdownTick { .. } => {}
                }
            }
            debug!("metrics event counter stopped");
        });
    }

    /// Prometheus exposition format.
    pub fn to_prometheus_format(&self) -> String {
        let total_wagered = self.total_wagered.lock().map(|v| *v).unwrap_or(0.0);
        let total_paid = self.total_paid.lock().map(|v| *v).unwrap_or(0.0);

        let mut output = String::new();
        output.push_str(&format!(
            "# HELP colorwin_rounds_opened_total Rounds opened since start\n\
             # TYPE colorwin_rounds_opened_total counter\n\
             colorwin_rounds_opened_total {}\n\n",
            self.rounds_opened_total.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "# HELP colorwin_rounds_completed_total Rounds resolved and settled\n\
             # TYPE colorwin_rounds_completed_total counter\n\
             colorwin_rounds_completed_total {}\n\n",
            self.rounds_completed_total.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "# HELP colorwin_bets_placed_total Bets accepted\n\
             # TYPE colorwin_bets_placed_total counter\n\
             colorwin_bets_placed_total {}\n\n",
            self.bets_placed_total.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "# HELP colorwin_total_wagered Sum of accepted stakes\n\
             # TYPE colorwin_total_wagered counter\n\
             colorwin_total_wagered {}\n\n",
            total_wagered
        ));
        output.push_str(&format!(
            "# HELP colorwin_total_paid Sum of winning payouts\n\
             # TYPE colorwin_total_paid counter\n\
             colorwin_total_paid {}\n\n",
            total_paid
        ));
        output.push_str(&format!(
            "# HELP colorwin_http_requests_total HTTP requests served\n\
             # TYPE colorwin_http_requests_total counter\n\
             colorwin_http_requests_total {}\n\n",
            self.http_requests_total.load(Ordering::Relaxed)
        ));
        output.push_str(&format!(
            "# HELP colorwin_websocket_connections_active Live WebSocket connections\n\
             # TYPE colorwin_websocket_connections_active gauge\n\
             colorwin_websocket_connections_active {}\n",
            self.websocket_connections_active.load(Ordering::Relaxed)
        ));
        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_export_contains_counters() {
        let registry = MetricsRegistry::new();
        registry.record_bet(150.0);
        registry.record_bet(50.0);
        registry.record_payout(250.0);
        registry.record_http_request();
        registry.websocket_opened();

        let text = registry.to_prometheus_format();
        assert!(text.contains("colorwin_bets_placed_total 2"));
        assert!(text.contains("colorwin_total_wagered 200"));
        assert!(text.contains("colorwin_total_paid 250"));
        assert!(text.contains("colorwin_http_requests_total 1"));
        assert!(text.contains("colorwin_websocket_connections_active 1"));
    }

    #[tokio::test]
    async fn test_event_counter_tracks_round_events() {
        let registry = Arc::new(MetricsRegistry::new());
        let events = EventBus::new();
        registry.start_event_counter(&events);

        // Let the counter task subscribe before emitting.
        tokio::task::yield_now().await;
        events.emit(GameEvent::RoundOpened {
            period: crate::period::Period::from("20260821143032".to_string()),
            start_time: chrono::Utc::now(),
            end_time: chrono::Utc::now(),
            duration_secs: 60,
        });
        events.emit(GameEvent::RoundResult {
            period: crate::period::Period::from("20260821143032".to_string()),
            winning_number: 4,
            winning_color: crate::types::Color::Red,
            size: crate::types::Size::Small,
            total_paid: 420.0,
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(registry.rounds_opened_total.load(Ordering::Relaxed), 1);
        assert_eq!(registry.rounds_completed_total.load(Ordering::Relaxed), 1);
        assert!(registry
            .to_prometheus_format()
            .contains("colorwin_total_paid 420"));
    }
}
