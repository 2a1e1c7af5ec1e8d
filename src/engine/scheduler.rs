//! The timer loop that drives rounds end to end.
//!
//! open -> broadcast -> per-second countdown -> close/resolve/settle ->
//! broadcast result -> cooldown -> repeat. Failures are logged and the whole
//! iteration retries after the cooldown; the loop never dies on a transient
//! error.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use super::events::{EventBus, GameEvent};
use super::lifecycle::RoundManager;
use crate::config::RoundConfig;
use crate::errors::{GameError, GameResult};

pub struct GameScheduler {
    manager: Arc<RoundManager>,
    events: EventBus,
    duration_secs: u64,
    cooldown: Duration,
    running: AtomicBool,
}

impl GameScheduler {
    pub fn new(manager: Arc<RoundManager>, events: EventBus, round_config: &RoundConfig) -> Self {
        Self {
            manager,
            events,
            duration_secs: round_config.duration_secs,
            cooldown: Duration::from_secs(round_config.cooldown_secs),
            running: AtomicBool::new(false),
        }
    }

    /// Spawn the loop. Exactly one loop per scheduler: a second call while
    /// one is alive is a configuration error.
    ///
    /// The shutdown channel is graceful: a round in flight is closed and
    /// settled before the task exits.
    pub fn start(
        self: &Arc<Self>,
        shutdown: watch::Receiver<bool>,
    ) -> GameResult<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GameError::SchedulerAlreadyRunning);
        }

        let scheduler = Arc::clone(self);
        Ok(tokio::spawn(async move {
            scheduler.run(shutdown).await;
            scheduler.running.store(false, Ordering::SeqCst);
            info!("round scheduler stopped");
        }))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            duration_secs = self.duration_secs,
            cooldown_secs = self.cooldown.as_secs(),
            "round scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let round = match self.manager.open_round(Utc::now()).await {
                Ok(round) => round,
                Err(e) => {
                    error!("failed to open round, retrying after cooldown: {}", e);
                    if self.wait_cooldown(&mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };
            info!(period = %round.period, end = %round.end_time, "round opened");
            self.events.emit(GameEvent::RoundOpened {
                period: round.period.clone(),
                start_time: round.start_time,
                end_time: round.end_time,
                duration_secs: self.duration_secs,
            });

            // Countdown: one tick per second, duration down to 1. A counter
            // rather than clock math keeps ticks monotonic if timers coalesce.
            let mut seconds_left = self.duration_secs;
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await; // first tick completes immediately
            while seconds_left > 0 {
                self.events.emit(GameEvent::CountdownTick {
                    period: round.period.clone(),
                    seconds_left,
                });
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            // Stop counting and close the round out now.
                            break;
                        }
                    }
                }
                seconds_left -= 1;
            }

            // Close, resolve and settle. Retried in place so a transient
            // storage failure cannot strand an unresolved round; settlement
            // idempotency makes the retries safe.
            loop {
                match self.manager.close_and_resolve(Utc::now()).await {
                    Ok((completed, report)) => {
                        if let Some(outcome) = completed.outcome {
                            info!(
                                period = %completed.period,
                                number = outcome.number,
                                color = %outcome.color,
                                size = %outcome.size,
                                total_paid = report.total_paid,
                                "round resolved"
                            );
                            self.events.emit(GameEvent::RoundResult {
                                period: completed.period.clone(),
                                winning_number: outcome.number,
                                winning_color: outcome.color,
                                size: outcome.size,
                                total_paid: report.total_paid,
                            });
                        }
                        break;
                    }
                    Err(e) => {
                        error!("failed to close round, retrying after cooldown: {}", e);
                        self.wait_cooldown(&mut shutdown).await;
                        if *shutdown.borrow() {
                            // Leave the round for startup recovery rather
                            // than spinning against a dead store forever.
                            warn!("shutdown requested with round unresolved, deferring to recovery");
                            return;
                        }
                    }
                }
            }

            if *shutdown.borrow() {
                break;
            }
            if self.wait_cooldown(&mut shutdown).await {
                break;
            }
        }
    }

    /// Sleep for the cooldown, waking early on shutdown. Returns whether
    /// shutdown was requested.
    async fn wait_cooldown(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.cooldown) => {}
            _ = shutdown.changed() => {}
        }
        *shutdown.borrow()
    }
}
