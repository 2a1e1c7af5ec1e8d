//! Outcome resolution: the number -> color/size partition and the draw policy.
//!
//! The winning number is a uniform draw over 0-9 unless an operator has
//! scheduled an override whose time window covers the resolution instant.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::store::OverrideStore;
use crate::types::{Color, RoundOutcome, Size};

pub const GREEN_NUMBERS: [u8; 4] = [1, 3, 7, 9];
pub const RED_NUMBERS: [u8; 4] = [2, 4, 6, 8];
pub const VIOLET_NUMBERS: [u8; 2] = [0, 5];

/// Full partition of the outcome space, indexed by winning number.
static COLOR_TABLE: Lazy<[Color; 10]> = Lazy::new(|| {
    let mut table = [Color::Violet; 10];
    for n in GREEN_NUMBERS {
        table[n as usize] = Color::Green;
    }
    for n in RED_NUMBERS {
        table[n as usize] = Color::Red;
    }
    table
});

/// Color for a winning number. Anything outside the green/red sets is violet.
pub fn color_of(number: u8) -> Color {
    COLOR_TABLE
        .get(number as usize)
        .copied()
        .unwrap_or(Color::Violet)
}

/// Size for a winning number: 5-9 big, 0-4 small.
pub fn size_of(number: u8) -> Size {
    if number >= 5 {
        Size::Big
    } else {
        Size::Small
    }
}

/// Derive the complete outcome for a winning number.
pub fn outcome_of(number: u8) -> RoundOutcome {
    RoundOutcome {
        number,
        color: color_of(number),
        size: size_of(number),
    }
}

/// Picks the winning number for a round: scheduled override if one covers
/// `now`, random draw otherwise.
pub struct OutcomeResolver {
    overrides: Arc<dyn OverrideStore>,
}

impl OutcomeResolver {
    pub fn new(overrides: Arc<dyn OverrideStore>) -> Self {
        Self { overrides }
    }

    /// Resolution never fails: an unavailable override source degrades to
    /// the random draw so round completion is never blocked.
    pub async fn resolve(&self, now: DateTime<Utc>) -> RoundOutcome {
        let number = match self.overrides.active_override(now).await {
            Ok(Some(scheduled)) => {
                info!(
                    number = scheduled.number,
                    start = %scheduled.start_time,
                    "applying scheduled outcome override"
                );
                scheduled.number
            }
            Ok(None) => rand::thread_rng().gen_range(0..=9),
            Err(e) => {
                warn!("override lookup failed, falling back to random draw: {}", e);
                rand::thread_rng().gen_range(0..=9)
            }
        };
        outcome_of(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{OverrideStatus, ScheduledOutcome};
    use chrono::TimeZone;
    use proptest::prelude::*;
    use uuid::Uuid;

    #[test]
    fn test_partition_matches_reference_tables() {
        for n in GREEN_NUMBERS {
            assert_eq!(color_of(n), Color::Green);
        }
        for n in RED_NUMBERS {
            assert_eq!(color_of(n), Color::Red);
        }
        for n in VIOLET_NUMBERS {
            assert_eq!(color_of(n), Color::Violet);
        }
    }

    #[test]
    fn test_size_partition() {
        assert_eq!(size_of(4), Size::Small);
        assert_eq!(size_of(5), Size::Big);
        assert_eq!(size_of(0), Size::Small);
        assert_eq!(size_of(9), Size::Big);
    }

    #[test]
    fn test_out_of_range_number_falls_back_to_violet() {
        assert_eq!(color_of(10), Color::Violet);
        assert_eq!(color_of(255), Color::Violet);
    }

    proptest! {
        #[test]
        fn every_number_maps_to_exactly_one_color_and_size(n in 0u8..=9) {
            let outcome = outcome_of(n);
            let in_green = GREEN_NUMBERS.contains(&n);
            let in_red = RED_NUMBERS.contains(&n);
            let in_violet = VIOLET_NUMBERS.contains(&n);
            prop_assert_eq!(u8::from(in_green) + u8::from(in_red) + u8::from(in_violet), 1);
            match outcome.color {
                Color::Green => prop_assert!(in_green),
                Color::Red => prop_assert!(in_red),
                Color::Violet => prop_assert!(in_violet),
            }
            prop_assert_eq!(outcome.size, if n >= 5 { Size::Big } else { Size::Small });
        }
    }

    #[tokio::test]
    async fn test_random_draw_stays_in_range() {
        let store = Arc::new(MemoryStore::new());
        let resolver = OutcomeResolver::new(store);
        let now = Utc::now();
        for _ in 0..100 {
            let outcome = resolver.resolve(now).await;
            assert!(outcome.number <= 9);
            assert_eq!(outcome.color, color_of(outcome.number));
        }
    }

    #[tokio::test]
    async fn test_scheduled_override_wins_over_random_draw() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc.with_ymd_and_hms(2026, 8, 21, 14, 30, 0).unwrap();
        store
            .insert_override(&ScheduledOutcome {
                id: Uuid::new_v4(),
                number: 7,
                start_time: now - chrono::Duration::seconds(30),
                end_time: now + chrono::Duration::seconds(90),
                status: OverrideStatus::Scheduled,
            })
            .await
            .unwrap();

        let resolver = OutcomeResolver::new(store);
        let outcome = resolver.resolve(now).await;
        assert_eq!(outcome.number, 7);
        assert_eq!(outcome.color, Color::Green);
        assert_eq!(outcome.size, Size::Big);
    }

    #[tokio::test]
    async fn test_most_recently_started_override_takes_precedence() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc.with_ymd_and_hms(2026, 8, 21, 14, 30, 0).unwrap();
        for (number, started_secs_ago) in [(2u8, 300i64), (9, 60)] {
            store
                .insert_override(&ScheduledOutcome {
                    id: Uuid::new_v4(),
                    number,
                    start_time: now - chrono::Duration::seconds(started_secs_ago),
                    end_time: now + chrono::Duration::seconds(600),
                    status: OverrideStatus::Active,
                })
                .await
                .unwrap();
        }

        let resolver = OutcomeResolver::new(store);
        assert_eq!(resolver.resolve(now).await.number, 9);
    }
}
