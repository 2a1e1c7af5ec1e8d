//! End-to-end round flow: open, bet, override, resolve, settle, audit.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use colorwin::config::RoundConfig;
use colorwin::engine::{RoundManager, SettlementEngine};
use colorwin::outcome::OutcomeResolver;
use colorwin::service::GameService;
use colorwin::store::{
    BetStore, HistoryStore, MemoryStore, OverrideStore, RoundStore, UserStore,
};
use colorwin::types::{
    BetSelection, Color, OverrideStatus, ScheduledOutcome, Size, UserAccount,
};

fn build_manager(store: Arc<MemoryStore>, config: &RoundConfig) -> Arc<RoundManager> {
    Arc::new(RoundManager::new(
        store.clone(),
        OutcomeResolver::new(store.clone()),
        SettlementEngine::new(store),
        config,
    ))
}

async fn seed_user(store: &MemoryStore, id: &str, balance: f64) {
    store
        .upsert_user(&UserAccount {
            id: id.to_string(),
            name: id.to_string(),
            balance,
        })
        .await
        .expect("Failed to seed user");
}

#[tokio::test]
async fn test_full_round_flow_with_scheduled_override() {
    let config = RoundConfig::default();
    let store = Arc::new(MemoryStore::new());
    seed_user(&store, "alice", 1000.0).await;
    let manager = build_manager(store.clone(), &config);
    let service = GameService::new(store.clone(), manager.clone(), config.max_query_limit);

    // === PHASE 1: Open a round and place a bet ===
    println!("\n=== PHASE 1: Open round and place bet ===");
    let t0 = Utc::now();
    let round = manager.open_round(t0).await.expect("Failed to open round");
    println!("Round opened: {}", round.period);

    let placed = service
        .place_bet(
            "alice",
            round.period.clone(),
            BetSelection::Color(Color::Red),
            100.0,
            1.0,
        )
        .await
        .expect("Failed to place bet");
    assert_eq!(placed.balance, 900.0);
    println!("Bet placed, balance after debit: {}", placed.balance);

    // === PHASE 2: Schedule an override covering the resolution time ===
    let resolve_at = t0 + Duration::seconds(61);
    store
        .insert_override(&ScheduledOutcome {
            id: Uuid::new_v4(),
            number: 4,
            start_time: t0,
            end_time: t0 + Duration::seconds(300),
            status: OverrideStatus::Scheduled,
        })
        .await
        .expect("Failed to insert override");

    // === PHASE 3: Close, resolve and settle ===
    println!("\n=== PHASE 3: Close and resolve ===");
    let (completed, report) = manager
        .close_and_resolve(resolve_at)
        .await
        .expect("Failed to close round");
    assert_eq!(report.settled, 1);
    assert_eq!(report.total_paid, 200.0);
    let outcome = completed.outcome.expect("Round should carry an outcome");
    assert_eq!(outcome.number, 4);
    assert_eq!(outcome.color, Color::Red);
    assert_eq!(outcome.size, Size::Small);
    println!(
        "Round resolved: number={} color={} size={}",
        outcome.number, outcome.color, outcome.size
    );

    // === PHASE 4: Verify settlement and audit trail ===
    let bets = store
        .bets_for_period(&completed.period)
        .await
        .expect("Failed to load bets");
    assert_eq!(bets.len(), 1);
    let result = bets[0].result.as_ref().expect("Bet should be settled");
    assert!(result.won);
    assert_eq!(result.payout, 200.0); // 100 stake at the x2 color multiplier

    let balance = service
        .user_balance("alice")
        .await
        .expect("Failed to load balance");
    assert_eq!(balance, 1100.0);

    let history = store
        .history_for_user("alice", 10)
        .await
        .expect("Failed to load history");
    assert_eq!(history.len(), 1);
    assert!(history[0].won);
    assert_eq!(history[0].payout, 200.0);
    println!("Settlement verified, final balance: {}", balance);

    // The completed round shows up in history and nothing is left open.
    let completed_rounds = store
        .completed_rounds(10)
        .await
        .expect("Failed to load completed rounds");
    assert_eq!(completed_rounds.len(), 1);
    assert!(store
        .current_round()
        .await
        .expect("Failed to load current round")
        .is_none());
}

#[tokio::test]
async fn test_resolving_twice_pays_once() {
    let config = RoundConfig::default();
    let store = Arc::new(MemoryStore::new());
    seed_user(&store, "bob", 500.0).await;
    let manager = build_manager(store.clone(), &config);
    let service = GameService::new(store.clone(), manager.clone(), config.max_query_limit);

    let t0 = Utc::now();
    let round = manager.open_round(t0).await.expect("Failed to open round");
    service
        .place_bet(
            "bob",
            round.period.clone(),
            BetSelection::Number(7),
            50.0,
            1.0,
        )
        .await
        .expect("Failed to place bet");
    store
        .insert_override(&ScheduledOutcome {
            id: Uuid::new_v4(),
            number: 7,
            start_time: t0,
            end_time: t0 + Duration::seconds(300),
            status: OverrideStatus::Active,
        })
        .await
        .expect("Failed to insert override");

    let resolve_at = t0 + Duration::seconds(61);
    let (_, report) = manager
        .close_and_resolve(resolve_at)
        .await
        .expect("Failed to close round");
    assert_eq!(report.total_paid, 450.0);
    let balance_after_first = service.user_balance("bob").await.unwrap();
    assert_eq!(balance_after_first, 500.0 - 50.0 + 50.0 * 9.0);

    // A duplicate close is a no-op for money movement.
    let (again, rerun) = manager
        .close_and_resolve(resolve_at + Duration::seconds(1))
        .await
        .expect("Duplicate close should succeed");
    assert!(again.is_completed);
    assert_eq!(rerun.total_paid, 0.0);
    assert_eq!(service.user_balance("bob").await.unwrap(), balance_after_first);
}

#[tokio::test]
async fn test_upcoming_windows_chain_without_overlap() {
    let config = RoundConfig::default();
    let store = Arc::new(MemoryStore::new());
    let manager = build_manager(store.clone(), &config);

    let t0 = Utc::now();
    let round = manager.open_round(t0).await.expect("Failed to open round");

    let upcoming = manager.upcoming_periods(t0, 20).await;
    assert_eq!(upcoming.len(), 20);

    // First projected window starts a cooldown after the current round ends.
    assert_eq!(
        upcoming[0].start_time,
        round.end_time + Duration::seconds(config.cooldown_secs as i64)
    );

    let mut periods = vec![round.period.clone()];
    for pair in upcoming.windows(2) {
        assert_eq!(
            pair[1].start_time,
            pair[0].end_time + Duration::seconds(config.cooldown_secs as i64)
        );
    }
    for window in &upcoming {
        assert_eq!(
            window.end_time,
            window.start_time + Duration::seconds(config.duration_secs as i64)
        );
        periods.push(window.period.clone());
    }

    // Period ids stay unique and lexicographically increasing.
    let mut sorted = periods.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), periods.len());
    assert_eq!(sorted, periods);
}

#[tokio::test]
async fn test_recovery_closes_expired_round() {
    let config = RoundConfig::default();
    let store = Arc::new(MemoryStore::new());
    seed_user(&store, "carol", 300.0).await;

    // First manager opens a round and takes a bet, then is dropped without
    // resolving, as if the process died mid-round.
    let t0 = Utc::now() - Duration::seconds(120);
    {
        let manager = build_manager(store.clone(), &config);
        let round = manager.open_round(t0).await.expect("Failed to open round");
        let bet = colorwin::types::Bet {
            id: Uuid::new_v4(),
            user_id: "carol".to_string(),
            period: round.period.clone(),
            selection: BetSelection::Size(Size::Big),
            amount: 30.0,
            multiplier: 1.0,
            placed_at: t0,
            result: None,
        };
        store.place_bet(&bet).await.expect("Failed to place bet");
    }

    // A fresh manager finds the expired round and closes it out.
    let manager = build_manager(store.clone(), &config);
    let recovered = manager
        .recover(Utc::now())
        .await
        .expect("Recovery failed")
        .expect("Expected a recovered round");
    assert!(recovered.is_completed);
    assert!(recovered.outcome.is_some());

    let bets = store.bets_for_period(&recovered.period).await.unwrap();
    assert!(bets[0].result.is_some(), "recovered round must be settled");
    assert!(store.current_round().await.unwrap().is_none());
}
