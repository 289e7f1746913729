//! Integration tests for the session registry and its worker tasks.
//!
//! Timer behavior runs on a paused `tokio` clock: sleeping in the test
//! auto-advances virtual time, so the 5 s and 30 s phase timers expire
//! instantly and deterministically.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::sync::Arc;
use std::time::Duration;

use ringboard_core::config::RingboardConfig;
use ringboard_session::{MemoryCatalog, SessionError, SessionRegistry};
use ringboard_types::{
    CardChoiceAction, GameId, PlayerId, PlayerSeat, RollAction, SessionEvent, TurnPhase,
};
use tokio::sync::broadcast;

const CATALOG: &str = r#"{
    "sin": [
        {"id": "sin_001", "name": "Office Gamble", "type": "temptation",
         "category": "misc",
         "choices": [
            {"text": "Bet", "effects": {"money": -500, "mental": 1}},
            {"text": "Walk away", "effects": {"virtue": 1}}
         ]}
    ],
    "virtue": [
        {"id": "vir_001", "name": "Mentor", "type": "opportunity",
         "category": "misc",
         "choices": [{"text": "Teach", "effects": {"virtue": 1}}]}
    ]
}"#;

fn config() -> RingboardConfig {
    let mut config = RingboardConfig::default();
    config.session.seed = Some(7);
    config
}

fn registry(catalog: MemoryCatalog) -> SessionRegistry {
    SessionRegistry::new(config(), Arc::new(catalog))
}

fn seats() -> Vec<PlayerSeat> {
    vec![
        PlayerSeat {
            id: PlayerId::new(),
            name: "Ada".to_owned(),
        },
        PlayerSeat {
            id: PlayerId::new(),
            name: "Lin".to_owned(),
        },
    ]
}

fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn timed_out(events: &[SessionEvent]) -> Vec<TurnPhase> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::PhaseTimedOut(t) => Some(t.phase),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn start_game_returns_the_opening_turn() {
    let registry = registry(MemoryCatalog::new());
    let game_id = GameId::new();
    let seats = seats();
    let first = seats[0].id;

    let (handle, events) = registry.start_game(game_id, seats).await.unwrap();
    assert_eq!(handle.game_id(), game_id);
    assert!(matches!(
        events.as_slice(),
        [SessionEvent::TurnStarted(started)] if started.player_id == first && started.round == 1
    ));
    assert_eq!(registry.game_ids().await, vec![game_id]);
    assert_eq!(registry.len().await, 1);

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, TurnPhase::Roll);
    assert_eq!(snapshot.scheduler_turn, 1);
    assert_eq!(snapshot.upcoming_events.len(), 1);
}

#[tokio::test]
async fn duplicate_and_empty_games_are_rejected() {
    let registry = registry(MemoryCatalog::new());
    let game_id = GameId::new();
    registry.start_game(game_id, seats()).await.unwrap();

    assert_eq!(
        registry.start_game(game_id, seats()).await.unwrap_err(),
        SessionError::DuplicateGame { game_id }
    );
    assert_eq!(
        registry
            .start_game(GameId::new(), Vec::new())
            .await
            .unwrap_err(),
        SessionError::EmptyRoster
    );
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn actions_for_unknown_games_are_rejected() {
    let registry = registry(MemoryCatalog::new());
    let game_id = GameId::new();
    let err = registry
        .roll(RollAction {
            game_id,
            player_id: PlayerId::new(),
            roll_result: 3,
        })
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::UnknownGame { game_id });
}

#[tokio::test]
async fn roll_is_broadcast_to_subscribers() {
    let registry = registry(MemoryCatalog::new());
    let game_id = GameId::new();
    let seats = seats();
    let (first, second) = (seats[0].id, seats[1].id);
    let (handle, _) = registry.start_game(game_id, seats).await.unwrap();
    let mut rx = handle.subscribe();

    let events = registry
        .roll(RollAction {
            game_id,
            player_id: first,
            roll_result: 5,
        })
        .await
        .unwrap();
    assert_eq!(drain(&mut rx), events);

    let result = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::TurnResult(r) => Some(r),
            _ => None,
        })
        .unwrap();
    assert_eq!(result.player_id, first);
    assert_eq!(result.tile.position, 5);
    assert_eq!(result.next_player, 1);
    assert!(matches!(
        events.last(),
        Some(SessionEvent::TurnStarted(started)) if started.player_id == second
    ));
}

#[tokio::test(start_paused = true)]
async fn idle_roll_times_out_after_five_seconds() {
    let registry = registry(MemoryCatalog::new());
    let game_id = GameId::new();
    let (handle, _) = registry.start_game(game_id, seats()).await.unwrap();
    let mut rx = handle.subscribe();

    tokio::time::sleep(Duration::from_millis(4_999)).await;
    assert!(timed_out(&drain(&mut rx)).is_empty());
    assert_eq!(handle.snapshot().await.unwrap().active_index, 0);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(timed_out(&drain(&mut rx)), vec![TurnPhase::Roll]);

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.active_index, 1);
    assert_eq!(snapshot.phase, TurnPhase::Roll);
    assert_eq!(snapshot.scheduler_turn, 2);
    assert!(snapshot.players[0].position > 0);
}

#[tokio::test(start_paused = true)]
async fn idle_decision_times_out_after_thirty_seconds() {
    let registry = registry(MemoryCatalog::from_json(CATALOG).unwrap());
    let game_id = GameId::new();
    let seats = seats();
    let first = seats[0].id;
    let (handle, _) = registry.start_game(game_id, seats).await.unwrap();

    registry
        .roll(RollAction {
            game_id,
            player_id: first,
            roll_result: 2,
        })
        .await
        .unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.phase, TurnPhase::Decision);
    assert!(snapshot.context.pending_decision.is_some());

    let mut rx = handle.subscribe();
    tokio::time::sleep(Duration::from_millis(29_999)).await;
    assert!(timed_out(&drain(&mut rx)).is_empty());

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(timed_out(&drain(&mut rx)), vec![TurnPhase::Decision]);

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.context.pending_decision.is_none());
    assert_eq!(snapshot.active_index, 1);
    assert_eq!(snapshot.players[0].stats.money, 2000);
}

#[tokio::test(start_paused = true)]
async fn acting_in_time_cancels_the_timer() {
    let registry = registry(MemoryCatalog::new());
    let game_id = GameId::new();
    let seats = seats();
    let first = seats[0].id;
    let (handle, _) = registry.start_game(game_id, seats).await.unwrap();
    let mut rx = handle.subscribe();

    tokio::time::sleep(Duration::from_millis(4_000)).await;
    registry
        .roll(RollAction {
            game_id,
            player_id: first,
            roll_result: 1,
        })
        .await
        .unwrap();

    // Past the first player's deadline, short of the second player's.
    tokio::time::sleep(Duration::from_millis(2_000)).await;
    assert!(timed_out(&drain(&mut rx)).is_empty());
    assert_eq!(handle.snapshot().await.unwrap().active_index, 1);
}

#[tokio::test(start_paused = true)]
async fn choosing_resolves_the_card() {
    let registry = registry(MemoryCatalog::from_json(CATALOG).unwrap());
    let game_id = GameId::new();
    let seats = seats();
    let first = seats[0].id;
    let (handle, _) = registry.start_game(game_id, seats).await.unwrap();

    registry
        .roll(RollAction {
            game_id,
            player_id: first,
            roll_result: 2,
        })
        .await
        .unwrap();
    let pending = handle
        .snapshot()
        .await
        .unwrap()
        .context
        .pending_decision
        .unwrap();

    let events = registry
        .choose(CardChoiceAction {
            game_id,
            player_id: first,
            card_id: pending.card_id.clone(),
            choice_index: 0,
        })
        .await
        .unwrap();
    let resolved = events
        .iter()
        .find_map(|e| match e {
            SessionEvent::CardResolved(r) => Some(r),
            _ => None,
        })
        .unwrap();
    assert_eq!(resolved.card_id, pending.card_id);
    assert_eq!(handle.snapshot().await.unwrap().active_index, 1);

    let late = registry
        .choose(CardChoiceAction {
            game_id,
            player_id: first,
            card_id: pending.card_id,
            choice_index: 0,
        })
        .await;
    assert!(matches!(late, Err(SessionError::NotYourTurn { .. })));
}

#[tokio::test]
async fn ending_a_game_stops_its_worker() {
    let registry = registry(MemoryCatalog::new());
    let game_id = GameId::new();
    let seats = seats();
    let first = seats[0].id;
    let (handle, _) = registry.start_game(game_id, seats).await.unwrap();

    let last = registry.end_game(game_id).await.unwrap();
    assert_eq!(last.game_id, game_id);
    assert!(registry.is_empty().await);
    assert_eq!(
        registry.get(game_id).await.unwrap_err(),
        SessionError::UnknownGame { game_id }
    );

    let err = handle
        .roll(RollAction {
            game_id,
            player_id: first,
            roll_result: 3,
        })
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::Closed { game_id });
}

#[tokio::test]
async fn sessions_are_independent() {
    let registry = registry(MemoryCatalog::new());
    let (a, b) = (GameId::new(), GameId::new());
    let seats_a = seats();
    let first_a = seats_a[0].id;
    registry.start_game(a, seats_a).await.unwrap();
    let (handle_b, _) = registry.start_game(b, seats()).await.unwrap();

    registry
        .roll(RollAction {
            game_id: a,
            player_id: first_a,
            roll_result: 4,
        })
        .await
        .unwrap();

    let snapshot_b = handle_b.snapshot().await.unwrap();
    assert_eq!(snapshot_b.scheduler_turn, 1);
    assert_eq!(snapshot_b.active_index, 0);

    registry.shutdown().await;
    assert!(registry.is_empty().await);
}
