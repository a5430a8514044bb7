//! Integration tests for the session runtime: serialization, timers,
//! delivery, and lifecycle, all against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use parlor_core::delivery::DeliveryOutcome;
use parlor_core::error::GameError;
use parlor_core::event::{CategoryChoice, LevelChoice, RuleToggle, SessionEvent};
use parlor_core::id::UserId;
use parlor_core::model::{
    ActionCategory, ActionStatus, Category, ForcedQuestion, Level, Phase, Session, SessionKind,
    SessionStatus,
};
use parlor_core::store::{QuestionBank, SessionStore};
use parlor_engine::GameConfig;
use parlor_runtime::{DeliveryPolicy, RuntimeDeps, SessionRegistry};
use parlor_test_support::{FixedClock, InMemoryStore, MockRng, ScriptedGateway};

fn build_registry(
    outcomes: Vec<DeliveryOutcome>,
    turn_timeout: Duration,
) -> (Arc<SessionRegistry>, Arc<InMemoryStore>, Arc<ScriptedGateway>) {
    let store = Arc::new(InMemoryStore::new());
    let gateway = Arc::new(ScriptedGateway::new(outcomes));
    let deps = RuntimeDeps {
        store: store.clone(),
        gateway: gateway.clone(),
        clock: Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        )),
        rng_factory: Arc::new(|| Box::new(MockRng)),
        game: GameConfig {
            turn_timeout,
            ..GameConfig::default()
        },
        delivery: DeliveryPolicy::default(),
    };
    (Arc::new(SessionRegistry::new(deps)), store, gateway)
}

async fn two_player_session(
    registry: &SessionRegistry,
) -> parlor_core::id::SessionId {
    let session = registry
        .create_session(SessionKind::Group, UserId(1), "alice")
        .await
        .unwrap();
    registry
        .dispatch(
            session.id,
            SessionEvent::Join {
                actor: UserId(2),
                name: "bob".to_owned(),
            },
        )
        .await
        .unwrap();
    registry
        .dispatch(session.id, SessionEvent::Start { actor: UserId(1) })
        .await
        .unwrap();
    session.id
}

/// Polls until the predicate holds over the freshest snapshot, yielding to
/// let the coordinator and its workers run.
async fn wait_for_snapshot(
    registry: &SessionRegistry,
    id: parlor_core::id::SessionId,
    predicate: impl Fn(&Session) -> bool,
) -> Session {
    for _ in 0..500 {
        let snapshot = registry.snapshot(id).await.unwrap();
        if predicate(&snapshot) {
            return snapshot;
        }
        tokio::task::yield_now().await;
    }
    panic!("snapshot never matched");
}

#[tokio::test(start_paused = true)]
async fn test_full_two_player_flow() {
    let (registry, store, _gateway) = build_registry(vec![], Duration::from_secs(60));
    store.seed_question(Category::Truth, Level::Normal, "What is your worst habit?");

    // Lobby -> running, owner current with one turn taken.
    let id = two_player_session(&registry).await;
    let snapshot = registry.snapshot(id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Running);
    assert_eq!(snapshot.phase, Phase::Choose);
    assert_eq!(snapshot.current_participant().unwrap().user_id, UserId(1));
    assert_eq!(snapshot.participant(UserId(1)).unwrap().turns, 1);

    // Pick puts the seeded question on the board and logs it as asked.
    let snapshot = registry
        .dispatch(
            id,
            SessionEvent::Pick {
                actor: UserId(1),
                category: CategoryChoice::Truth,
                level: LevelChoice::Normal,
            },
        )
        .await
        .unwrap();
    assert_eq!(snapshot.phase, Phase::Question);
    assert_eq!(
        snapshot.last_question.as_ref().unwrap().text,
        "What is your worst habit?"
    );
    assert_eq!(store.actions(id).last().unwrap().status, ActionStatus::Asked);

    // Done with exactly two participants waits for the counterpart.
    let snapshot = registry
        .dispatch(id, SessionEvent::Done { actor: UserId(1) })
        .await
        .unwrap();
    assert_eq!(snapshot.phase, Phase::WaitConfirm);
    assert_eq!(
        store.actions(id).last().unwrap().status,
        ActionStatus::DonePending
    );

    // Rejection penalizes the claimant and passes the turn.
    let snapshot = registry
        .dispatch(
            id,
            SessionEvent::Confirm {
                actor: UserId(2),
                accepted: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(snapshot.phase, Phase::Choose);
    assert_eq!(snapshot.current_participant().unwrap().user_id, UserId(2));
    assert_eq!(snapshot.participant(UserId(1)).unwrap().penalties, 1);

    let actions = store.actions(id);
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].status, ActionStatus::Rejected);
    assert_eq!(actions[1].category, ActionCategory::Reject);

    // The persisted snapshot equals the authoritative one.
    let persisted = store.load_session(id).await.unwrap().unwrap();
    assert_eq!(persisted, snapshot);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_events_for_one_session_are_serialized() {
    let (registry, store, _gateway) = build_registry(vec![], Duration::from_secs(60));
    let session = registry
        .create_session(SessionKind::Group, UserId(1), "owner")
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for user in 2..=20 {
        let registry = registry.clone();
        let id = session.id;
        tasks.push(tokio::spawn(async move {
            registry
                .dispatch(
                    id,
                    SessionEvent::Join {
                        actor: UserId(user),
                        name: format!("user{user}"),
                    },
                )
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let snapshot = registry.snapshot(session.id).await.unwrap();
    assert_eq!(snapshot.participants.len(), 20);
    assert_eq!(snapshot.active_count(), 20);

    // Persisted state observed the same serialized sequence.
    let persisted = store.load_session(session.id).await.unwrap().unwrap();
    assert_eq!(persisted.participants.len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_turn_timeout_penalizes_and_advances() {
    let (registry, store, _gateway) = build_registry(vec![], Duration::from_secs(60));
    let id = two_player_session(&registry).await;

    tokio::time::sleep(Duration::from_secs(61)).await;

    let snapshot = wait_for_snapshot(&registry, id, |s| {
        s.participant(UserId(1)).is_some_and(|p| p.penalties == 1)
    })
    .await;
    assert_eq!(snapshot.current_participant().unwrap().user_id, UserId(2));
    assert_eq!(
        store.actions(id).last().unwrap().category,
        ActionCategory::Timeout
    );
    assert_eq!(
        store.actions(id).last().unwrap().status,
        ActionStatus::TimedOut
    );
}

#[tokio::test(start_paused = true)]
async fn test_rearming_invalidates_the_previous_timer() {
    let (registry, _store, _gateway) = build_registry(vec![], Duration::from_secs(60));
    let id = two_player_session(&registry).await;

    // Halfway through the turn, a reroll re-arms the timer.
    tokio::time::sleep(Duration::from_secs(30)).await;
    registry
        .dispatch(id, SessionEvent::Reroll { actor: UserId(1) })
        .await
        .unwrap();

    // The original deadline passes without a timeout.
    tokio::time::sleep(Duration::from_secs(45)).await;
    let snapshot = registry.snapshot(id).await.unwrap();
    assert_eq!(snapshot.participant(UserId(1)).unwrap().penalties, 0);
    assert_eq!(snapshot.current_participant().unwrap().user_id, UserId(1));

    // The re-armed deadline does fire.
    tokio::time::sleep(Duration::from_secs(20)).await;
    let snapshot = wait_for_snapshot(&registry, id, |s| {
        s.participant(UserId(1)).is_some_and(|p| p.penalties == 1)
    })
    .await;
    assert_eq!(snapshot.current_participant().unwrap().user_id, UserId(2));
}

#[tokio::test(start_paused = true)]
async fn test_forced_question_preempts_the_bank_and_is_consumed_once() {
    let (registry, store, _gateway) = build_registry(vec![], Duration::from_secs(60));
    store.seed_question(Category::Truth, Level::Normal, "bank question");
    let id = two_player_session(&registry).await;

    store
        .enqueue_forced(&ForcedQuestion {
            session_id: id,
            target: UserId(1),
            category: None,
            level: None,
            text: "planted question".to_owned(),
            enqueued_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        })
        .await
        .unwrap();

    let snapshot = registry
        .dispatch(
            id,
            SessionEvent::Pick {
                actor: UserId(1),
                category: CategoryChoice::Truth,
                level: LevelChoice::Normal,
            },
        )
        .await
        .unwrap();

    assert_eq!(
        snapshot.last_question.as_ref().unwrap().text,
        "planted question"
    );
    assert_eq!(store.forced_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pick_with_empty_bank_is_rejected_without_mutation() {
    let (registry, _store, _gateway) = build_registry(vec![], Duration::from_secs(60));
    let id = two_player_session(&registry).await;
    let before = registry.snapshot(id).await.unwrap();

    let result = registry
        .dispatch(
            id,
            SessionEvent::Pick {
                actor: UserId(1),
                category: CategoryChoice::Truth,
                level: LevelChoice::Normal,
            },
        )
        .await;

    assert!(matches!(result, Err(GameError::ResourceExhausted(_))));
    assert_eq!(registry.snapshot(id).await.unwrap(), before);
}

#[tokio::test(start_paused = true)]
async fn test_storage_failure_rejects_event_and_keeps_state() {
    let (registry, store, _gateway) = build_registry(vec![], Duration::from_secs(60));
    let id = two_player_session(&registry).await;

    store.set_fail_writes(true);
    let result = registry
        .dispatch(id, SessionEvent::Reroll { actor: UserId(1) })
        .await;
    assert!(matches!(result, Err(GameError::Storage(_))));

    // The authoritative state is unchanged and the event can be retried.
    store.set_fail_writes(false);
    let snapshot = registry.snapshot(id).await.unwrap();
    assert_eq!(snapshot.participant(UserId(1)).unwrap().rerolls_left, 3);

    let snapshot = registry
        .dispatch(id, SessionEvent::Reroll { actor: UserId(1) })
        .await
        .unwrap();
    assert_eq!(snapshot.participant(UserId(1)).unwrap().rerolls_left, 2);
}

#[tokio::test(start_paused = true)]
async fn test_delivery_pushes_the_final_state_of_a_burst() {
    let (registry, _store, gateway) = build_registry(vec![], Duration::from_secs(60));
    let session = registry
        .create_session(SessionKind::Group, UserId(1), "owner")
        .await
        .unwrap();

    // An odd number of toggles lands on `false`.
    for _ in 0..5 {
        registry
            .dispatch(
                session.id,
                SessionEvent::Configure {
                    actor: UserId(1),
                    toggle: RuleToggle::MidJoin,
                },
            )
            .await
            .unwrap();
    }

    let expected = registry.snapshot(session.id).await.unwrap();
    assert!(!expected.rules.allow_mid_join);
    for _ in 0..500 {
        if gateway.delivered().last() == Some(&expected) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(gateway.delivered().last(), Some(&expected));
}

#[tokio::test(start_paused = true)]
async fn test_permanent_delivery_failure_replaces_the_surface() {
    let (registry, store, gateway) = build_registry(
        vec![DeliveryOutcome::Permanent("message deleted".to_owned())],
        Duration::from_secs(60),
    );
    let session = registry
        .create_session(SessionKind::Group, UserId(1), "owner")
        .await
        .unwrap();
    let minted = session.surface.clone().unwrap();

    // The initial push fails permanently; the worker recreates the surface
    // and the coordinator persists the replacement.
    for _ in 0..500 {
        let persisted = store.load_session(session.id).await.unwrap().unwrap();
        if persisted.surface.as_ref() != Some(&minted) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let persisted = store.load_session(session.id).await.unwrap().unwrap();
    assert_ne!(persisted.surface.as_ref(), Some(&minted));
    assert_eq!(gateway.recreations(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_ended_sessions_reject_events_and_retire() {
    let (registry, _store, _gateway) = build_registry(vec![], Duration::from_secs(60));
    let id = two_player_session(&registry).await;

    let snapshot = registry
        .dispatch(id, SessionEvent::End { actor: UserId(1) })
        .await
        .unwrap();
    assert_eq!(snapshot.status, SessionStatus::Ended);

    let result = registry
        .dispatch(
            id,
            SessionEvent::Join {
                actor: UserId(9),
                name: "late".to_owned(),
            },
        )
        .await;
    assert!(matches!(result, Err(GameError::SessionEnded)));
    assert_eq!(registry.live_sessions().await, 0);

    // The terminal state stays readable.
    let snapshot = registry.snapshot(id).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Ended);
}

#[tokio::test(start_paused = true)]
async fn test_session_resumes_from_the_store() {
    let store = Arc::new(InMemoryStore::new());
    let gateway = Arc::new(ScriptedGateway::new(vec![]));
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
    let make_registry = || {
        SessionRegistry::new(RuntimeDeps {
            store: store.clone(),
            gateway: gateway.clone(),
            clock: Arc::new(clock),
            rng_factory: Arc::new(|| Box::new(MockRng)),
            game: GameConfig::default(),
            delivery: DeliveryPolicy::default(),
        })
    };

    let first = make_registry();
    let session = first
        .create_session(SessionKind::Group, UserId(1), "alice")
        .await
        .unwrap();
    first
        .dispatch(
            session.id,
            SessionEvent::Join {
                actor: UserId(2),
                name: "bob".to_owned(),
            },
        )
        .await
        .unwrap();
    drop(first);

    // A fresh registry picks the session up from the store and produces
    // the same transition for the next event.
    let second = make_registry();
    let snapshot = second
        .dispatch(session.id, SessionEvent::Start { actor: UserId(1) })
        .await
        .unwrap();
    assert_eq!(snapshot.status, SessionStatus::Running);
    assert_eq!(snapshot.current_participant().unwrap().user_id, UserId(1));
    assert_eq!(snapshot.participants.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_store_fails_session_creation() {
    let gateway = Arc::new(ScriptedGateway::new(vec![]));
    let registry = SessionRegistry::new(RuntimeDeps {
        store: Arc::new(parlor_test_support::FailingStore),
        gateway,
        clock: Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        )),
        rng_factory: Arc::new(|| Box::new(MockRng)),
        game: GameConfig::default(),
        delivery: DeliveryPolicy::default(),
    });

    let result = registry
        .create_session(SessionKind::Group, UserId(1), "alice")
        .await;

    assert!(matches!(result, Err(GameError::Storage(_))));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_session_is_not_found() {
    let (registry, _store, _gateway) = build_registry(vec![], Duration::from_secs(60));

    let result = registry
        .dispatch(
            parlor_core::id::SessionId::new(),
            SessionEvent::Start { actor: UserId(1) },
        )
        .await;

    assert!(matches!(result, Err(GameError::NotFound(_))));
}
