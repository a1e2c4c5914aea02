//! Integration tests for the battle session.
//!
//! All tests run with paused tokio time: sleeping in the test advances
//! the clock instantly and lets the deadline tasks fire in order. Tests
//! sleep one second past a deadline so the check has already run when
//! they look.

use std::sync::Arc;
use std::time::Duration;

use livewire_battle::{
    BattleCategory, BattleConfig, BattleError, BattleSession, BattleState, Decision,
    ResultReporter,
};
use livewire_protocol::{Command, Envelope, RoomId};
use serde_json::{json, Value};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

const OWN: RoomId = RoomId(100);
const RIVAL: u64 = 200;

fn start(
    category: BattleCategory,
    config: BattleConfig,
) -> (BattleSession, mpsc::UnboundedReceiver<Decision>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let reporter: Arc<dyn ResultReporter> = Arc::new(tx);
    (BattleSession::start(OWN, category, config, reporter), rx)
}

fn start_default() -> (BattleSession, mpsc::UnboundedReceiver<Decision>) {
    start(BattleCategory::Primary, BattleConfig::default())
}

fn process_data(own: u64, opposing: u64) -> Value {
    json!({
        "battle_type": 1,
        "init_info": {"room_id": OWN.0, "votes": own},
        "match_info": {"room_id": RIVAL, "votes": opposing}
    })
}

fn process(own: u64, opposing: u64) -> Envelope {
    Envelope::new(Command::BattleProcess, process_data(own, opposing))
}

fn members(list: Value) -> Envelope {
    Envelope::new(Command::BattleInfo, json!({ "members": list }))
}

async fn advance_to(secs: u64) {
    // Paused clock: "now" is the session start until the first sleep.
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

// =========================================================================
// Early check
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_early_check_fires_when_opponent_over_threshold() {
    let (session, mut rx) = start_default();
    session.update(&process(0, 150)).unwrap();

    advance_to(171).await;

    let decision = rx.try_recv().expect("decision at T1");
    assert_eq!(decision.category, BattleCategory::Primary);
    assert_eq!(decision.room_id, OWN);
    assert_eq!(decision.data, process_data(0, 150));
    assert_eq!(decision.token, "8096");
    assert_eq!(session.state(), BattleState::Triggered);

    // The end timer was cancelled: nothing more at T2.
    advance_to(200).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_early_check_does_not_fire_at_threshold() {
    let (session, mut rx) = start_default();
    session.update(&process(0, 100)).unwrap();

    advance_to(171).await;

    assert!(rx.try_recv().is_err(), "100 is not more than 100");
    assert_eq!(session.state(), BattleState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_own_votes_nonzero_never_triggers() {
    let (session, mut rx) = start_default();
    session.update(&process(5, 500)).unwrap();

    advance_to(171).await;
    assert!(rx.try_recv().is_err());

    advance_to(130).await; // t = 301
    assert!(rx.try_recv().is_err());
    assert_eq!(session.state(), BattleState::Active);
}

// =========================================================================
// End check
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_end_check_fires_when_own_zero_below_threshold() {
    let (session, mut rx) = start_default();
    session.update(&process(0, 50)).unwrap();

    advance_to(171).await;
    assert!(rx.try_recv().is_err(), "early check needs opposing > 100");

    advance_to(120).await; // t = 291
    let decision = rx.try_recv().expect("decision at T2");
    assert_eq!(decision.data, process_data(0, 50));
    assert_eq!(session.state(), BattleState::Triggered);
}

#[tokio::test(start_paused = true)]
async fn test_end_check_fires_without_any_snapshot() {
    let (session, mut rx) = start_default();

    advance_to(171).await;
    assert!(rx.try_recv().is_err(), "no data never triggers the early check");

    advance_to(120).await;
    let decision = rx.try_recv().expect("degraded decision at T2");
    assert_eq!(decision.data, json!({}));
    assert_eq!(session.state(), BattleState::Triggered);
}

#[tokio::test(start_paused = true)]
async fn test_equal_deadlines_report_once() {
    let config = BattleConfig {
        early_check_secs: 60,
        end_check_secs: 60,
        ..BattleConfig::default()
    };
    let (session, mut rx) = start(BattleCategory::Primary, config);
    session.update(&process(0, 150)).unwrap();

    advance_to(61).await;

    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err(), "exactly one decision");
    assert_eq!(session.state(), BattleState::Triggered);
}

// =========================================================================
// Termination
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_terminate_between_checks_closes_without_decision() {
    let (session, mut rx) = start_default();
    session.update(&process(0, 50)).unwrap();

    advance_to(200).await;
    assert_eq!(session.terminate(), BattleState::Closed);

    advance_to(200).await; // well past T2
    assert!(rx.try_recv().is_err());
    assert_eq!(session.state(), BattleState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_terminate_after_trigger_keeps_triggered() {
    let (session, mut rx) = start_default();
    session.update(&process(0, 150)).unwrap();

    advance_to(171).await;
    assert!(rx.try_recv().is_ok());

    assert_eq!(session.terminate(), BattleState::Triggered);
    assert_eq!(session.terminate(), BattleState::Triggered);
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels_deadlines() {
    let (session, mut rx) = start_default();
    drop(session);

    advance_to(400).await;
    assert!(rx.try_recv().is_err());
}

// =========================================================================
// Updates
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_update_replaces_previous_snapshot() {
    let (session, mut rx) = start_default();
    session.update(&process(0, 150)).unwrap();
    session.update(&process(3, 150)).unwrap();

    assert_eq!(session.votes().own, 3);
    advance_to(300).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_update_after_terminal_state_is_noop() {
    let (session, mut rx) = start_default();
    session.update(&process(0, 150)).unwrap();
    advance_to(171).await;
    assert!(rx.try_recv().is_ok());

    let before = session.snapshot();
    session.update(&process(9, 9)).unwrap();
    session.update(&Envelope::new(Command::Gift, json!({}))).unwrap();

    assert_eq!(session.snapshot(), before);
    advance_to(200).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_update_keeps_previous_snapshot() {
    let (session, _rx) = start_default();
    session.update(&process(0, 150)).unwrap();
    let before = session.snapshot();

    let bad = Envelope::new(Command::BattleProcess, json!({"init_info": "oops"}));
    let err = session.update(&bad).unwrap_err();

    assert!(matches!(err, BattleError::MalformedUpdate { .. }));
    assert_eq!(session.snapshot(), before);
}

#[tokio::test(start_paused = true)]
async fn test_update_with_non_battle_command_is_rejected() {
    let (session, _rx) = start_default();
    let err = session
        .update(&Envelope::new(Command::Danmaku, json!({})))
        .unwrap_err();
    assert!(matches!(err, BattleError::UnexpectedCommand(_)));
}

// =========================================================================
// Categories
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_secondary_category_reads_members_snapshot() {
    let (session, mut rx) = start(BattleCategory::Secondary, BattleConfig::default());
    // A process snapshot alone would say "own = 3"; secondary ignores it.
    session.update(&process(3, 0)).unwrap();
    let list = json!([
        {"room_id": 300, "votes": 10},
        {"room_id": OWN.0, "votes": 0},
        {"room_id": RIVAL, "votes": 250}
    ]);
    session.update(&members(list.clone())).unwrap();

    advance_to(171).await;

    let decision = rx.try_recv().expect("decision at T1");
    assert_eq!(decision.category, BattleCategory::Secondary);
    assert_eq!(decision.data, json!({ "members": list }));
    assert_eq!(decision.to_payload()["battle_type"], 2);
}

#[tokio::test(start_paused = true)]
async fn test_secondary_without_own_member_skips_early_check() {
    let (session, mut rx) = start(BattleCategory::Secondary, BattleConfig::default());
    session
        .update(&members(json!([{"room_id": RIVAL, "votes": 500}])))
        .unwrap();

    advance_to(171).await;
    assert!(rx.try_recv().is_err(), "opponent alone is not a full pair");
    assert_eq!(session.state(), BattleState::Active);
}

#[tokio::test(start_paused = true)]
async fn test_secondary_with_only_own_member_fires_end_check() {
    let (session, mut rx) = start(BattleCategory::Secondary, BattleConfig::default());
    session
        .update(&members(json!([{"room_id": OWN.0, "votes": 8}])))
        .unwrap();

    advance_to(171).await;
    assert!(rx.try_recv().is_err());

    advance_to(120).await;
    let decision = rx.try_recv().expect("decision at T2");
    assert_eq!(decision.category, BattleCategory::Secondary);
    assert_eq!(session.state(), BattleState::Triggered);
}

#[tokio::test(start_paused = true)]
async fn test_primary_category_ignores_members_snapshot() {
    let (session, mut rx) = start_default();
    session
        .update(&members(json!([{"room_id": RIVAL, "votes": 900}])))
        .unwrap();

    advance_to(171).await;
    assert!(rx.try_recv().is_err(), "primary has no process snapshot yet");
    assert_eq!(session.votes().opposing, 0);
}

#[tokio::test(start_paused = true)]
async fn test_category_normalization_from_start_payload() {
    let raw = json!({"battle_type": 6});
    let (session, _rx) = start(
        BattleCategory::from_raw(raw.get("battle_type")),
        BattleConfig::default(),
    );
    assert_eq!(session.category(), BattleCategory::Secondary);
}
