//! Integration tests for the envelope router and the stock forwarders.
//!
//! Decisions and forwarded payloads are captured with unbounded channels
//! so tests can assert on exactly what left the router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use livewire_battle::{BattleCategory, BattleConfig, BattleState, Decision, ResultReporter};
use livewire_protocol::{Command, Envelope, RoomId};
use livewire_router::{
    Dispatch, Endpoints, EnvelopeRouter, ForwardContext, Forwarder, Handler, HandlerError,
    KeywordFilter,
};
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver};

// =========================================================================
// Helpers
// =========================================================================

const ROOM: RoomId = RoomId(100);

struct Harness {
    router: EnvelopeRouter,
    decisions: UnboundedReceiver<Decision>,
    forwarded: UnboundedReceiver<(String, Value)>,
}

fn harness(spider: bool) -> Harness {
    let (dtx, decisions) = mpsc::unbounded_channel();
    let (ftx, forwarded) = mpsc::unbounded_channel();
    let reporter: Arc<dyn ResultReporter> = Arc::new(dtx);
    let forwarder: Arc<dyn Forwarder> = Arc::new(ftx);

    let mut router = EnvelopeRouter::new(ROOM, BattleConfig::default(), reporter);
    let ctx = Arc::new(ForwardContext::new(ROOM, Endpoints::default(), forwarder));
    router.register_forwarders(ctx, KeywordFilter::default(), spider);

    Harness {
        router,
        decisions,
        forwarded,
    }
}

fn envelope(body: Value) -> Envelope {
    Envelope::from_value(body).unwrap()
}

fn danmaku(user: &str, comment: &str) -> Envelope {
    envelope(json!({
        "cmd": "DANMU_MSG",
        "info": [[0, 1, 25], comment, [42, user, 0]]
    }))
}

fn battle_start(battle_type: Value) -> Envelope {
    Envelope::new(Command::BattleStart, json!({ "battle_type": battle_type }))
}

fn process(own: u64, opposing: u64) -> Envelope {
    Envelope::new(
        Command::BattleProcess,
        json!({
            "init_info": {"room_id": ROOM.0, "votes": own},
            "match_info": {"room_id": 200, "votes": opposing}
        }),
    )
}

struct AlwaysFails;

impl Handler for AlwaysFails {
    fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError> {
        Err(HandlerError::MissingField {
            command: envelope.command.to_string(),
            field: "everything",
        })
    }
}

struct Counts(Arc<AtomicUsize>);

impl Handler for Counts {
    fn handle(&self, _envelope: &Envelope) -> Result<(), HandlerError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =========================================================================
// Stateless forwarders
// =========================================================================

#[tokio::test]
async fn test_danmaku_with_keyword_forwards_to_ticket() {
    let mut h = harness(false);
    let env = danmaku("alice", "去观测站看看");

    assert!(matches!(h.router.route(&env), Dispatch::Handled));

    let (endpoint, payload) = h.forwarded.try_recv().unwrap();
    assert_eq!(endpoint, "ticket");
    assert_eq!(payload["room_id"], 100);
    assert_eq!(payload["danmaku"], "去观测站看看");
    assert_eq!(payload["raw_message"], env.body);
    assert!(h.forwarded.try_recv().is_err());
}

#[tokio::test]
async fn test_danmaku_to_robot_forwards_to_setting() {
    let mut h = harness(false);
    h.router.route(&danmaku("bob", "记仇机器人 记住他"));

    let (endpoint, _) = h.forwarded.try_recv().unwrap();
    assert_eq!(endpoint, "setting");
}

#[tokio::test]
async fn test_danmaku_with_keyword_and_robot_forwards_both() {
    let mut h = harness(false);
    h.router.route(&danmaku("bob", "记仇机器人 鱼豆腐"));

    let endpoints: Vec<String> = std::iter::from_fn(|| h.forwarded.try_recv().ok())
        .map(|(endpoint, _)| endpoint)
        .collect();
    assert_eq!(endpoints, vec!["ticket", "setting"]);
}

#[tokio::test]
async fn test_plain_danmaku_is_handled_without_forwarding() {
    let mut h = harness(false);
    assert!(matches!(h.router.route(&danmaku("carol", "hello")), Dispatch::Handled));
    assert!(h.forwarded.try_recv().is_err());
}

#[tokio::test]
async fn test_danmaku_with_short_info_fails() {
    let mut h = harness(false);
    let env = envelope(json!({"cmd": "DANMU_MSG", "info": [[0], "hi"]}));

    let dispatch = h.router.route(&env);

    assert!(matches!(
        dispatch,
        Dispatch::Failed(HandlerError::MissingField { field: "info", .. })
    ));
}

#[tokio::test]
async fn test_gift_prefers_sender_uinfo() {
    let mut h = harness(false);
    let env = Envelope::new(
        Command::Gift,
        json!({
            "uid": 1,
            "uname": "flat-name",
            "giftId": 31036,
            "giftName": "小花花",
            "price": 100,
            "sender_uinfo": {"uid": 777, "base": {"name": "real-name"}}
        }),
    );

    assert!(matches!(h.router.route(&env), Dispatch::Handled));

    let (endpoint, payload) = h.forwarded.try_recv().unwrap();
    assert_eq!(endpoint, "money");
    assert_eq!(
        payload,
        json!({
            "room_id": 100,
            "uid": 777,
            "uname": "real-name",
            "gift_id": 31036,
            "gift_name": "小花花",
            "price": 100
        })
    );
}

#[tokio::test]
async fn test_gift_missing_fields_default() {
    let mut h = harness(false);
    h.router.route(&Envelope::new(Command::Gift, json!({})));

    let (_, payload) = h.forwarded.try_recv().unwrap();
    assert_eq!(payload["uid"], 0);
    assert_eq!(payload["uname"], "");
    assert_eq!(payload["price"], 0);
}

#[tokio::test]
async fn test_live_room_list_only_with_spider() {
    let list = Envelope::new(Command::StopLiveRoomList, json!({"room_id_list": [1, 2]}));

    let mut off = harness(false);
    assert!(matches!(off.router.route(&list), Dispatch::Dropped));

    let mut on = harness(true);
    assert!(matches!(on.router.route(&list), Dispatch::Handled));
    let (endpoint, payload) = on.forwarded.try_recv().unwrap();
    assert_eq!(endpoint, "live_room_spider");
    assert_eq!(payload["stop_live_room_list"], json!({"room_id_list": [1, 2]}));
}

#[tokio::test]
async fn test_unknown_command_is_dropped() {
    let mut h = harness(true);
    let env = envelope(json!({"cmd": "INTERACT_WORD", "data": {}}));
    assert!(matches!(h.router.route(&env), Dispatch::Dropped));
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_failing_handler_does_not_stop_routing() {
    let mut h = harness(false);
    h.router
        .register_persistent(Command::Unknown("BROKEN".into()), || AlwaysFails);

    let broken = envelope(json!({"cmd": "BROKEN"}));
    assert!(matches!(h.router.route(&broken), Dispatch::Failed(_)));
    assert!(matches!(h.router.route(&danmaku("a", "b")), Dispatch::Handled));
}

#[tokio::test]
async fn test_one_shot_factory_runs_per_envelope() {
    let built = Arc::new(AtomicUsize::new(0));
    let handled = Arc::new(AtomicUsize::new(0));
    let mut h = harness(false);
    {
        let built = Arc::clone(&built);
        let handled = Arc::clone(&handled);
        h.router.register_one_shot(Command::Unknown("PING".into()), move || {
            built.fetch_add(1, Ordering::SeqCst);
            Counts(Arc::clone(&handled))
        });
    }

    let ping = envelope(json!({"cmd": "PING"}));
    for _ in 0..3 {
        h.router.route(&ping);
    }

    assert_eq!(built.load(Ordering::SeqCst), 3);
    assert_eq!(handled.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_persistent_handler_built_once() {
    let built = Arc::new(AtomicUsize::new(0));
    let handled = Arc::new(AtomicUsize::new(0));
    let mut h = harness(false);
    h.router.register_persistent(Command::Unknown("PING".into()), || {
        built.fetch_add(1, Ordering::SeqCst);
        Counts(Arc::clone(&handled))
    });

    let ping = envelope(json!({"cmd": "PING"}));
    h.router.route(&ping);
    h.router.route(&ping);

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(handled.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_persistent_handler_overrides_one_shot() {
    let handled = Arc::new(AtomicUsize::new(0));
    let mut h = harness(false);
    h.router
        .register_persistent(Command::Gift, || Counts(Arc::clone(&handled)));

    h.router.route(&Envelope::new(Command::Gift, json!({})));

    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert!(h.forwarded.try_recv().is_err(), "stock gift handler replaced");
}

// =========================================================================
// Battle slot
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_battle_update_without_session_is_dropped() {
    let mut h = harness(false);
    assert!(matches!(h.router.route(&process(0, 150)), Dispatch::Dropped));
}

#[tokio::test(start_paused = true)]
async fn test_battle_start_defaults_to_primary_category() {
    let mut h = harness(false);
    let env = Envelope::new(Command::BattleStart, json!({}));

    let dispatch = h.router.route(&env);

    assert!(matches!(
        dispatch,
        Dispatch::BattleStarted { category: BattleCategory::Primary, replaced: false }
    ));
    assert!(h.router.battle().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_battle_start_normalizes_other_types_to_secondary() {
    let mut h = harness(false);
    let dispatch = h.router.route(&battle_start(json!(6)));
    assert!(matches!(
        dispatch,
        Dispatch::BattleStarted { category: BattleCategory::Secondary, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_battle_flow_early_trigger_through_router() {
    let mut h = harness(false);
    h.router.route(&battle_start(json!(1)));
    assert!(matches!(h.router.route(&process(0, 150)), Dispatch::BattleUpdated));

    tokio::time::sleep(Duration::from_secs(171)).await;

    let decision = h.decisions.try_recv().unwrap();
    assert_eq!(decision.room_id, ROOM);
    assert_eq!(decision.category, BattleCategory::Primary);

    // Updates to a triggered session are accepted and ignored.
    assert!(matches!(h.router.route(&process(0, 999)), Dispatch::BattleUpdated));
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(h.decisions.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_battle_end_closes_session_without_decision() {
    let mut h = harness(false);
    h.router.route(&battle_start(json!(1)));
    h.router.route(&process(0, 50));
    tokio::time::sleep(Duration::from_secs(200)).await;

    let dispatch = h.router.route(&Envelope::new(Command::BattleEnd, json!({})));

    assert!(matches!(
        dispatch,
        Dispatch::BattleEnded { state: Some(BattleState::Closed) }
    ));
    assert!(h.router.battle().is_none());
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(h.decisions.try_recv().is_err());

    let again = h.router.route(&Envelope::new(Command::BattleEnd, json!({})));
    assert!(matches!(again, Dispatch::BattleEnded { state: None }));
}

#[tokio::test(start_paused = true)]
async fn test_new_battle_start_terminates_previous_session() {
    let mut h = harness(false);
    h.router.route(&battle_start(json!(1)));
    h.router.route(&process(0, 150));

    tokio::time::sleep(Duration::from_secs(100)).await;
    let dispatch = h.router.route(&battle_start(json!(1)));
    assert!(matches!(dispatch, Dispatch::BattleStarted { replaced: true, .. }));

    // The first session would have fired at t = 170.
    tokio::time::sleep(Duration::from_secs(80)).await;
    assert!(h.decisions.try_recv().is_err());

    // The second session has no data: only its end check (t = 390) fires.
    tokio::time::sleep(Duration::from_secs(211)).await;
    let decision = h.decisions.try_recv().unwrap();
    assert_eq!(decision.data, json!({}));
    assert!(h.decisions.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_battle_update_is_reported_as_failure() {
    let mut h = harness(false);
    h.router.route(&battle_start(json!(1)));

    let bad = Envelope::new(Command::BattleInfo, json!({"members": "nope"}));

    assert!(matches!(
        h.router.route(&bad),
        Dispatch::Failed(HandlerError::Battle(_))
    ));
}
