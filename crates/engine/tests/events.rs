//! Signals, correlated messages and timers.

mod common;

use std::sync::Arc;

use orrery_definition::{
    EventNode, GatewayKind, ProcessDefinitionBuilder, TaskNode, Transformation,
};
use orrery_engine::{
    EngineConfig, EngineError, ManualTimerService, ProcessEngine, TimerError, TimerService,
    TimerTarget,
};
use orrery_execution::{CorrelationKey, ErrorKind, ProcessState, TimerHandle};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::*;

fn waiting_on(key: &str, event: EventNode) -> orrery_definition::ProcessDefinition {
    ProcessDefinitionBuilder::new(key)
        .start("start")
        .event("wait", event)
        .end("end")
        .connect("start", "wait")
        .connect("wait", "end")
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn signal_resumes_waiting_node() {
    let engine = engine();
    engine
        .register_definition(waiting_on(
            "approval",
            EventNode::signal("approved").with_payload_variable("decision"),
        ))
        .unwrap();

    let started = engine.start(&process("approval"), data([])).await.unwrap();
    assert_eq!(started.state, ProcessState::Active);

    let finished = engine
        .signal(started.id, &CorrelationKey::signal("approved"), json!("yes"))
        .await
        .unwrap();
    assert_eq!(finished.state, ProcessState::Completed);
    assert_eq!(
        engine.variable(started.id, "decision").await.unwrap(),
        Some(json!("yes"))
    );
}

#[tokio::test]
async fn unmatched_signal_is_dropped() {
    let engine = engine();
    engine
        .register_definition(waiting_on("approval", EventNode::signal("approved")))
        .unwrap();
    let started = engine.start(&process("approval"), data([])).await.unwrap();

    let summary = engine
        .signal(started.id, &CorrelationKey::signal("rejected"), json!(null))
        .await
        .unwrap();
    assert_eq!(summary, started);
}

#[tokio::test]
async fn signal_respects_instance_state() {
    let engine = engine();
    engine
        .register_definition(waiting_on("approval", EventNode::signal("approved")))
        .unwrap();
    let key = CorrelationKey::signal("approved");
    let started = engine.start(&process("approval"), data([])).await.unwrap();

    engine.suspend(started.id).await.unwrap();
    assert!(matches!(
        engine.signal(started.id, &key, json!(null)).await,
        Err(EngineError::InstanceNotActive { state: ProcessState::Suspended, .. })
    ));

    engine.resume(started.id).await.unwrap();
    let finished = engine.signal(started.id, &key, json!(null)).await.unwrap();
    assert_eq!(finished.state, ProcessState::Completed);

    assert!(matches!(
        engine.signal(started.id, &key, json!(null)).await,
        Err(EngineError::InstanceTerminal { state: ProcessState::Completed, .. })
    ));
}

#[tokio::test]
async fn event_transformation_shapes_payload() {
    let engine = engine();
    engine
        .register_definition(waiting_on(
            "orders",
            EventNode::signal("placed")
                .with_transformation(Transformation::new("path", "order.total"))
                .with_payload_variable("total"),
        ))
        .unwrap();
    let started = engine.start(&process("orders"), data([])).await.unwrap();

    engine
        .signal(
            started.id,
            &CorrelationKey::signal("placed"),
            json!({"order": {"total": 12}}),
        )
        .await
        .unwrap();
    assert_eq!(
        engine.variable(started.id, "total").await.unwrap(),
        Some(json!(12))
    );
}

// ---------------------------------------------------------------------------
// Correlated messages and broadcast
// ---------------------------------------------------------------------------

#[tokio::test]
async fn message_reaches_only_correlated_instance() {
    let engine = engine();
    engine
        .register_definition(waiting_on(
            "payments",
            EventNode::message("payment", Some("orderId".to_owned()))
                .with_payload_variable("payment"),
        ))
        .unwrap();

    let first = engine
        .start(&process("payments"), data([("orderId", json!("o-1"))]))
        .await
        .unwrap();
    let second = engine
        .start(&process("payments"), data([("orderId", json!(42))]))
        .await
        .unwrap();

    let delivered = engine
        .broadcast(&CorrelationKey::correlated("payment", "o-1"), json!({"amount": 5}))
        .await
        .unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, first.id);
    assert_eq!(delivered[0].state, ProcessState::Completed);
    assert_eq!(
        engine.summary(second.id).await.unwrap().state,
        ProcessState::Active
    );

    let finished = engine
        .signal(second.id, &CorrelationKey::correlated("payment", "42"), json!({}))
        .await
        .unwrap();
    assert_eq!(finished.state, ProcessState::Completed);
}

#[tokio::test]
async fn unset_correlation_variable_is_an_error() {
    let engine = engine();
    engine
        .register_definition(waiting_on(
            "payments",
            EventNode::message("payment", Some("orderId".to_owned())),
        ))
        .unwrap();

    let summary = engine.start(&process("payments"), data([])).await.unwrap();
    assert_eq!(summary.state, ProcessState::Error);
    assert_eq!(summary.error.unwrap().kind, ErrorKind::VariableResolution);
}

#[tokio::test]
async fn strict_mode_rejects_undeclared_correlation_variable() {
    let engine = ProcessEngine::new(EngineConfig::default().with_strict_variables(true));
    engine
        .register_definition(waiting_on(
            "payments",
            EventNode::message("payment", Some("orderId".to_owned())),
        ))
        .unwrap();

    let summary = engine.start(&process("payments"), data([])).await.unwrap();
    assert_eq!(summary.state, ProcessState::Error);
    let error = summary.error.unwrap();
    assert_eq!(error.kind, ErrorKind::VariableResolution);
    assert!(error.message.contains("orderId"));
}

fn two_listeners() -> orrery_definition::ProcessDefinition {
    ProcessDefinitionBuilder::new("listeners")
        .start("start")
        .gateway("fork", GatewayKind::Parallel)
        .event("first", EventNode::signal("go"))
        .event("second", EventNode::signal("go"))
        .gateway("join", GatewayKind::Parallel)
        .end("end")
        .connect("start", "fork")
        .connect("fork", "first")
        .connect("fork", "second")
        .connect("first", "join")
        .connect("second", "join")
        .connect("join", "end")
        .build()
        .unwrap()
}

#[tokio::test]
async fn broadcast_resolves_every_waiter_in_an_instance() {
    let engine = engine();
    engine.register_definition(two_listeners()).unwrap();
    let key = CorrelationKey::signal("go");

    let signalled = engine.start(&process("listeners"), data([])).await.unwrap();
    let once = engine.signal(signalled.id, &key, json!(null)).await.unwrap();
    assert_eq!(once.state, ProcessState::Active);

    let broadcast = engine.start(&process("listeners"), data([])).await.unwrap();
    let delivered = engine.broadcast(&key, json!(null)).await.unwrap();
    assert_eq!(delivered.len(), 2);
    let summary = delivered.iter().find(|s| s.id == broadcast.id).unwrap();
    assert_eq!(summary.state, ProcessState::Completed);
    assert_eq!(
        engine.summary(signalled.id).await.unwrap().state,
        ProcessState::Completed
    );
    assert!(engine.broadcast(&key, json!(null)).await.unwrap().is_empty());
}

#[tokio::test]
async fn broadcast_skips_instances_that_refuse() {
    let engine = engine();
    engine
        .register_definition(waiting_on("approval", EventNode::signal("go")))
        .unwrap();
    let key = CorrelationKey::signal("go");
    let running = engine.start(&process("approval"), data([])).await.unwrap();
    let parked = engine.start(&process("approval"), data([])).await.unwrap();
    engine.suspend(parked.id).await.unwrap();

    let delivered = engine.broadcast(&key, json!(null)).await.unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, running.id);

    engine.resume(parked.id).await.unwrap();
    let delivered = engine.broadcast(&key, json!(null)).await.unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, parked.id);
    assert_eq!(delivered[0].state, ProcessState::Completed);
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timer_is_scheduled_and_fired() {
    let timers = Arc::new(ManualTimerService::new());
    let engine = engine().with_timer_service(timers.clone());
    engine
        .register_definition(waiting_on("reminder", EventNode::timer("PT5M")))
        .unwrap();

    let started = engine.start(&process("reminder"), data([])).await.unwrap();
    let scheduled = timers.scheduled();
    assert_eq!(scheduled.len(), 1);
    let (handle, timer) = &scheduled[0];
    assert_eq!(timer.expression, "PT5M");
    assert_eq!(timer.target.instance, started.id);

    let fired = timers.fire(&engine, handle).await.unwrap().unwrap();
    assert_eq!(fired.state, ProcessState::Completed);
    assert!(timers.is_empty());
}

#[tokio::test]
async fn direct_delivery_releases_the_timer() {
    let timers = Arc::new(ManualTimerService::new());
    let engine = engine().with_timer_service(timers.clone());
    engine
        .register_definition(waiting_on("reminder", EventNode::timer("PT5M")))
        .unwrap();
    engine.start(&process("reminder"), data([])).await.unwrap();
    let handle = timers.scheduled()[0].0.clone();

    let fired = engine.fire_timer(&handle).await.unwrap().unwrap();
    assert_eq!(fired.state, ProcessState::Completed);
    assert!(timers.is_empty());
    assert_eq!(engine.fire_timer(&handle).await.unwrap(), None);
}

#[tokio::test]
async fn restored_and_new_timers_do_not_collide() {
    let before = Arc::new(ManualTimerService::new());
    let source = engine().with_timer_service(before.clone());
    source
        .register_definition(waiting_on("reminder", EventNode::timer("PT5M")))
        .unwrap();
    let original = source.start(&process("reminder"), data([])).await.unwrap();
    let restored_handle = before.scheduled()[0].0.clone();
    let snapshot = source.snapshot(original.id).await.unwrap();

    let after = Arc::new(ManualTimerService::new());
    let target = engine().with_timer_service(after.clone());
    target
        .register_definition(waiting_on("reminder", EventNode::timer("PT5M")))
        .unwrap();
    let restored = target.restore(snapshot).await.unwrap();
    let fresh = target.start(&process("reminder"), data([])).await.unwrap();
    let fresh_handle = after.scheduled()[0].0.clone();
    assert_ne!(fresh_handle, restored_handle);

    let fired = target.fire_timer(&restored_handle).await.unwrap().unwrap();
    assert_eq!(fired.id, restored);
    assert_eq!(
        target.summary(fresh.id).await.unwrap().state,
        ProcessState::Active
    );
    let fired = after.fire(&target, &fresh_handle).await.unwrap().unwrap();
    assert_eq!(fired.id, fresh.id);
    assert_eq!(fired.state, ProcessState::Completed);
}

#[tokio::test]
async fn suspended_instance_keeps_its_timer() {
    let timers = Arc::new(ManualTimerService::new());
    let engine = engine().with_timer_service(timers.clone());
    engine
        .register_definition(waiting_on("reminder", EventNode::timer("PT1H")))
        .unwrap();
    let started = engine.start(&process("reminder"), data([])).await.unwrap();
    let handle = timers.scheduled()[0].0.clone();

    engine.suspend(started.id).await.unwrap();
    assert!(matches!(
        timers.fire(&engine, &handle).await,
        Err(EngineError::InstanceNotActive { .. })
    ));
    assert_eq!(timers.len(), 1);

    engine.resume(started.id).await.unwrap();
    let fired = timers.fire_all(&engine).await;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].state, ProcessState::Completed);
}

#[tokio::test]
async fn abort_cancels_pending_timer() {
    let timers = Arc::new(ManualTimerService::new());
    let engine = engine().with_timer_service(timers.clone());
    engine
        .register_definition(waiting_on("reminder", EventNode::timer("PT5M")))
        .unwrap();
    let started = engine.start(&process("reminder"), data([])).await.unwrap();
    let handle = timers.scheduled()[0].0.clone();

    let aborted = engine.abort(started.id).await.unwrap();
    assert_eq!(aborted.state, ProcessState::Aborted);
    assert!(timers.is_empty());
    assert_eq!(engine.fire_timer(&handle).await.unwrap(), None);
}

#[tokio::test]
async fn terminate_end_cancels_sibling_timer() {
    let timers = Arc::new(ManualTimerService::new());
    let engine = engine().with_timer_service(timers.clone());
    engine.register_handler(task_type("Work"), Arc::new(CompletingHandler::default()));
    let definition = ProcessDefinitionBuilder::new("deadline")
        .start("start")
        .gateway("fork", GatewayKind::Parallel)
        .event("timeout", EventNode::timer("PT1H"))
        .end("timed_out")
        .task("work", TaskNode::new(task_type("Work")))
        .terminate_end("done")
        .connect("start", "fork")
        .connect("fork", "timeout")
        .connect("fork", "work")
        .connect("timeout", "timed_out")
        .connect("work", "done")
        .build()
        .unwrap();
    engine.register_definition(definition).unwrap();

    let summary = engine.start(&process("deadline"), data([])).await.unwrap();
    assert_eq!(summary.state, ProcessState::Completed);
    assert!(timers.is_empty());
}

struct RefusingTimers;

impl TimerService for RefusingTimers {
    fn schedule(&self, _expression: &str, _target: TimerTarget) -> Result<TimerHandle, TimerError> {
        Err(TimerError::Rejected("scheduler offline".to_owned()))
    }

    fn cancel(&self, handle: &TimerHandle) -> Result<(), TimerError> {
        Err(TimerError::UnknownTimer(handle.clone()))
    }
}

#[tokio::test]
async fn refused_timer_is_an_error() {
    let engine = engine().with_timer_service(Arc::new(RefusingTimers));
    engine
        .register_definition(waiting_on("reminder", EventNode::timer("PT5M")))
        .unwrap();

    let summary = engine.start(&process("reminder"), data([])).await.unwrap();
    assert_eq!(summary.state, ProcessState::Error);
    assert_eq!(summary.error.unwrap().kind, ErrorKind::Timer);
}
