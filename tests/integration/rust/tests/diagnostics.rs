//! Diagnostics Integration Tests
//!
//! Tests the trace and unhandled-rejection reporting across whole programs:
//! the trace tells the scheduling story, and the unhandled list tracks the
//! true end of each failure path.

use core_types::{Fault, Value};
use promise_runtime::{race, EventLoop, Promise, PromiseState, Resolution, TraceEvent};

/// Test: The unhandled list follows a rejection through report and retraction
#[test]
fn test_unhandled_rejection_lifecycle() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let failed = Promise::rejected(&scheduler, Fault::error("nobody caught this"));
    let id = failed.id();
    assert_eq!(
        event_loop.unhandled_rejections(),
        vec![(id, Fault::error("nobody caught this"))],
    );

    // Attaching a handler later retracts the report.
    let recovered = failed.catch(|fault| {
        Ok(Resolution::Value(Value::Text(format!("saw {}", fault.message))))
    });
    assert!(event_loop.unhandled_rejections().is_empty());

    event_loop.run_until_done().unwrap();
    assert!(recovered.is_fulfilled());
    assert!(event_loop.unhandled_rejections().is_empty());

    let trace = event_loop.trace_events();
    let report_position = trace
        .iter()
        .position(|event| matches!(event, TraceEvent::RejectionUnhandled { .. }))
        .expect("report missing");
    let retraction_position = trace
        .iter()
        .position(|event| matches!(event, TraceEvent::RejectionHandled { .. }))
        .expect("retraction missing");
    assert!(report_position < retraction_position);
}

/// Test: Racing work against an abort signal cancels cleanly
#[test]
fn test_abort_signal_wins_the_race() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let (work, work_producer) = Promise::with_producer(&scheduler);
    event_loop.set_timeout("work", 30, move || {
        work_producer.resolve(Value::Text("finished".to_string()));
        Ok(())
    });
    let (abort, abort_producer) = Promise::with_producer(&scheduler);
    event_loop.set_timeout("abort", 5, move || {
        abort_producer.reject(Fault::error("aborted by user"));
        Ok(())
    });

    let guarded = race(
        &scheduler,
        vec![Resolution::Promise(work), Resolution::Promise(abort)],
    );
    let outcome = guarded.catch(|fault| {
        Ok(Resolution::Value(Value::Text(format!("stopped: {}", fault.message))))
    });

    event_loop.run_until_done().unwrap();
    assert_eq!(
        outcome.state(),
        PromiseState::Fulfilled(Value::Text("stopped: aborted by user".to_string())),
    );
    // Both settlement paths were observed; nothing is left dangling.
    assert!(event_loop.unhandled_rejections().is_empty());
    assert_eq!(event_loop.now_ms(), 30);
}

/// Test: Clock movements in the trace mirror the timer schedule exactly
#[test]
fn test_trace_records_every_clock_movement() {
    let event_loop = EventLoop::new();
    event_loop.set_timeout("first", 10, || Ok(()));
    event_loop.set_timeout("second", 30, || Ok(()));
    event_loop.run_until_done().unwrap();

    let clock_moves: Vec<TraceEvent> = event_loop
        .trace_events()
        .into_iter()
        .filter(|event| matches!(event, TraceEvent::ClockAdvanced { .. }))
        .collect();
    assert_eq!(
        clock_moves,
        vec![
            TraceEvent::ClockAdvanced { from_ms: 0, to_ms: 10 },
            TraceEvent::ClockAdvanced { from_ms: 10, to_ms: 30 },
        ],
    );
}

/// Test: Microtask labels name the reaction kind they carry
#[test]
fn test_microtask_labels_identify_reactions() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    // One then-reaction and one adoption.
    let inner = Promise::fulfilled(&scheduler, Value::Int(1));
    let (outer, producer) = Promise::with_producer(&scheduler);
    producer.resolve(inner);
    outer.then(
        Some(Box::new(|value| Ok(Resolution::Value(value)))),
        None,
    );

    event_loop.run_until_done().unwrap();
    let labels: Vec<String> = event_loop
        .trace_events()
        .into_iter()
        .filter_map(|event| match event {
            TraceEvent::MicrotaskEnqueued { label, .. } => Some(label),
            _ => None,
        })
        .collect();
    assert!(labels.iter().any(|label| label.starts_with("adopt:")));
    assert!(labels.iter().any(|label| label.starts_with("then:")));
}

/// Test: A full program's settlement events appear in dependency order
#[test]
fn test_settlements_appear_in_dependency_order() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let (source, producer) = Promise::with_producer(&scheduler);
    let source_id = source.id();
    let downstream = source.then(
        Some(Box::new(|value| Ok(Resolution::Value(value)))),
        None,
    );
    let downstream_id = downstream.id();

    producer.resolve(Value::Int(1));
    event_loop.run_until_done().unwrap();

    let fulfillments: Vec<u64> = event_loop
        .trace_events()
        .into_iter()
        .filter_map(|event| match event {
            TraceEvent::PromiseFulfilled { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(fulfillments, vec![source_id, downstream_id]);
}
