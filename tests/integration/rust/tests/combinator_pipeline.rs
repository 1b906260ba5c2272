//! Combinator Pipeline Integration Tests
//!
//! Tests the combinators over timer-backed inputs: gathering, first-wins
//! selection, timeout guards, and settlement reports.

use core_types::{Fault, FaultKind, Value};
use promise_runtime::{all, all_settled, any, race, EventLoop, Promise, PromiseState, Resolution};

/// Helper that models a service call completing after `delay_ms`
fn service_call(event_loop: &EventLoop, name: &'static str, delay_ms: u64) -> Promise {
    let scheduler = event_loop.scheduler();
    let (promise, producer) = Promise::with_producer(&scheduler);
    event_loop.set_timeout(name, delay_ms, move || {
        producer.resolve(Value::Text(name.to_string()));
        Ok(())
    });
    promise
}

/// Helper that models a service call failing after `delay_ms`
fn failing_call(event_loop: &EventLoop, name: &'static str, delay_ms: u64) -> Promise {
    let scheduler = event_loop.scheduler();
    let (promise, producer) = Promise::with_producer(&scheduler);
    event_loop.set_timeout(name, delay_ms, move || {
        producer.reject(Fault::error(name));
        Ok(())
    });
    promise
}

/// Test: all() gathers service results in call order
#[test]
fn test_all_gathers_service_results() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let gathered = all(
        &scheduler,
        vec![
            Resolution::Promise(service_call(&event_loop, "users", 30)),
            Resolution::Promise(service_call(&event_loop, "orders", 10)),
            Resolution::Promise(service_call(&event_loop, "stock", 20)),
        ],
    );

    event_loop.run_until_done().unwrap();
    assert_eq!(
        gathered.state(),
        PromiseState::Fulfilled(Value::List(vec![
            Value::Text("users".to_string()),
            Value::Text("orders".to_string()),
            Value::Text("stock".to_string()),
        ])),
    );
}

/// Test: any() returns the first healthy replica and ignores earlier failures
#[test]
fn test_any_takes_first_healthy_replica() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let reply = any(
        &scheduler,
        vec![
            Resolution::Promise(failing_call(&event_loop, "replica-a", 5)),
            Resolution::Promise(service_call(&event_loop, "replica-b", 15)),
            Resolution::Promise(service_call(&event_loop, "replica-c", 25)),
        ],
    );

    event_loop.run_until_done().unwrap();
    assert_eq!(
        reply.state(),
        PromiseState::Fulfilled(Value::Text("replica-b".to_string())),
    );
}

/// Test: race() against a deadline rejects slow work
#[test]
fn test_race_enforces_a_deadline() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let slow_work = service_call(&event_loop, "slow-work", 30);
    let (deadline, deadline_producer) = Promise::with_producer(&scheduler);
    event_loop.set_timeout("deadline", 10, move || {
        deadline_producer.reject(Fault::error("deadline exceeded"));
        Ok(())
    });

    let guarded = race(
        &scheduler,
        vec![Resolution::Promise(slow_work), Resolution::Promise(deadline)],
    );
    let observed = guarded.catch(|fault| {
        Ok(Resolution::Value(Value::Text(format!(
            "aborted: {}",
            fault.message
        ))))
    });

    event_loop.run_until_done().unwrap();
    assert_eq!(
        observed.state(),
        PromiseState::Fulfilled(Value::Text("aborted: deadline exceeded".to_string())),
    );
}

/// Test: allSettled() reports every branch for a status page
#[test]
fn test_all_settled_reports_every_branch() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let report = all_settled(
        &scheduler,
        vec![
            Resolution::Promise(service_call(&event_loop, "healthy", 10)),
            Resolution::Promise(failing_call(&event_loop, "degraded", 20)),
        ],
    );

    event_loop.run_until_done().unwrap();
    let statuses: Vec<Value> = match report.state() {
        PromiseState::Fulfilled(Value::List(items)) => items
            .iter()
            .filter_map(|descriptor| match descriptor {
                Value::Map(entries) => entries.get("status").cloned(),
                _ => None,
            })
            .collect(),
        other => panic!("expected fulfilled list, got {:?}", other),
    };
    assert_eq!(
        statuses,
        vec![
            Value::Text("fulfilled".to_string()),
            Value::Text("rejected".to_string()),
        ],
    );
}

/// Test: combinators nest into a fan-out/fan-in pipeline
#[test]
fn test_combinators_nest_into_a_pipeline() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let fastest_mirror = race(
        &scheduler,
        vec![
            Resolution::Promise(service_call(&event_loop, "mirror-eu", 20)),
            Resolution::Promise(service_call(&event_loop, "mirror-us", 10)),
        ],
    );
    let first_auth = any(
        &scheduler,
        vec![
            Resolution::Promise(failing_call(&event_loop, "auth-primary", 5)),
            Resolution::Promise(service_call(&event_loop, "auth-backup", 15)),
        ],
    );
    let combined = all(
        &scheduler,
        vec![
            Resolution::Promise(fastest_mirror),
            Resolution::Promise(first_auth),
        ],
    );

    event_loop.run_until_done().unwrap();
    assert_eq!(
        combined.state(),
        PromiseState::Fulfilled(Value::List(vec![
            Value::Text("mirror-us".to_string()),
            Value::Text("auth-backup".to_string()),
        ])),
    );
}

/// Test: an all() failure carries the failing input's fault unchanged
#[test]
fn test_all_failure_preserves_the_original_fault() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let gathered = all(
        &scheduler,
        vec![
            Resolution::Promise(service_call(&event_loop, "fine", 20)),
            Resolution::Promise(failing_call(&event_loop, "broken", 10)),
        ],
    );
    let observed = gathered.catch(|fault| Ok(Resolution::Value(fault.to_value())));

    event_loop.run_until_done().unwrap();
    match observed.state() {
        PromiseState::Fulfilled(Value::Map(entries)) => {
            assert_eq!(
                entries.get("kind"),
                Some(&Value::Text(FaultKind::Error.name().to_string())),
            );
            assert_eq!(entries.get("message"), Some(&Value::Text("broken".to_string())));
        }
        other => panic!("expected fault map, got {:?}", other),
    }
}
