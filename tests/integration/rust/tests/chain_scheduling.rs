//! Chain Scheduling Integration Tests
//!
//! Tests the complete flow: Timer -> Producer -> Reaction chain -> Event loop
//! cycle, with virtual time and microtask ordering observed end to end.

use std::cell::RefCell;
use std::rc::Rc;

use core_types::{Fault, Value};
use promise_runtime::{EventLoop, Promise, PromiseState, Resolution};

/// Helper that adds `n` to an integer payload and forwards anything else
fn add(n: i64) -> Box<dyn FnOnce(Value) -> Result<Resolution, Fault>> {
    Box::new(move |value| match value {
        Value::Int(v) => Ok(Resolution::Value(Value::Int(v + n))),
        other => Ok(Resolution::Value(other)),
    })
}

/// Test: A timer-settled promise drives a multi-hop chain to completion
#[test]
fn test_timer_settlement_drives_a_chain() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let (source, producer) = Promise::with_producer(&scheduler);
    event_loop.set_timeout("source", 25, move || {
        producer.resolve(Value::Int(100));
        Ok(())
    });

    let result = source.then(Some(add(1)), None).then(Some(add(10)), None);

    assert!(result.is_pending());
    event_loop.run_until_done().unwrap();
    assert_eq!(result.state(), PromiseState::Fulfilled(Value::Int(111)));
    assert_eq!(event_loop.now_ms(), 25);
}

/// Test: Chains from different timers interleave by timer order, not creation order
#[test]
fn test_chains_interleave_by_timer_order() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let order = Rc::new(RefCell::new(Vec::new()));

    // Created first, settles second.
    let (late, late_producer) = Promise::with_producer(&scheduler);
    event_loop.set_timeout("late", 20, move || {
        late_producer.resolve(Value::Null);
        Ok(())
    });
    let log = Rc::clone(&order);
    late.then(
        Some(Box::new(move |_value| {
            log.borrow_mut().push("late-chain");
            Ok(Resolution::Value(Value::Undefined))
        })),
        None,
    );

    // Created second, settles first.
    let (early, early_producer) = Promise::with_producer(&scheduler);
    event_loop.set_timeout("early", 10, move || {
        early_producer.resolve(Value::Null);
        Ok(())
    });
    let log = Rc::clone(&order);
    early.then(
        Some(Box::new(move |_value| {
            log.borrow_mut().push("early-chain");
            Ok(Resolution::Value(Value::Undefined))
        })),
        None,
    );

    event_loop.run_until_done().unwrap();
    assert_eq!(order.borrow().as_slice(), ["early-chain", "late-chain"]);
}

/// Test: A mid-chain recovery returns the chain to the fulfillment path
#[test]
fn test_fault_recovery_mid_chain() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let (source, producer) = Promise::with_producer(&scheduler);
    event_loop.set_timeout("fail-source", 5, move || {
        producer.reject(Fault::error("fetch failed"));
        Ok(())
    });

    let result = source
        .then(Some(add(1)), None)
        .catch(|fault| {
            Ok(Resolution::Value(Value::Text(format!(
                "fallback after {}",
                fault.message
            ))))
        })
        .then(
            Some(Box::new(|value| Ok(Resolution::Value(value)))),
            None,
        );

    event_loop.run_until_done().unwrap();
    assert_eq!(
        result.state(),
        PromiseState::Fulfilled(Value::Text("fallback after fetch failed".to_string())),
    );
}

/// Test: A handler-returned promise is adopted across timer boundaries
#[test]
fn test_adoption_across_timer_boundaries() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let (second_stage, second_producer) = Promise::with_producer(&scheduler);
    event_loop.set_timeout("second-stage", 30, move || {
        second_producer.resolve(Value::Text("stage two".to_string()));
        Ok(())
    });

    let (first_stage, first_producer) = Promise::with_producer(&scheduler);
    event_loop.set_timeout("first-stage", 10, move || {
        first_producer.resolve(Value::Text("stage one".to_string()));
        Ok(())
    });

    let result = first_stage.then(
        Some(Box::new(move |_value| {
            Ok(Resolution::Promise(second_stage.clone()))
        })),
        None,
    );

    event_loop.run_until_done().unwrap();
    assert_eq!(
        result.state(),
        PromiseState::Fulfilled(Value::Text("stage two".to_string())),
    );
    assert_eq!(event_loop.now_ms(), 30);
}

/// Test: Every chain hop costs exactly one microtask
#[test]
fn test_each_hop_is_one_microtask() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let hops = Rc::new(RefCell::new(Vec::new()));

    let (source, producer) = Promise::with_producer(&scheduler);
    let mut chain = source.clone();
    for hop in 0..3 {
        let log = Rc::clone(&hops);
        chain = chain.then(
            Some(Box::new(move |value| {
                log.borrow_mut().push(hop);
                Ok(Resolution::Value(value))
            })),
            None,
        );
    }

    producer.resolve(Value::Int(0));
    // One drain pass runs all three hops, each as its own microtask.
    let drained = event_loop.run_all_microtasks().unwrap();
    assert_eq!(drained, 3);
    assert_eq!(hops.borrow().as_slice(), [0, 1, 2]);
    assert!(chain.is_fulfilled());
}
