//! Cross-module ordering and lifecycle tests.
//!
//! These exercise whole pipelines: construction, chaining, adoption and the
//! combinators, all driven through one runtime's job queue.

use std::cell::RefCell;
use std::rc::Rc;

use crate::{rejected, resolved};
use crate::{Deferred, PledgeError, Promise, Reason, Resolution, Runtime, State};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type Log = Rc<RefCell<Vec<String>>>;

fn log_handler(log: &Log, tag: &'static str) -> impl FnOnce(i32) -> Result<Resolution<i32>, Reason> {
    let log = Rc::clone(log);
    move |value| {
        log.borrow_mut().push(format!("{tag}:{value}"));
        resolved!(value)
    }
}

// ============================================================================
// Registration and scheduling order
// ============================================================================

#[test]
fn test_handlers_fire_in_registration_order_when_pending() {
    let rt = Runtime::new();
    let log: Log = Rc::default();
    let d = rt.deferred::<i32>();
    d.promise.and_then(log_handler(&log, "fn1"));
    d.promise.and_then(log_handler(&log, "fn2"));
    d.promise.and_then(log_handler(&log, "fn3"));

    d.resolve.fulfill(1);
    assert!(log.borrow().is_empty());
    rt.run_until_idle().unwrap();

    assert_eq!(*log.borrow(), vec!["fn1:1", "fn2:1", "fn3:1"]);
}

#[test]
fn test_handlers_fire_in_registration_order_when_settled() {
    let rt = Runtime::new();
    let log: Log = Rc::default();
    let p = rt.resolve_value(2);
    p.and_then(log_handler(&log, "fn1"));
    p.and_then(log_handler(&log, "fn2"));

    rt.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["fn1:2", "fn2:2"]);
}

#[test]
fn test_jobs_interleave_across_promises_in_fifo_order() {
    let rt = Runtime::new();
    let log: Log = Rc::default();
    let a = rt.deferred::<i32>();
    let b = rt.deferred::<i32>();
    a.promise
        .and_then(log_handler(&log, "a1"))
        .and_then(log_handler(&log, "a2"));
    b.promise
        .and_then(log_handler(&log, "b1"))
        .and_then(log_handler(&log, "b2"));

    a.resolve.fulfill(1);
    b.resolve.fulfill(2);
    rt.run_until_idle().unwrap();

    assert_eq!(*log.borrow(), vec!["a1:1", "b1:2", "a2:1", "b2:2"]);
}

#[test]
fn test_handler_attached_inside_handler_runs_after_queued_work() {
    let rt = Runtime::new();
    let log: Log = Rc::default();
    let p = rt.resolve_value(0);

    {
        let log_outer = Rc::clone(&log);
        let inner_p = p.clone();
        p.and_then(move |v| {
            log_outer.borrow_mut().push("outer".to_string());
            inner_p.and_then(log_handler(&log_outer, "inner"));
            resolved!(v)
        });
    }
    p.and_then(log_handler(&log, "sibling"));

    rt.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["outer", "sibling:0", "inner:0"]);
}

// ============================================================================
// Settle-once and resolution
// ============================================================================

#[test]
fn test_settled_state_never_changes() {
    let rt = Runtime::new();
    let d = rt.deferred::<i32>();
    d.resolve.fulfill(1);
    let before = (d.promise.state(), d.promise.outcome().unwrap().unwrap());

    d.resolve.fulfill(2);
    d.reject.reject(Reason::msg("late"));
    rt.run_until_idle().unwrap();

    assert_eq!(before, (State::Fulfilled, 1));
    assert_eq!(d.promise.state(), State::Fulfilled);
    assert_eq!(d.promise.outcome().unwrap().unwrap(), 1);
}

#[test]
fn test_handler_returning_its_own_promise_is_cyclic() {
    init_tracing();
    let rt = Runtime::new();
    let slot: Rc<RefCell<Option<Promise<i32>>>> = Rc::default();
    let own = Rc::clone(&slot);

    let child = rt.resolve_value(1).and_then(move |_| {
        let me = own.borrow().clone();
        match me {
            Some(me) => Ok(Resolution::Promise(me)),
            None => rejected!("child not recorded"),
        }
    });
    *slot.borrow_mut() = Some(child.clone());

    let reason = rt.block_on(&child).unwrap_err();
    assert_eq!(reason.as_pledge_error(), Some(&PledgeError::CyclicResolution));
}

#[test]
fn test_starter_resolving_with_own_promise_is_cyclic() {
    let rt = Runtime::new();
    let slot: Rc<RefCell<Option<crate::Resolve<i32>>>> = Rc::default();
    let keep = Rc::clone(&slot);
    let p = rt.promise(move |resolve, _| {
        *keep.borrow_mut() = Some(resolve);
        Ok(())
    });

    if let Some(resolve) = slot.borrow_mut().take() {
        resolve.resolve(p.clone().into());
    }
    assert_eq!(
        p.outcome().unwrap().unwrap_err().as_pledge_error(),
        Some(&PledgeError::CyclicResolution)
    );
}

#[test]
fn test_handler_returning_pending_promise_waits_for_it() {
    let rt = Runtime::new();
    let later = rt.deferred::<i32>();
    let inner = later.promise.clone();
    let p = rt.resolve_value(0).and_then(move |_| Ok(Resolution::Promise(inner)));

    rt.run_until_idle().unwrap();
    assert!(p.is_pending());
    later.resolve.fulfill(99);
    assert_eq!(rt.block_on(&p).unwrap(), 99);
}

#[test]
fn test_long_chain_settles_without_deep_recursion() {
    let rt = Runtime::new();
    let mut p = rt.resolve_value(0u64);
    for _ in 0..10_000 {
        p = p.and_then(|v| resolved!(v + 1));
    }
    assert_eq!(rt.block_on(&p).unwrap(), 10_000);
}

#[test]
fn test_type_changing_chain() {
    let rt = Runtime::new();
    let p = rt
        .resolve_value(21)
        .and_then(|v: i32| resolved!(v * 2))
        .and_then(|v: i32| resolved!(format!("answer={v}")));
    assert_eq!(rt.block_on(&p).unwrap(), "answer=42");
}

// ============================================================================
// Reaction retention
// ============================================================================

#[test]
fn test_reactions_are_released_after_settlement() {
    let rt = Runtime::new();
    let token = Rc::new(());
    let d = rt.deferred::<i32>();

    let on_fulfilled = Rc::clone(&token);
    let on_rejected = Rc::clone(&token);
    d.promise.then(
        move |v| {
            let _held = &on_fulfilled;
            resolved!(v)
        },
        move |reason| {
            let _held = &on_rejected;
            Err(reason)
        },
    );
    assert_eq!(Rc::strong_count(&token), 3);

    d.resolve.fulfill(1);
    // The losing branch is discarded at settlement.
    assert_eq!(Rc::strong_count(&token), 2);
    rt.run_until_idle().unwrap();
    assert_eq!(Rc::strong_count(&token), 1);
}

#[test]
fn test_dropping_long_pending_chain() {
    let rt = Runtime::new();
    let token = Rc::new(());
    let d = rt.deferred::<u64>();
    let mut p = d.promise.clone();
    for _ in 0..100_000 {
        p = p.and_then(|v| resolved!(v + 1));
    }
    let held = Rc::clone(&token);
    p.and_then(move |v| {
        let _held = &held;
        resolved!(v)
    });
    assert_eq!(Rc::strong_count(&token), 2);

    drop(p);
    drop(d);
    assert_eq!(Rc::strong_count(&token), 1);
    assert_eq!(rt.pending_jobs(), 0);
}

#[test]
fn test_dropping_cancelled_race_loser() {
    let rt = Runtime::new();
    let work = rt.deferred::<u64>();
    let cancel = rt.deferred::<u64>();
    let mut chain = work.promise.clone();
    for _ in 0..50_000 {
        chain = chain.and_then(|v| resolved!(v * 2));
    }
    let raced = rt.race(vec![chain, cancel.promise.clone()]);

    cancel.reject.reject(Reason::msg("cancelled"));
    assert_eq!(rt.block_on(&raced).unwrap_err().to_string(), "cancelled");

    drop(raced);
    drop(cancel);
    drop(work);
    assert_eq!(rt.run_until_idle().unwrap(), 0);
}

// ============================================================================
// Combinators under shuffled settlement
// ============================================================================

#[test]
fn test_all_settled_preserves_order_under_shuffled_settlement() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for _ in 0..25 {
        let rt = Runtime::new();
        let inputs: Vec<Deferred<usize>> = (0..8).map(|_| rt.deferred()).collect();
        let p = rt.all_settled(inputs.iter().map(|d| d.promise.clone()));

        let mut order: Vec<usize> = (0..inputs.len()).collect();
        rng.shuffle(&mut order);
        for index in order {
            if index % 3 == 0 {
                inputs[index].reject.reject(Reason::msg(format!("r{index}")));
            } else {
                inputs[index].resolve.fulfill(index);
            }
            if rng.bool() {
                rt.run_until_idle().unwrap();
            }
        }

        let outcomes = rt.block_on(&p).unwrap();
        for (index, outcome) in outcomes.iter().enumerate() {
            if index % 3 == 0 {
                assert_eq!(outcome.status(), State::Rejected);
                assert_eq!(outcome.reason().unwrap().to_string(), format!("r{index}"));
            } else {
                assert_eq!(outcome.value(), Some(&index));
            }
        }
    }
}

#[test]
fn test_all_preserves_order_under_shuffled_settlement() {
    let mut rng = fastrand::Rng::with_seed(42);
    for _ in 0..25 {
        let rt = Runtime::new();
        let inputs: Vec<Deferred<usize>> = (0..6).map(|_| rt.deferred()).collect();
        let p = rt.all(inputs.iter().map(|d| d.promise.clone()));

        let mut order: Vec<usize> = (0..inputs.len()).collect();
        rng.shuffle(&mut order);
        for index in order {
            inputs[index].resolve.fulfill(index * 10);
        }

        assert_eq!(rt.block_on(&p).unwrap(), vec![0, 10, 20, 30, 40, 50]);
    }
}

// ============================================================================
// Async bridge
// ============================================================================

#[tokio::test]
async fn test_settled_future_under_local_set() {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let rt = Runtime::new();
            let d = rt.deferred::<i32>();
            let doubled = d.promise.and_then(|v| resolved!(v * 2));
            let waiter = tokio::task::spawn_local(doubled.settled());

            tokio::task::yield_now().await;
            d.resolve.fulfill(21);
            rt.run_until_idle().unwrap();

            let outcome = waiter.await.unwrap();
            assert_eq!(outcome.unwrap(), 42);
        })
        .await;
}
