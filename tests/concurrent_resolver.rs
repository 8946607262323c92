// tests/concurrent_resolver.rs

mod common;
use crate::common::builders::{Graph, GraphBuilder};
use crate::common::init_tracing;

use std::collections::HashSet;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use depflow::dag::{CancelToken, ConcurrentResolver, RunStatus};
use depflow::errors::ResolveError;
use depflow::module::Module;

fn diamond() -> Graph {
    GraphBuilder::new()
        .module("A", &[])
        .module("B", &["A"])
        .module("C", &["A"])
        .module("D", &["B", "C"])
        .build()
}

/// Run `workers` threads against `resolver`, checking on every acquisition
/// that all dependencies were already released. Returns acquired ids.
/// Wait until `count` callers are parked inside `acquire_free`.
fn wait_for_blocked(resolver: &ConcurrentResolver, count: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while resolver.waiting() < count {
        assert!(
            Instant::now() < deadline,
            "expected {count} blocked callers, saw {}",
            resolver.waiting()
        );
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(resolver.waiting(), count);
}

fn drain_with_workers(resolver: &ConcurrentResolver, workers: usize) -> Vec<String> {
    let released: Mutex<HashSet<String>> = Mutex::new(HashSet::new());
    let acquired: Mutex<Vec<String>> = Mutex::new(Vec::new());

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                while let Some(module) = resolver.acquire_free().unwrap() {
                    {
                        let released = released.lock().unwrap();
                        for dep in module.dependencies() {
                            assert!(
                                released.contains(dep.id().as_str()),
                                "{} acquired before its dependency {} was released",
                                module.id(),
                                dep.id()
                            );
                        }
                    }
                    acquired.lock().unwrap().push(module.id().to_string());

                    // Recorded before the release so it is visible to whoever
                    // acquires a dependent.
                    released.lock().unwrap().insert(module.id().to_string());
                    resolver.release(&module).unwrap();
                }
            });
        }
    });

    acquired.into_inner().unwrap()
}

#[test]
fn three_workers_drain_a_diamond_in_order() {
    init_tracing();

    let g = diamond();
    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();

    let mut acquired = drain_with_workers(&resolver, 3);

    acquired.sort();
    assert_eq!(acquired, vec!["A", "B", "C", "D"]);
    assert_eq!(resolver.status(), RunStatus::Exhausted);
    // Every later caller also sees the end of the run.
    assert!(resolver.acquire_free().unwrap().is_none());
}

#[test]
fn wide_layered_graph_is_drained_exactly_once() {
    // 10 layers of 20 modules; each module depends on three modules of the
    // previous layer.
    let mut builder = GraphBuilder::new();
    for layer in 0..10 {
        for i in 0..20 {
            let id = format!("L{layer}_{i}");
            let deps: Vec<String> = if layer == 0 {
                Vec::new()
            } else {
                (0..3)
                    .map(|k| format!("L{}_{}", layer - 1, (i + k * 7) % 20))
                    .collect()
            };
            let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
            builder = builder.module(&id, &deps);
        }
    }
    let g = builder.build();

    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();

    let acquired = drain_with_workers(&resolver, 8);

    assert_eq!(acquired.len(), 200);
    let unique: HashSet<&String> = acquired.iter().collect();
    assert_eq!(unique.len(), 200);
    assert_eq!(resolver.status(), RunStatus::Exhausted);
}

#[test]
fn release_wakes_a_blocked_worker() {
    let g = GraphBuilder::new().module("A", &[]).module("B", &["A"]).build();
    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();

    let a = resolver.acquire_free().unwrap().unwrap();

    thread::scope(|scope| {
        let waiter = scope.spawn(|| resolver.acquire_free().unwrap());

        wait_for_blocked(&resolver, 1);
        resolver.release(&a).unwrap();

        let b = waiter.join().unwrap().expect("B becomes free once A is released");
        assert_eq!(b.id(), "B");
    });
    assert_eq!(resolver.waiting(), 0);
}

#[test]
fn waiters_see_none_once_the_last_module_is_handed_out() {
    let g = GraphBuilder::new().module("A", &[]).build();
    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();

    let a = resolver.acquire_free().unwrap().unwrap();

    // A is still in flight, but nothing else can ever become free.
    assert!(resolver.acquire_free().unwrap().is_none());
    assert_eq!(resolver.status(), RunStatus::Running);

    resolver.release(&a).unwrap();
    assert_eq!(resolver.status(), RunStatus::Exhausted);
}

#[test]
fn acquire_before_init_is_invalid_state() {
    let resolver = ConcurrentResolver::new();
    assert!(matches!(
        resolver.acquire_free(),
        Err(ResolveError::InvalidState(_))
    ));
    assert_eq!(resolver.status(), RunStatus::Uninitialized);
}

#[test]
fn release_of_unacquired_module_is_invalid_argument() {
    let g = diamond();
    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();

    // Free but never acquired.
    assert!(matches!(
        resolver.release(&g.get("A")),
        Err(ResolveError::InvalidArgument(_))
    ));
    // Never part of this run.
    let stranger = Module::with_deps("A", vec![]);
    assert!(matches!(
        resolver.release(&stranger),
        Err(ResolveError::InvalidArgument(_))
    ));
}

#[test]
fn double_release_is_invalid_argument() {
    let g = diamond();
    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();

    let a = resolver.acquire_free().unwrap().unwrap();
    resolver.release(&a).unwrap();
    assert!(matches!(
        resolver.release(&a),
        Err(ResolveError::InvalidArgument(_))
    ));
}

#[test]
fn release_after_abort_is_a_no_op() {
    let g = diamond();
    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();

    let never_acquired = g.get("D");
    assert!(resolver.release(&never_acquired).is_err());

    let a = resolver.acquire_free().unwrap().unwrap();
    resolver.abort();

    resolver.release(&a).unwrap();
    assert!(resolver.acquire_free().unwrap().is_none());
    assert_eq!(resolver.status(), RunStatus::Aborted);
}

#[test]
fn abort_wakes_every_blocked_worker() {
    init_tracing();

    let g = GraphBuilder::new().module("A", &[]).module("B", &["A"]).build();
    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();

    // Hold A so everyone else blocks waiting for B.
    let _a = resolver.acquire_free().unwrap().unwrap();

    thread::scope(|scope| {
        let waiters: Vec<_> = (0..3)
            .map(|_| scope.spawn(|| resolver.acquire_free().unwrap()))
            .collect();

        wait_for_blocked(&resolver, 3);
        resolver.abort();

        for waiter in waiters {
            assert!(waiter.join().unwrap().is_none());
        }
    });
    assert_eq!(resolver.waiting(), 0);
}

#[test]
fn abort_is_idempotent() {
    let g = diamond();
    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();
    let a = resolver.acquire_free().unwrap().unwrap();

    resolver.abort();
    let after_once = (resolver.status(), resolver.in_flight());
    resolver.abort();
    let after_twice = (resolver.status(), resolver.in_flight());

    assert_eq!(after_once, after_twice);
    assert!(resolver.acquire_free().unwrap().is_none());
    resolver.release(&a).unwrap();
}

#[test]
fn abort_before_init_is_harmless() {
    let resolver = ConcurrentResolver::new();
    resolver.abort();
    assert_eq!(resolver.status(), RunStatus::Uninitialized);
}

#[test]
fn reinit_clears_aborted_status() {
    let g = diamond();
    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();
    resolver.abort();
    assert!(resolver.is_aborted());

    resolver.init(&g.all()).unwrap();
    assert_eq!(resolver.status(), RunStatus::Running);
    assert_eq!(resolver.acquire_free().unwrap().unwrap().id(), "A");
}

#[test]
fn cycle_on_init_keeps_previous_run() {
    let g = diamond();
    let cyclic = GraphBuilder::new().module("X", &["Y"]).module("Y", &["X"]).build();

    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();
    assert!(matches!(
        resolver.init(&cyclic.all()),
        Err(ResolveError::Cycle(_))
    ));
    assert_eq!(resolver.acquire_free().unwrap().unwrap().id(), "A");
}

#[test]
fn cancelling_a_blocked_worker_fails_with_cancelled() {
    let g = GraphBuilder::new().module("A", &[]).module("B", &["A"]).build();
    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();
    let a = resolver.acquire_free().unwrap().unwrap();

    let token = CancelToken::new();

    thread::scope(|scope| {
        let waiter = scope.spawn(|| resolver.acquire_free_cancellable(&token));

        wait_for_blocked(&resolver, 1);
        token.cancel();

        assert!(matches!(
            waiter.join().unwrap(),
            Err(ResolveError::Cancelled)
        ));
    });

    // The signal is preserved for the caller, and the run itself continues.
    assert!(token.is_cancelled());
    assert_eq!(resolver.status(), RunStatus::Running);
    resolver.release(&a).unwrap();
    assert_eq!(resolver.acquire_free().unwrap().unwrap().id(), "B");
}

#[test]
fn already_cancelled_token_fails_without_blocking() {
    let g = diamond();
    let resolver = ConcurrentResolver::new();
    resolver.init(&g.all()).unwrap();

    let token = CancelToken::new();
    token.cancel();
    token.cancel();

    assert!(matches!(
        resolver.acquire_free_cancellable(&token),
        Err(ResolveError::Cancelled)
    ));
}
