// tests/sequential_resolver.rs

mod common;
use crate::common::builders::GraphBuilder;
use crate::common::{init_tracing, position};

use depflow::dag::SequentialResolver;
use depflow::errors::ResolveError;
use depflow::module::Module;

/// Drain the resolver, returning ids in processing order.
fn drain(resolver: &mut SequentialResolver) -> Vec<String> {
    let mut order = Vec::new();
    while let Some(module) = resolver.acquire_free().unwrap() {
        order.push(module.id().to_string());
        resolver.release(&module).unwrap();
    }
    order
}

#[test]
fn dependency_is_handed_out_before_its_dependents() {
    init_tracing();

    // A (no deps), B -> A, C -> A
    let g = GraphBuilder::new()
        .module("A", &[])
        .module("B", &["A"])
        .module("C", &["A"])
        .build();

    let mut resolver = SequentialResolver::new();
    resolver.init(&g.all()).unwrap();

    let order = drain(&mut resolver);

    assert_eq!(order.len(), 3);
    assert_eq!(order[0], "A");
    let mut rest = order[1..].to_vec();
    rest.sort();
    assert_eq!(rest, vec!["B", "C"]);
    assert!(resolver.is_exhausted());
}

#[test]
fn diamond_respects_every_edge() {
    let g = GraphBuilder::new()
        .module("A", &[])
        .module("B", &["A"])
        .module("C", &["A"])
        .module("D", &["B", "C"])
        .build();

    let mut resolver = SequentialResolver::new();
    resolver.init(&g.roots(&["D"])).unwrap();
    let order = drain(&mut resolver);

    assert_eq!(order.len(), 4);
    assert!(position(&order, "A") < position(&order, "B"));
    assert!(position(&order, "A") < position(&order, "C"));
    assert!(position(&order, "B") < position(&order, "D"));
    assert!(position(&order, "C") < position(&order, "D"));
}

#[test]
fn acquire_without_release_returns_the_same_module() {
    let g = GraphBuilder::new().module("A", &[]).module("B", &["A"]).build();

    let mut resolver = SequentialResolver::new();
    resolver.init(&g.all()).unwrap();

    let first = resolver.acquire_free().unwrap().unwrap();
    let again = resolver.acquire_free().unwrap().unwrap();
    assert!(Module::same(&first, &again));
}

#[test]
fn acquire_before_init_is_invalid_state() {
    let resolver = SequentialResolver::new();
    assert!(matches!(
        resolver.acquire_free(),
        Err(ResolveError::InvalidState(_))
    ));
}

#[test]
fn release_before_init_is_invalid_state() {
    let mut resolver = SequentialResolver::new();
    let module = Module::with_deps("A", vec![]);
    assert!(matches!(
        resolver.release(&module),
        Err(ResolveError::InvalidState(_))
    ));
}

#[test]
fn release_of_foreign_module_is_invalid_argument() {
    let g = GraphBuilder::new().module("A", &[]).build();
    let stranger = Module::with_deps("A", vec![]);

    let mut resolver = SequentialResolver::new();
    resolver.init(&g.all()).unwrap();

    // Same id, different module: identity is by reference.
    assert!(matches!(
        resolver.release(&stranger),
        Err(ResolveError::InvalidArgument(_))
    ));
}

#[test]
fn double_release_is_invalid_argument() {
    let g = GraphBuilder::new().module("A", &[]).module("B", &["A"]).build();

    let mut resolver = SequentialResolver::new();
    resolver.init(&g.all()).unwrap();

    let a = resolver.acquire_free().unwrap().unwrap();
    resolver.release(&a).unwrap();

    match resolver.release(&a) {
        Err(ResolveError::InvalidArgument(msg)) => assert!(msg.contains("already released")),
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
}

#[test]
fn release_with_unprocessed_dependencies_is_rejected() {
    let g = GraphBuilder::new().module("A", &[]).module("B", &["A"]).build();

    let mut resolver = SequentialResolver::new();
    resolver.init(&g.all()).unwrap();

    assert!(matches!(
        resolver.release(&g.get("B")),
        Err(ResolveError::InvalidArgument(_))
    ));
    // Nothing changed.
    assert_eq!(resolver.remaining(), Some(2));
    assert_eq!(resolver.acquire_free().unwrap().unwrap().id(), "A");
}

#[test]
fn empty_roots_are_immediately_exhausted() {
    let mut resolver = SequentialResolver::new();
    resolver.init(&[]).unwrap();

    assert!(resolver.acquire_free().unwrap().is_none());
    assert!(resolver.is_exhausted());
}

#[test]
fn reinit_discards_the_previous_run() {
    let first = GraphBuilder::new().module("A", &[]).module("B", &["A"]).build();
    let second = GraphBuilder::new().module("X", &[]).build();

    let mut resolver = SequentialResolver::new();
    resolver.init(&first.all()).unwrap();
    let a = resolver.acquire_free().unwrap().unwrap();
    resolver.release(&a).unwrap();

    resolver.init(&second.all()).unwrap();
    assert_eq!(resolver.remaining(), Some(1));
    assert!(matches!(
        resolver.release(&first.get("B")),
        Err(ResolveError::InvalidArgument(_))
    ));
    assert_eq!(drain(&mut resolver), vec!["X"]);
}
