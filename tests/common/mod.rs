#![allow(dead_code)]

pub use depflow_test_utils::builders;
pub use depflow_test_utils::init_tracing;

use depflow::module::{Module, ModuleRef};

/// Position of `id` in `order`, panicking with a readable message if absent.
pub fn position(order: &[String], id: &str) -> usize {
    order
        .iter()
        .position(|m| m == id)
        .unwrap_or_else(|| panic!("module {id} missing from {order:?}"))
}

/// Assert every consecutive pair in `cycle` (including last -> first) is a
/// real dependency edge.
pub fn assert_closed_cycle(cycle: &[ModuleRef]) {
    assert!(!cycle.is_empty(), "cycle must not be empty");
    for (i, module) in cycle.iter().enumerate() {
        let next = &cycle[(i + 1) % cycle.len()];
        assert!(
            module.dependencies().iter().any(|d| Module::same(d, next)),
            "{} does not depend on {}",
            module.id(),
            next.id()
        );
    }
}
