//! Runtime invariant checks with contract test support
//!
//! Registry code asserts its lifecycle invariants through
//! [`assert_invariant!`]. Every check is logged per thread, so a test can
//! drive a scenario and then confirm the invariants it cares about were
//! actually exercised.
//!
//! # Usage
//!
//! ```rust,ignore
//! use record_webcam::invariant_ppt::*;
//!
//! // In registry code
//! assert_invariant!(
//!     stopped.has_artifact(),
//!     "A stopped session owns a finalized artifact",
//!     "stop_recording"
//! );
//!
//! // In tests, after driving a start/stop cycle
//! contract_test("stop finalizes", &[
//!     "A stopped session owns a finalized artifact",
//! ]);
//! ```
//!
//! The log is thread local. Drive scenarios on a current-thread runtime
//! (the `#[tokio::test]` default) so spawned tasks log on the test thread.

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread_local;

thread_local! {
    static INVARIANT_LOG: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Assert an invariant and log it for contract testing.
///
/// # Arguments
/// * `condition` - The invariant condition (must be true)
/// * `message` - Description of the invariant
/// * `context` - Optional context (module/function name)
///
/// # Panics
/// Panics if the condition is false.
#[macro_export]
macro_rules! assert_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariant_ppt::__assert_invariant_impl($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __assert_invariant_impl(condition: bool, message: &str, context: Option<&str>) {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().insert(message.to_string());
    });

    if !condition {
        let ctx = context.unwrap_or("unknown");
        panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
    }
}

/// Check that specific invariants were verified during test execution.
///
/// # Arguments
/// * `test_name` - Name of the contract test
/// * `required_invariants` - List of invariant messages that must have been checked
///
/// # Panics
/// Panics if any required invariant was not checked.
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let log = INVARIANT_LOG.with(|log| log.borrow().clone());

    let mut missing: Vec<&str> = Vec::new();
    for invariant in required_invariants {
        if !log.contains(*invariant) {
            missing.push(invariant);
        }
    }

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: The following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

/// Whether `message` has been checked on this thread.
pub fn invariant_checked(message: &str) -> bool {
    INVARIANT_LOG.with(|log| log.borrow().contains(message))
}

/// Clear the invariant log (call between test runs if needed)
pub fn clear_invariant_log() {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().clear();
    });
}
