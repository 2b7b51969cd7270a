//! Queue-check orchestration: ignore list, structural pre-checks, and the
//! removal decision surfaced to the polling caller.

pub mod checker;
pub mod decision;
pub mod ignore;
#[cfg(test)]
mod integration_tests;

pub use checker::QueueChecker;
pub use decision::{DeleteReason, RemovalDecision};
pub use ignore::IgnoreList;
