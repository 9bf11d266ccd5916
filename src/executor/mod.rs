//! Test execution module
//!
//! Work items, leaf and suite execution, timeout enforcement, result
//! rollup and the runner that drives them.

mod aggregate;
mod composite;
mod leaf;
mod runner;
mod timeout;
mod work_item;

pub use aggregate::{
    aggregate, ResultAggregator, Rollup, CHILD_CANCELLED_MESSAGE, CHILD_FAILURE_MESSAGE,
    CHILD_IGNORED_MESSAGE,
};
pub use runner::{run_tests, StopHandle, TestRunner};
pub use timeout::{GuardOutcome, TimeoutGuard};
pub use work_item::{CompletionCallback, WorkItem, WorkItemState};
