//! Data models for test execution
//!
//! Test nodes consumed by the engine, signals raised by user code and the
//! result tree it produces.

mod node;
mod outcome;
mod test_result;

pub use node::{
    hook, property_names, AsyncBodyFn, Body, ErrorHandlerFn, ExpectedError, HookFn, NodeKind,
    Properties, PropertyValue, RunState, TestHooks, TestNode,
};
pub use outcome::{Fault, TestOutcome, TestSignal, PANIC_KIND};
pub use test_result::{
    FailureSite, ResultCounts, ResultState, RunSummary, TestResult, TestStatus,
};
