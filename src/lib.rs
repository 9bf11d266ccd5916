//! Suite Runner - unit-test execution engine
//!
//! Runs a tree of test cases and suites through their SetUp, body and
//! TearDown lifecycle, enforces per-test timeouts on worker threads, rolls
//! child outcomes up into suite verdicts and reports progress to a listener.
//!
//! ## Features
//!
//! - Work items with a Ready -> Running -> Complete state machine
//! - Stack-scoped execution context with save/restore across nested suites
//! - Per-test timeouts with cooperative cancellation
//! - Async test bodies on a dedicated current-thread runtime
//! - Name and category filters, explicit tests, stop-on-error
//! - Settings from YAML/JSON files and `SUITE_RUNNER_*` variables
//!
//! ## Usage
//!
//! ```no_run
//! use suite_runner::{RunSettings, SuiteBuilder, TestRunner, TestSignal};
//!
//! let root = SuiteBuilder::new("Math")
//!     .test("adds", |ctx| ctx.check_eq(4, 2 + 2))
//!     .test("parses", |_| {
//!         let n: i32 = "42".parse()?;
//!         if n == 42 { Ok(()) } else { Err(TestSignal::fail("bad parse")) }
//!     })
//!     .timeout_ms(500)
//!     .build();
//!
//! let result = TestRunner::new(RunSettings::default()).run(root).unwrap();
//! println!("{}", suite_runner::RunSummary::from_result(&result));
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod executor;
pub mod models;
pub mod utils;

pub use builder::SuiteBuilder;
pub use config::{RunSettings, SettingsFile};
pub use context::{CancellationToken, ExecutionContext, TestContext};
pub use contract::{AllFilter, CategoryFilter, NameFilter, NotFilter, TestFilter, TestListener};
pub use error::EngineError;
pub use executor::{run_tests, StopHandle, TestRunner, WorkItem, WorkItemState};
pub use models::{
    Body, ExpectedError, Fault, RunState, RunSummary, TestNode, TestOutcome, TestResult,
    TestSignal, TestStatus,
};
pub use utils::{init_logger, LogLevel};
