//! Leaf execution
//!
//! Runs SetUp, the body and TearDown of a single test case and classifies
//! what they signalled. Panics are caught here and never cross the work item
//! boundary; a checkpoint abort becomes a cancellation.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

use super::timeout::{GuardOutcome, TimeoutGuard};
use crate::context::{is_thread_abort, ExecutionContext, TestContext};
use crate::error::EngineError;
use crate::models::{
    AsyncBodyFn, Body, ExpectedError, FailureSite, Fault, ResultState, TestHooks, TestNode,
    TestOutcome, TestResult, TestSignal, TestStatus,
};

pub(crate) const RUN_CANCELLED: &str = "Test run cancelled";
const TEST_CANCELLED: &str = "Test cancelled";

/// Classified outcome of a leaf, applied to its result by the orchestrator
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Verdict {
    pub state: ResultState,
    pub message: Option<String>,
    pub stack_trace: Option<String>,
}

impl Verdict {
    pub fn new(state: ResultState, message: Option<String>) -> Self {
        Self {
            state,
            message,
            stack_trace: None,
        }
    }

    pub fn success() -> Self {
        Self::new(ResultState::success(), None)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(ResultState::failure(), Some(message.into()))
    }

    pub fn from_signal(signal: &TestSignal, site: FailureSite) -> Self {
        Self {
            state: ResultState::from_signal(signal).with_site(site),
            message: signal.message(),
            stack_trace: signal.stack_trace(),
        }
    }

    pub fn from_outcome(outcome: TestOutcome, site: FailureSite) -> Self {
        match outcome {
            Ok(()) => Self::success(),
            Err(signal) => Self::from_signal(&signal, site),
        }
    }

    /// Fold a TearDown fault into this verdict, keeping any earlier message
    pub fn record_tear_down(&mut self, signal: &TestSignal) {
        let status = match self.state.status {
            TestStatus::Cancelled => TestStatus::Cancelled,
            _ => TestStatus::Error,
        };
        self.state = ResultState::new(status, "").with_site(FailureSite::TearDown);

        let tear_down = format!("TearDown : {}", signal.message().unwrap_or_default());
        self.message = Some(match self.message.take() {
            Some(message) => format!("{message}\n{tear_down}"),
            None => tear_down,
        });
        if self.stack_trace.is_none() {
            self.stack_trace = signal.stack_trace();
        }
    }

    pub fn apply_to(self, result: &mut TestResult) {
        result.state = self.state;
        result.message = self.message;
        result.stack_trace = self.stack_trace;
    }
}

/// Run user code, converting panics into signals
pub(crate) fn invoke<F>(f: F) -> TestOutcome
where
    F: FnOnce() -> TestOutcome,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let outcome = if is_thread_abort(payload.as_ref()) {
                Err(TestSignal::cancel(TEST_CANCELLED))
            } else {
                Err(Fault::from_panic(payload.as_ref()).into())
            };
            discard_payload(payload);
            outcome
        }
    }
}

/// Drop a caught panic payload whose own `Drop` may panic
pub(crate) fn discard_payload(payload: Box<dyn Any + Send>) {
    if let Err(nested) = panic::catch_unwind(AssertUnwindSafe(move || drop(payload))) {
        std::mem::forget(nested);
    }
}

/// Execute a test case under `context`, writing the verdict into `result`
pub(crate) fn run_leaf(
    node: &Arc<TestNode>,
    context: &mut ExecutionContext,
    result: &mut TestResult,
) -> Result<(), EngineError> {
    if context.stop_requested() {
        Verdict::new(ResultState::cancelled(), Some(RUN_CANCELLED.to_string())).apply_to(result);
        return Ok(());
    }

    let token = context.stop_token().child();
    let test_ctx = context.test_context(node, token.clone());

    let verdict = match context.effective_timeout(node) {
        Some(budget) => {
            let guard = TimeoutGuard::new(budget);
            let hooks = node.hooks.clone();
            let worker_ctx = test_ctx.clone();
            match guard.run(&node.full_name, &token, move || run_phases(&hooks, &worker_ctx)) {
                Ok(GuardOutcome::Completed(verdict)) => verdict,
                Ok(GuardOutcome::TimedOut) => Verdict::failure(guard.failure_message()),
                Err(e) => {
                    warn!("{} could not be guarded: {}", node.full_name, e);
                    Verdict::new(ResultState::error(), Some(e.to_string()))
                }
            }
        }
        None => run_phases(&node.hooks, &test_ctx),
    };

    if verdict.state.status == TestStatus::Cancelled {
        warn!("{} was cancelled", node.full_name);
    }

    context.add_assertions(test_ctx.assert_count());
    verdict.apply_to(result);
    Ok(())
}

/// SetUp, body and TearDown; a failed SetUp skips the other two
fn run_phases(hooks: &TestHooks, ctx: &TestContext) -> Verdict {
    if let Some(set_up) = &hooks.set_up {
        if let Err(signal) = invoke(|| set_up(ctx)) {
            debug!("SetUp of {} failed: {}", ctx.full_name(), signal);
            return Verdict::from_signal(&signal, FailureSite::SetUp);
        }
    }

    let outcome = match &hooks.body {
        Some(body) => run_body(body, ctx),
        None => Ok(()),
    };

    let mut verdict = match &hooks.expected_error {
        Some(expected) => check_expected(expected, outcome, ctx),
        None => Verdict::from_outcome(outcome, FailureSite::Test),
    };

    if let Some(tear_down) = &hooks.tear_down {
        match invoke(|| tear_down(ctx)) {
            Ok(()) | Err(TestSignal::Success(_)) => {}
            Err(signal) => verdict.record_tear_down(&signal),
        }
    }

    verdict
}

fn run_body(body: &Body, ctx: &TestContext) -> TestOutcome {
    match body {
        Body::Sync(f) => invoke(|| f(ctx)),
        Body::Async(factory) => {
            // A runtime cannot be started from a thread already driving one
            if tokio::runtime::Handle::try_current().is_ok() {
                std::thread::scope(|scope| {
                    scope
                        .spawn(|| drive_async(factory, ctx))
                        .join()
                        .unwrap_or_else(|payload| {
                            let fault = Fault::from_panic(payload.as_ref());
                            discard_payload(payload);
                            Err(fault.into())
                        })
                })
            } else {
                drive_async(factory, ctx)
            }
        }
    }
}

/// Drive an async body to completion on a fresh current-thread runtime,
/// racing it against the test's cancellation token
fn drive_async(factory: &AsyncBodyFn, ctx: &TestContext) -> TestOutcome {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestSignal::Error(Fault::from_error(&e)))?;

    let token = ctx.cancellation().clone();
    invoke(|| {
        let body = factory(ctx.clone());
        runtime.block_on(async move {
            tokio::select! {
                outcome = body => outcome,
                _ = token.cancelled() => Err(TestSignal::cancel(TEST_CANCELLED)),
            }
        })
    })
}

fn check_expected(expected: &ExpectedError, outcome: TestOutcome, ctx: &TestContext) -> Verdict {
    match outcome {
        Err(TestSignal::Error(fault)) if expected.matches(&fault) => match &expected.handler {
            Some(handler) => {
                Verdict::from_outcome(invoke(|| handler(&fault, ctx)), FailureSite::Test)
            }
            None => Verdict::success(),
        },
        Err(TestSignal::Error(fault)) => Verdict::failure(format!(
            "Expected Exception of type {}, but was {}",
            expected.kind, fault.kind
        )),
        Ok(()) | Err(TestSignal::Success(_)) => Verdict::failure(format!(
            "Expected Exception of type {}, but none was thrown",
            expected.kind
        )),
        Err(signal) => Verdict::from_signal(&signal, FailureSite::Test),
    }
}
