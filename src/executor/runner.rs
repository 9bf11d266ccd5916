//! Test execution runner
//!
//! Builds the root work item for a test tree and drives it to completion.

use std::sync::Arc;
use tracing::{error, info};

use super::work_item::WorkItem;
use crate::config::RunSettings;
use crate::context::{CancellationToken, ExecutionContext};
use crate::contract::{AllFilter, TestFilter, TestListener, TracingListener};
use crate::error::EngineError;
use crate::models::{RunSummary, TestNode, TestResult};

/// Handle for requesting that a running run stops
#[derive(Clone, Debug)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Cancel the run: running tests unwind at their next checkpoint and
    /// tests not yet started report Cancelled
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Check if a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Runner for test trees
pub struct TestRunner {
    settings: RunSettings,
    listener: Arc<dyn TestListener>,
    filter: Arc<dyn TestFilter>,
    stop_token: CancellationToken,
}

impl TestRunner {
    /// Create a new test runner
    pub fn new(settings: RunSettings) -> Self {
        Self {
            settings,
            listener: Arc::new(TracingListener),
            filter: Arc::new(AllFilter),
            stop_token: CancellationToken::new(),
        }
    }

    /// Set progress listener
    pub fn with_listener(mut self, listener: Arc<dyn TestListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Set test filter
    pub fn with_filter(mut self, filter: impl TestFilter + 'static) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    /// Set default test case timeout
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.settings.default_timeout_ms = Some(ms);
        self
    }

    /// Stop suites after their first failing child
    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.settings.stop_on_error = stop;
        self
    }

    /// Get run settings
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Handle for stopping runs of this runner
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.stop_token.clone(),
        }
    }

    /// Run the tree rooted at `root` and return its completed result tree
    pub fn run(&self, root: Arc<TestNode>) -> Result<TestResult, EngineError> {
        info!(
            "Starting run of {} ({} test cases)",
            root.full_name,
            root.test_case_count()
        );

        let mut context = ExecutionContext::from_settings(
            &self.settings,
            Arc::clone(&self.listener),
            self.stop_token.clone(),
        );
        let mut item = WorkItem::create(root, &context, Arc::clone(&self.filter));

        if let Err(e) = item.execute(&mut context) {
            error!("Run aborted: {}", e);
            return Err(e);
        }
        let result = item.into_result();

        let summary = RunSummary::from_result(&result);
        info!(
            "Run completed in {}ms - Pass: {}/{} ({:.1}%), {} asserts",
            summary.duration.as_millis(),
            summary.passed,
            summary.total,
            summary.pass_rate(),
            summary.assert_count
        );

        Ok(result)
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new(RunSettings::default())
    }
}

/// Run a tree with default settings and every test selected
pub fn run_tests(root: Arc<TestNode>) -> Result<TestResult, EngineError> {
    TestRunner::default().run(root)
}
