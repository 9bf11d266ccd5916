//! Execution context
//!
//! Stack-scoped state threaded explicitly through every work item. Each work
//! item saves a derived context on entry and restores its prior on exit,
//! folding the assertions it counted back into the parent.

mod cancel;
mod test_context;

pub use cancel::{is_thread_abort, CancellationToken, ThreadAbort};
pub use test_context::TestContext;

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RunSettings;
use crate::contract::{NullListener, TestListener};
use crate::error::EngineError;
use crate::models::TestNode;

pub struct ExecutionContext {
    current_test: Option<Arc<TestNode>>,
    listener: Arc<dyn TestListener>,
    assert_count: usize,
    start_time: DateTime<Utc>,
    /// Inherited default for test cases without their own `Timeout`
    test_case_timeout: Option<Duration>,
    culture: Option<String>,
    work_directory: PathBuf,
    stop_on_error: bool,
    random_seed: u64,
    stop_token: CancellationToken,
    prior: Option<Box<ExecutionContext>>,
}

impl ExecutionContext {
    /// Root context with default settings
    pub fn new(listener: Arc<dyn TestListener>) -> Self {
        Self::from_settings(&RunSettings::default(), listener, CancellationToken::new())
    }

    /// Root context for a run configured by `settings`
    pub fn from_settings(
        settings: &RunSettings,
        listener: Arc<dyn TestListener>,
        stop_token: CancellationToken,
    ) -> Self {
        let work_directory = settings
            .work_directory
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            current_test: None,
            listener,
            assert_count: 0,
            start_time: Utc::now(),
            test_case_timeout: settings.default_timeout(),
            culture: settings.culture.clone(),
            work_directory,
            stop_on_error: settings.stop_on_error,
            random_seed: settings.random_seed.unwrap_or_else(rand::random),
            stop_token,
            prior: None,
        }
    }

    /// Derive a child context in place; the current one becomes its prior
    pub fn save(&mut self) {
        let child = Self {
            current_test: self.current_test.clone(),
            listener: Arc::clone(&self.listener),
            assert_count: 0,
            start_time: Utc::now(),
            test_case_timeout: self.test_case_timeout,
            culture: self.culture.clone(),
            work_directory: self.work_directory.clone(),
            stop_on_error: self.stop_on_error,
            random_seed: self.random_seed,
            stop_token: self.stop_token.clone(),
            prior: None,
        };
        let parent = std::mem::replace(self, child);
        self.prior = Some(Box::new(parent));
    }

    /// Return to the prior context, adding this context's assertions to it
    pub fn restore(&mut self) -> Result<(), EngineError> {
        let prior = self.prior.take().ok_or(EngineError::ContextUnderflow)?;
        let child = std::mem::replace(self, *prior);
        self.assert_count += child.assert_count;
        Ok(())
    }

    /// Number of saved contexts below this one
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut prior = self.prior.as_deref();
        while let Some(ctx) = prior {
            depth += 1;
            prior = ctx.prior.as_deref();
        }
        depth
    }

    /// Context this one was derived from
    pub fn prior(&self) -> Option<&ExecutionContext> {
        self.prior.as_deref()
    }

    /// Node currently executing under this context
    pub fn current_test(&self) -> Option<&Arc<TestNode>> {
        self.current_test.as_ref()
    }

    /// Set the executing node
    pub fn set_current_test(&mut self, node: Arc<TestNode>) {
        self.current_test = Some(node);
    }

    /// Get progress listener
    pub fn listener(&self) -> &Arc<dyn TestListener> {
        &self.listener
    }

    /// Assertions counted in this context so far
    pub fn assert_count(&self) -> usize {
        self.assert_count
    }

    /// Add assertions counted by user code
    pub fn add_assertions(&mut self, count: usize) {
        self.assert_count += count;
    }

    /// Time this context was derived
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Inherited test case timeout
    pub fn test_case_timeout(&self) -> Option<Duration> {
        self.test_case_timeout
    }

    /// Set the inherited test case timeout; zero clears it
    pub fn set_test_case_timeout(&mut self, timeout: Option<Duration>) {
        self.test_case_timeout = timeout.filter(|t| !t.is_zero());
    }

    /// Culture applied to tests below this context
    pub fn culture(&self) -> Option<&str> {
        self.culture.as_deref()
    }

    /// Set culture for tests below this context
    pub fn set_culture(&mut self, culture: impl Into<String>) {
        self.culture = Some(culture.into());
    }

    /// Whether suites stop after the first failing child
    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }

    /// Run-wide random seed
    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    /// Token cancelled by a stop request
    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop_token
    }

    /// Check if a stop was requested
    pub fn stop_requested(&self) -> bool {
        self.stop_token.is_cancelled()
    }

    /// Timeout for a test case: its own `Timeout` property when it parses,
    /// otherwise the inherited default. Non-positive values disable it.
    pub fn effective_timeout(&self, node: &TestNode) -> Option<Duration> {
        match node.properties.timeout_ms() {
            Some(ms) => u64::try_from(ms)
                .ok()
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            None => self.test_case_timeout,
        }
    }

    /// Handle for user code running `node` under this context
    pub fn test_context(&self, node: &TestNode, token: CancellationToken) -> TestContext {
        TestContext::new(node.name.clone(), node.full_name.clone())
            .with_properties(node.properties.clone())
            .with_culture(self.culture.clone())
            .with_work_directory(self.work_directory.clone())
            .with_seed(self.random_seed)
            .with_cancellation(token)
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Arc::new(NullListener))
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field(
                "current_test",
                &self.current_test.as_ref().map(|t| t.full_name.as_str()),
            )
            .field("assert_count", &self.assert_count)
            .field("test_case_timeout", &self.test_case_timeout)
            .field("culture", &self.culture)
            .field("stop_on_error", &self.stop_on_error)
            .field("depth", &self.depth())
            .finish()
    }
}
