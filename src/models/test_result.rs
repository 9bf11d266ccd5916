//! Test result models
//!
//! Defines result states, per-node results and run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::node::TestNode;
use super::outcome::{TestOutcome, TestSignal};

/// Test execution status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Inconclusive,
    Skipped,
    Success,
    Failure,
    Error,
    Cancelled,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Inconclusive => "?",
            TestStatus::Skipped => "○",
            TestStatus::Success => "✓",
            TestStatus::Failure => "✗",
            TestStatus::Error => "!",
            TestStatus::Cancelled => "-",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestStatus::Success)
    }

    /// Failure or Error
    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Failure | TestStatus::Error)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Inconclusive => write!(f, "INCONCLUSIVE"),
            TestStatus::Skipped => write!(f, "SKIP"),
            TestStatus::Success => write!(f, "PASS"),
            TestStatus::Failure => write!(f, "FAIL"),
            TestStatus::Error => write!(f, "ERROR"),
            TestStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Phase in which a fault originated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSite {
    #[default]
    Test,
    SetUp,
    TearDown,
    Child,
}

impl fmt::Display for FailureSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureSite::Test => write!(f, "Test"),
            FailureSite::SetUp => write!(f, "SetUp"),
            FailureSite::TearDown => write!(f, "TearDown"),
            FailureSite::Child => write!(f, "Child"),
        }
    }
}

/// Status plus a label refining it and the site of the fault
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultState {
    pub status: TestStatus,
    pub label: String,
    pub site: FailureSite,
}

impl ResultState {
    pub fn new(status: TestStatus, label: impl Into<String>) -> Self {
        Self {
            status,
            label: label.into(),
            site: FailureSite::Test,
        }
    }

    pub fn inconclusive() -> Self {
        Self::new(TestStatus::Inconclusive, "")
    }

    pub fn success() -> Self {
        Self::new(TestStatus::Success, "")
    }

    pub fn failure() -> Self {
        Self::new(TestStatus::Failure, "")
    }

    pub fn error() -> Self {
        Self::new(TestStatus::Error, "")
    }

    pub fn cancelled() -> Self {
        Self::new(TestStatus::Cancelled, "")
    }

    pub fn ignored() -> Self {
        Self::new(TestStatus::Skipped, "Ignored")
    }

    pub fn not_runnable() -> Self {
        Self::new(TestStatus::Skipped, "NotRunnable")
    }

    pub fn explicit() -> Self {
        Self::new(TestStatus::Skipped, "Explicit")
    }

    /// Skipped because the run filter did not select the node
    pub fn excluded() -> Self {
        Self::new(TestStatus::Skipped, "Excluded")
    }

    pub fn with_site(mut self, site: FailureSite) -> Self {
        self.site = site;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Classify a signal raised by user code
    pub fn from_signal(signal: &TestSignal) -> Self {
        match signal {
            TestSignal::Success(_) => Self::success(),
            TestSignal::Failure { .. } => Self::failure(),
            TestSignal::Ignored(_) => Self::ignored(),
            TestSignal::Inconclusive(_) => Self::inconclusive(),
            TestSignal::Cancelled(_) => Self::cancelled(),
            TestSignal::Error(_) => Self::error(),
        }
    }
}

impl Default for ResultState {
    fn default() -> Self {
        Self::inconclusive()
    }
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}", self.status)
        } else {
            write!(f, "{}:{}", self.status, self.label)
        }
    }
}

/// Counters over the direct children of a suite result
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCounts {
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub inconclusive: usize,
    pub cancelled: usize,
}

impl ResultCounts {
    pub fn tally(&mut self, status: TestStatus) {
        match status {
            TestStatus::Success => self.passed += 1,
            TestStatus::Failure => self.failed += 1,
            TestStatus::Error => self.errors += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Inconclusive => self.inconclusive += 1,
            TestStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn from_results(results: &[TestResult]) -> Self {
        let mut counts = Self::default();
        for result in results {
            counts.tally(result.state.status);
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errors + self.skipped + self.inconclusive + self.cancelled
    }
}

/// Result of executing one test node
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    /// Full name of the node this result belongs to
    pub full_name: String,
    pub is_suite: bool,
    pub state: ResultState,
    pub message: Option<String>,
    pub stack_trace: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Duration,
    pub assert_count: usize,
    pub counts: ResultCounts,
    pub children: Vec<TestResult>,
}

impl TestResult {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>, is_suite: bool) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            is_suite,
            state: ResultState::inconclusive(),
            message: None,
            stack_trace: None,
            start_time: None,
            end_time: None,
            duration: Duration::ZERO,
            assert_count: 0,
            counts: ResultCounts::default(),
            children: Vec::new(),
        }
    }

    /// Fresh, inconclusive result for a node
    pub fn for_node(node: &TestNode) -> Self {
        Self::new(&node.name, &node.full_name, node.is_suite())
    }

    pub fn with_state(mut self, state: ResultState) -> Self {
        self.state = state;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_assert_count(mut self, assert_count: usize) -> Self {
        self.assert_count = assert_count;
        self
    }

    pub fn set_result(&mut self, state: ResultState, message: Option<String>) {
        self.state = state;
        self.message = message;
        self.stack_trace = None;
    }

    /// Record the outcome of user code that ran in `site`
    pub fn record_outcome(&mut self, outcome: TestOutcome, site: FailureSite) {
        match outcome {
            Ok(()) => self.set_result(ResultState::success(), None),
            Err(signal) => self.record_signal(&signal, site),
        }
    }

    pub fn record_signal(&mut self, signal: &TestSignal, site: FailureSite) {
        self.state = ResultState::from_signal(signal).with_site(site);
        self.message = signal.message();
        self.stack_trace = signal.stack_trace();
    }

    pub fn status(&self) -> TestStatus {
        self.state.status
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Find a result by full name, searching this result and its descendants
    pub fn find(&self, full_name: &str) -> Option<&TestResult> {
        if self.full_name == full_name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(full_name))
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.state.status.symbol(),
            self.full_name,
            self.duration.as_millis()
        )?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Summary over every test case in a result tree
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub inconclusive: usize,
    pub cancelled: usize,
    pub assert_count: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn from_result(result: &TestResult) -> Self {
        let mut summary = Self {
            name: result.full_name.clone(),
            assert_count: result.assert_count,
            duration: result.duration,
            ..Default::default()
        };
        summary.visit(result);
        summary
    }

    fn visit(&mut self, result: &TestResult) {
        if result.is_suite {
            for child in &result.children {
                self.visit(child);
            }
            return;
        }

        self.total += 1;
        match result.state.status {
            TestStatus::Success => self.passed += 1,
            TestStatus::Failure => self.failed += 1,
            TestStatus::Error => self.errors += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Inconclusive => self.inconclusive += 1,
            TestStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.passed == self.total
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run - {}", self.name)?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Error: {} | Skip: {} | Inconclusive: {} | Cancelled: {}",
            self.total,
            self.passed,
            self.failed,
            self.errors,
            self.skipped,
            self.inconclusive,
            self.cancelled
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Asserts: {} | Duration: {}ms",
            self.pass_rate(),
            self.assert_count,
            self.duration.as_millis()
        )
    }
}
