//! Result aggregation
//!
//! Folds the results of a suite's children, plus faults raised by its own
//! one-time SetUp and TearDown, into the suite's verdict. Counters look at
//! direct children only.

use super::leaf::Verdict;
use crate::models::{
    FailureSite, ResultCounts, ResultState, TestResult, TestSignal, TestStatus,
};

pub const CHILD_FAILURE_MESSAGE: &str = "Component test failure";
pub const CHILD_IGNORED_MESSAGE: &str = "One or more child tests were ignored";
pub const CHILD_CANCELLED_MESSAGE: &str = "One or more child tests were cancelled";

/// Verdict and counters computed for a suite
#[derive(Clone, Debug, PartialEq)]
pub struct Rollup {
    pub state: ResultState,
    pub message: Option<String>,
    pub stack_trace: Option<String>,
    pub counts: ResultCounts,
}

impl Rollup {
    pub fn apply_to(self, result: &mut TestResult) {
        result.state = self.state;
        result.message = self.message;
        result.stack_trace = self.stack_trace;
        result.counts = self.counts;
    }
}

/// Incremental aggregation of a suite's results
#[derive(Debug, Default)]
pub struct ResultAggregator {
    children: Vec<TestResult>,
    set_up_fault: Option<TestSignal>,
    tear_down_fault: Option<TestSignal>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_child(&mut self, result: TestResult) {
        self.children.push(result);
    }

    pub fn children(&self) -> &[TestResult] {
        &self.children
    }

    pub fn record_set_up_fault(&mut self, signal: TestSignal) {
        self.set_up_fault = Some(signal);
    }

    pub fn record_tear_down_fault(&mut self, signal: TestSignal) {
        self.tear_down_fault = Some(signal);
    }

    /// Compute the rollup; children are dropped when SetUp failed
    pub fn finish(self) -> (Rollup, Vec<TestResult>) {
        let rollup = aggregate(
            self.set_up_fault.as_ref(),
            self.tear_down_fault.as_ref(),
            &self.children,
        );
        let children = if self.set_up_fault.is_some() {
            Vec::new()
        } else {
            self.children
        };
        (rollup, children)
    }
}

/// Suite verdict by priority, first match wins:
/// 1. SetUp fault: Error at SetUp (Ignored or Cancelled signals keep their meaning)
/// 2. any child Failure or Error: Failure, "Component test failure"
/// 3. any child Cancelled: Cancelled
/// 4. TearDown fault: Error at TearDown
/// 5. skipped children and none passed: Ignored
/// 6. nothing passed: Inconclusive
/// 7. otherwise Success
pub fn aggregate(
    set_up_fault: Option<&TestSignal>,
    tear_down_fault: Option<&TestSignal>,
    children: &[TestResult],
) -> Rollup {
    if let Some(signal) = set_up_fault {
        let state = match signal {
            TestSignal::Ignored(_) => ResultState::ignored(),
            TestSignal::Cancelled(_) => ResultState::cancelled(),
            _ => ResultState::error(),
        };
        let mut verdict = Verdict::new(state.with_site(FailureSite::SetUp), signal.message());
        verdict.stack_trace = signal.stack_trace();
        if let Some(tear_down) = tear_down_fault {
            append_tear_down(&mut verdict, tear_down);
        }
        return into_rollup(verdict, ResultCounts::default());
    }

    let counts = ResultCounts::from_results(children);

    let mut verdict = if counts.failed > 0 || counts.errors > 0 {
        let label = if counts.errors > 0 { "Error" } else { "" };
        Verdict::new(
            ResultState::new(TestStatus::Failure, label).with_site(FailureSite::Child),
            Some(CHILD_FAILURE_MESSAGE.to_string()),
        )
    } else if counts.cancelled > 0 {
        Verdict::new(
            ResultState::cancelled().with_site(FailureSite::Child),
            Some(CHILD_CANCELLED_MESSAGE.to_string()),
        )
    } else if tear_down_fault.is_some() {
        Verdict::new(ResultState::error(), None)
    } else if counts.skipped > 0 && counts.passed == 0 {
        Verdict::new(
            ResultState::ignored(),
            Some(CHILD_IGNORED_MESSAGE.to_string()),
        )
    } else if counts.passed == 0 {
        Verdict::new(ResultState::inconclusive(), None)
    } else {
        Verdict::success()
    };

    if let Some(tear_down) = tear_down_fault {
        append_tear_down(&mut verdict, tear_down);
    }

    into_rollup(verdict, counts)
}

/// Mark the TearDown site and append its message; the status already chosen stands
fn append_tear_down(verdict: &mut Verdict, signal: &TestSignal) {
    verdict.state.site = FailureSite::TearDown;
    let tear_down = format!("TearDown : {}", signal.message().unwrap_or_default());
    verdict.message = Some(match verdict.message.take() {
        Some(message) => format!("{message}\n{tear_down}"),
        None => tear_down,
    });
    if verdict.stack_trace.is_none() {
        verdict.stack_trace = signal.stack_trace();
    }
}

fn into_rollup(verdict: Verdict, counts: ResultCounts) -> Rollup {
    Rollup {
        state: verdict.state,
        message: verdict.message,
        stack_trace: verdict.stack_trace,
        counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child(status: TestStatus) -> TestResult {
        TestResult::new("c", "Suite.c", false).with_state(ResultState::new(status, ""))
    }

    fn children(statuses: &[TestStatus]) -> Vec<TestResult> {
        statuses.iter().copied().map(child).collect()
    }

    #[test]
    fn test_ten_children_rollup() {
        use TestStatus::*;
        let results = children(&[
            Success, Skipped, Success, Success, Failure, Success, Error, Success, Failure, Success,
        ]);

        let rollup = aggregate(None, None, &results);
        assert_eq!(rollup.state.status, Failure);
        assert_eq!(rollup.state.site, FailureSite::Child);
        assert_eq!(rollup.message.as_deref(), Some(CHILD_FAILURE_MESSAGE));
        assert_eq!(rollup.counts.passed, 6);
        assert_eq!(rollup.counts.failed, 2);
        assert_eq!(rollup.counts.errors, 1);
        assert_eq!(rollup.counts.skipped, 1);
    }

    #[test]
    fn test_any_failing_child_prevents_success() {
        use TestStatus::*;
        for bad in [Failure, Error] {
            let rollup = aggregate(None, None, &children(&[Success, bad, Success]));
            assert!(rollup.state.status.is_failure());
        }
    }

    #[test]
    fn test_empty_suite_is_inconclusive() {
        let rollup = aggregate(None, None, &[]);
        assert_eq!(rollup.state, ResultState::inconclusive());
        assert_eq!(rollup.counts.total(), 0);
        assert!(rollup.message.is_none());
    }

    #[test]
    fn test_all_skipped_is_ignored() {
        use TestStatus::*;
        let rollup = aggregate(None, None, &children(&[Skipped, Skipped, Inconclusive]));
        assert_eq!(rollup.state.status, Skipped);
        assert_eq!(rollup.state.label, "Ignored");
        assert_eq!(rollup.message.as_deref(), Some(CHILD_IGNORED_MESSAGE));
    }

    #[test]
    fn test_mixed_success_and_skip_is_success() {
        use TestStatus::*;
        let rollup = aggregate(None, None, &children(&[Success, Skipped]));
        assert_eq!(rollup.state.status, Success);
    }

    #[test]
    fn test_all_inconclusive_is_inconclusive() {
        use TestStatus::*;
        let rollup = aggregate(None, None, &children(&[Inconclusive, Inconclusive]));
        assert_eq!(rollup.state.status, Inconclusive);
    }

    #[test]
    fn test_set_up_fault_wins() {
        use TestStatus::*;
        let fault = TestSignal::error("io", "db down");
        let rollup = aggregate(Some(&fault), None, &children(&[Success]));
        assert_eq!(rollup.state.status, Error);
        assert_eq!(rollup.state.site, FailureSite::SetUp);
        assert_eq!(rollup.message.as_deref(), Some("io : db down"));
        assert_eq!(rollup.counts.total(), 0);
    }

    #[test]
    fn test_tear_down_fault_without_child_failures() {
        use TestStatus::*;
        let fault = TestSignal::error("io", "cleanup");
        let rollup = aggregate(None, Some(&fault), &children(&[Success]));
        assert_eq!(rollup.state.status, Error);
        assert_eq!(rollup.state.site, FailureSite::TearDown);
        assert_eq!(rollup.message.as_deref(), Some("TearDown : io : cleanup"));
    }

    #[test]
    fn test_tear_down_fault_keeps_child_failure() {
        use TestStatus::*;
        let fault = TestSignal::error("io", "cleanup");
        let rollup = aggregate(None, Some(&fault), &children(&[Failure]));
        assert_eq!(rollup.state.status, Failure);
        assert_eq!(rollup.state.site, FailureSite::TearDown);
        assert_eq!(
            rollup.message.as_deref(),
            Some("Component test failure\nTearDown : io : cleanup")
        );
    }

    #[test]
    fn test_cancelled_child() {
        use TestStatus::*;
        let rollup = aggregate(None, None, &children(&[Success, Cancelled]));
        assert_eq!(rollup.state.status, Cancelled);
    }

    #[test]
    fn test_aggregator_drops_children_after_set_up_fault() {
        let mut aggregator = ResultAggregator::new();
        aggregator.add_child(child(TestStatus::Success));
        aggregator.record_set_up_fault(TestSignal::fail("bad"));

        let (rollup, kept) = aggregator.finish();
        assert_eq!(rollup.state.status, TestStatus::Error);
        assert!(kept.is_empty());
    }
}
