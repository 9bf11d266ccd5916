//! Work item state machine
//!
//! A work item wraps one test node and exclusively owns the result built for
//! it during a run. It moves Ready -> Running -> Complete exactly once.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::composite::run_composite;
use super::leaf::{run_leaf, RUN_CANCELLED};
use crate::context::ExecutionContext;
use crate::contract::TestFilter;
use crate::error::EngineError;
use crate::models::{NodeKind, ResultState, RunState, TestNode, TestResult};
use crate::utils::Timer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkItemState {
    Ready,
    Running,
    Complete,
}

impl fmt::Display for WorkItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItemState::Ready => write!(f, "Ready"),
            WorkItemState::Running => write!(f, "Running"),
            WorkItemState::Complete => write!(f, "Complete"),
        }
    }
}

/// Callback invoked with the final result once an item completes
pub type CompletionCallback = Box<dyn FnOnce(&TestResult) + Send>;

enum WorkKind {
    /// Result decided at creation; nothing is invoked
    Skip(ResultState, Option<String>),
    Leaf,
    Composite(Arc<dyn TestFilter>),
}

pub struct WorkItem {
    node: Arc<TestNode>,
    kind: WorkKind,
    state: WorkItemState,
    result: TestResult,
    on_completed: Vec<CompletionCallback>,
}

impl WorkItem {
    /// Create the work item for `node`, deciding up front whether it runs
    pub fn create(
        node: Arc<TestNode>,
        context: &ExecutionContext,
        filter: Arc<dyn TestFilter>,
    ) -> Self {
        let kind = if context.stop_requested() {
            WorkKind::Skip(ResultState::cancelled(), Some(RUN_CANCELLED.to_string()))
        } else {
            select_kind(&node, filter)
        };

        Self {
            result: TestResult::for_node(&node),
            node,
            kind,
            state: WorkItemState::Ready,
            on_completed: Vec::new(),
        }
    }

    /// Node this item executes
    pub fn node(&self) -> &Arc<TestNode> {
        &self.node
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkItemState {
        self.state
    }

    /// Result built so far
    pub fn result(&self) -> &TestResult {
        &self.result
    }

    /// Hand the result over to the caller
    pub fn into_result(self) -> TestResult {
        self.result
    }

    /// Register a callback fired once when the item becomes Complete
    pub fn on_completed<F>(&mut self, callback: F)
    where
        F: FnOnce(&TestResult) + Send + 'static,
    {
        self.on_completed.push(Box::new(callback));
    }

    /// Run the item under a context derived from `context`
    pub fn execute(&mut self, context: &mut ExecutionContext) -> Result<&TestResult, EngineError> {
        if self.state != WorkItemState::Ready {
            return Err(EngineError::AlreadyExecuted {
                name: self.node.full_name.clone(),
            });
        }
        self.state = WorkItemState::Running;

        context.save();
        context.set_current_test(Arc::clone(&self.node));
        context.listener().test_started(&self.node);
        self.result.start_time = Some(context.start_time());
        let timer = Timer::start(self.node.full_name.as_str());

        let outcome = self.perform_work(context);

        self.result.duration = timer.stop();
        self.result.end_time = Some(Utc::now());
        self.result.assert_count = context.assert_count();
        context.listener().test_finished(&self.result);
        context.restore()?;
        outcome?;

        self.state = WorkItemState::Complete;
        debug!("{} -> {}", self.node.full_name, self.result.state);
        for callback in self.on_completed.drain(..) {
            callback(&self.result);
        }
        Ok(&self.result)
    }

    fn perform_work(&mut self, context: &mut ExecutionContext) -> Result<(), EngineError> {
        match &self.kind {
            WorkKind::Skip(state, reason) => {
                self.result.set_result(state.clone(), reason.clone());
                Ok(())
            }
            WorkKind::Leaf => run_leaf(&self.node, context, &mut self.result),
            WorkKind::Composite(filter) => {
                let filter = Arc::clone(filter);
                run_composite(&self.node, context, &filter, &mut self.result)
            }
        }
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("node", &self.node.full_name)
            .field("state", &self.state)
            .field("result", &self.result.state)
            .finish()
    }
}

fn select_kind(node: &TestNode, filter: Arc<dyn TestFilter>) -> WorkKind {
    let reason = node.skip_reason.clone();
    match node.run_state {
        RunState::NotRunnable => return WorkKind::Skip(ResultState::not_runnable(), reason),
        RunState::Ignored => return WorkKind::Skip(ResultState::ignored(), reason),
        RunState::Explicit if !filter.is_explicit_match(node) => {
            return WorkKind::Skip(ResultState::explicit(), reason)
        }
        RunState::Explicit | RunState::Runnable => {}
    }

    if !filter.matches(node) {
        return WorkKind::Skip(ResultState::excluded(), None);
    }

    match node.kind {
        NodeKind::Suite => WorkKind::Composite(filter),
        NodeKind::Case if node.hooks.body.is_none() => WorkKind::Skip(
            ResultState::not_runnable(),
            Some("No test body registered".to_string()),
        ),
        NodeKind::Case => WorkKind::Leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{AllFilter, NameFilter};
    use crate::models::{Body, TestSignal, TestStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn case(name: &str, body: Body) -> Arc<TestNode> {
        Arc::new(TestNode::case(name, format!("Suite.{name}"), body))
    }

    fn all() -> Arc<dyn TestFilter> {
        Arc::new(AllFilter)
    }

    #[test]
    fn test_state_transitions() {
        let node = case("ok", Body::sync(|ctx| ctx.check(true, "fine")));
        let mut context = ExecutionContext::default();
        let mut item = WorkItem::create(node, &context, all());
        assert_eq!(item.state(), WorkItemState::Ready);

        let result = item.execute(&mut context).unwrap();
        assert_eq!(result.status(), TestStatus::Success);
        assert_eq!(result.assert_count, 1);
        assert!(result.end_time.is_some());
        assert_eq!(item.state(), WorkItemState::Complete);
        assert_eq!(context.assert_count(), 1);
        assert_eq!(context.depth(), 0);
    }

    #[test]
    fn test_execute_twice_fails_fast() {
        let node = case("ok", Body::sync(|_| Ok(())));
        let mut context = ExecutionContext::default();
        let mut item = WorkItem::create(node, &context, all());

        item.execute(&mut context).unwrap();
        let err = item.execute(&mut context).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExecuted { name } if name == "Suite.ok"));
    }

    #[test]
    fn test_skipped_nodes_never_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let body = {
            let calls = calls.clone();
            Body::sync(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        let ignored = Arc::new(
            TestNode::case("ign", "Suite.ign", body.clone())
                .with_run_state(RunState::Ignored, Some("flaky".to_string())),
        );
        let explicit = Arc::new(
            TestNode::case("exp", "Suite.exp", body).with_run_state(RunState::Explicit, None),
        );
        let mut context = ExecutionContext::default();

        let mut item = WorkItem::create(ignored, &context, all());
        let result = item.execute(&mut context).unwrap();
        assert_eq!(result.status(), TestStatus::Skipped);
        assert_eq!(result.state.label, "Ignored");
        assert_eq!(result.message.as_deref(), Some("flaky"));

        let mut item = WorkItem::create(explicit.clone(), &context, all());
        assert_eq!(item.execute(&mut context).unwrap().state.label, "Explicit");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let selected: Arc<dyn TestFilter> = Arc::new(NameFilter::new(["Suite.exp"]));
        let mut item = WorkItem::create(explicit, &context, selected);
        assert_eq!(item.execute(&mut context).unwrap().status(), TestStatus::Success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_filter_exclusion() {
        let node = case("other", Body::sync(|_| Ok(())));
        let filter: Arc<dyn TestFilter> = Arc::new(NameFilter::new(["Suite.wanted"]));
        let mut context = ExecutionContext::default();

        let mut item = WorkItem::create(node, &context, filter);
        let result = item.execute(&mut context).unwrap();
        assert_eq!(result.status(), TestStatus::Skipped);
        assert_eq!(result.state.label, "Excluded");
    }

    #[test]
    fn test_case_without_body_is_not_runnable() {
        let mut node = TestNode::case("empty", "Suite.empty", Body::sync(|_| Ok(())));
        node.hooks.body = None;
        let mut context = ExecutionContext::default();

        let mut item = WorkItem::create(Arc::new(node), &context, all());
        let result = item.execute(&mut context).unwrap();
        assert_eq!(result.state, ResultState::not_runnable());
    }

    #[test]
    fn test_completion_callback_fires_once() {
        let node = case("bad", Body::sync(|_| Err(TestSignal::fail("nope"))));
        let mut context = ExecutionContext::default();
        let seen = Arc::new(AtomicUsize::new(0));

        let mut item = WorkItem::create(node, &context, all());
        let counter = seen.clone();
        item.on_completed(move |result| {
            assert_eq!(result.status(), TestStatus::Failure);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        item.execute(&mut context).unwrap();
        let _ = item.execute(&mut context);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_requested_before_create() {
        let node = case("late", Body::sync(|_| Ok(())));
        let mut context = ExecutionContext::default();
        context.stop_token().cancel();

        let mut item = WorkItem::create(node, &context, all());
        let result = item.execute(&mut context).unwrap();
        assert_eq!(result.status(), TestStatus::Cancelled);
        assert_eq!(result.message.as_deref(), Some("Test run cancelled"));
    }
}
