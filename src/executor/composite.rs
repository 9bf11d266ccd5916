//! Composite execution
//!
//! Runs a suite: one-time SetUp, each child in discovery order, then
//! one-time TearDown, which is attempted whatever happened before it.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::aggregate::ResultAggregator;
use super::leaf::invoke;
use super::work_item::WorkItem;
use crate::context::ExecutionContext;
use crate::contract::TestFilter;
use crate::error::EngineError;
use crate::models::{property_names, ResultState, TestNode, TestResult, TestSignal, TestStatus};

pub(crate) fn run_composite(
    node: &Arc<TestNode>,
    context: &mut ExecutionContext,
    filter: &Arc<dyn TestFilter>,
    result: &mut TestResult,
) -> Result<(), EngineError> {
    apply_suite_properties(node, context);

    let suite_ctx = context.test_context(node, context.stop_token().child());
    let mut aggregator = ResultAggregator::new();

    let set_up_complete = match &node.hooks.one_time_set_up {
        Some(set_up) => match invoke(|| set_up(&suite_ctx)) {
            Ok(()) | Err(TestSignal::Success(_)) => true,
            Err(signal) => {
                warn!("One-time SetUp of {} failed: {}", node.full_name, signal);
                aggregator.record_set_up_fault(signal);
                false
            }
        },
        None => true,
    };

    if set_up_complete {
        for child in &node.children {
            let mut item = WorkItem::create(Arc::clone(child), context, Arc::clone(filter));
            let executed = item.execute(context).map(|_| ());
            let mut child_result = item.into_result();
            if let Err(e) = executed {
                warn!("{} aborted: {}", child.full_name, e);
                record_engine_error(&mut child_result, &e);
            }

            let status = child_result.status();
            aggregator.add_child(child_result);

            if status == TestStatus::Cancelled {
                debug!("Child of {} cancelled, skipping remaining children", node.full_name);
                break;
            }
            if context.stop_on_error() && status.is_failure() {
                debug!("Stopping {} after first failure", node.full_name);
                break;
            }
        }
    }

    if let Some(tear_down) = &node.hooks.one_time_tear_down {
        match invoke(|| tear_down(&suite_ctx)) {
            Ok(()) | Err(TestSignal::Success(_)) => {}
            Err(signal) => {
                warn!("One-time TearDown of {} failed: {}", node.full_name, signal);
                aggregator.record_tear_down_fault(signal);
            }
        }
    }

    context.add_assertions(suite_ctx.assert_count());

    let (rollup, children) = aggregator.finish();
    rollup.apply_to(result);
    result.children = children;
    Ok(())
}

/// A child that the engine failed to drive still reports as an Error
fn record_engine_error(result: &mut TestResult, error: &EngineError) {
    result.set_result(ResultState::error(), Some(error.to_string()));
}

/// `Timeout` becomes the default for descendants, `SetCulture` their culture
fn apply_suite_properties(node: &TestNode, context: &mut ExecutionContext) {
    if let Some(ms) = node.properties.timeout_ms() {
        let timeout = u64::try_from(ms).ok().map(Duration::from_millis);
        context.set_test_case_timeout(timeout);
    }

    if let Some(culture) = node
        .properties
        .get(property_names::SET_CULTURE)
        .and_then(|v| v.as_str())
    {
        context.set_culture(culture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::AllFilter;
    use crate::models::{hook, Body, FailureSite, TestHooks};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn run(node: TestNode, context: &mut ExecutionContext) -> TestResult {
        let node = Arc::new(node);
        let filter: Arc<dyn TestFilter> = Arc::new(AllFilter);
        let mut result = TestResult::for_node(&node);
        run_composite(&node, context, &filter, &mut result).unwrap();
        result
    }

    #[test]
    fn test_children_run_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let children = ["a", "b", "c"]
            .iter()
            .map(|name| {
                let order = order.clone();
                let name = name.to_string();
                Arc::new(TestNode::case(
                    name.clone(),
                    format!("S.{name}"),
                    Body::sync(move |_| {
                        order.lock().unwrap().push(name.clone());
                        Ok(())
                    }),
                ))
            })
            .collect();

        let result = run(TestNode::suite("S", "S", children), &mut ExecutionContext::default());
        assert_eq!(result.status(), TestStatus::Success);
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(result.children.len(), 3);
    }

    #[test]
    fn test_engine_error_becomes_error_child() {
        let node = TestNode::case("lost", "S.lost", Body::sync(|_| Ok(())));
        let mut result = TestResult::for_node(&node);
        record_engine_error(
            &mut result,
            &EngineError::WorkerLost {
                name: "S.lost".to_string(),
            },
        );

        assert_eq!(result.status(), TestStatus::Error);
        assert!(result.message.as_deref().is_some_and(|m| m.contains("S.lost")));
    }

    #[test]
    fn test_set_up_failure_still_tears_down() {
        let torn = Arc::new(AtomicBool::new(false));
        let flag = torn.clone();
        let child = Arc::new(TestNode::case("a", "S.a", Body::sync(|_| Ok(()))));
        let suite = TestNode::suite("S", "S", vec![child]).with_hooks(TestHooks {
            one_time_set_up: Some(hook(|_| Err(TestSignal::error("io", "no db")))),
            one_time_tear_down: Some(hook(move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })),
            ..Default::default()
        });

        let result = run(suite, &mut ExecutionContext::default());
        assert_eq!(result.status(), TestStatus::Error);
        assert_eq!(result.state.site, FailureSite::SetUp);
        assert!(result.children.is_empty());
        assert!(torn.load(Ordering::SeqCst));
    }

    #[test]
    fn test_suite_properties_reach_children() {
        let seen = Arc::new(Mutex::new(None));
        let record = seen.clone();
        let child = Arc::new(TestNode::case(
            "a",
            "S.a",
            Body::sync(move |ctx| {
                *record.lock().unwrap() = ctx.culture().map(str::to_string);
                Ok(())
            }),
        ));
        let suite = TestNode::suite("S", "S", vec![child])
            .with_property(property_names::SET_CULTURE, "fr-FR")
            .with_property(property_names::TIMEOUT, 1000);

        let mut context = ExecutionContext::default();
        context.save();
        run(suite, &mut context);
        assert_eq!(context.test_case_timeout(), Some(Duration::from_millis(1000)));
        assert_eq!(seen.lock().unwrap().as_deref(), Some("fr-FR"));

        context.restore().unwrap();
        assert_eq!(context.test_case_timeout(), None);
    }

    #[test]
    fn test_one_time_hook_assertions_are_counted() {
        let child = Arc::new(TestNode::case("a", "S.a", Body::sync(|ctx| ctx.check(true, "a"))));
        let suite = TestNode::suite("S", "S", vec![child]).with_hooks(TestHooks {
            one_time_set_up: Some(hook(|ctx| ctx.check(true, "setup"))),
            ..Default::default()
        });

        let mut context = ExecutionContext::default();
        let result = run(suite, &mut context);
        assert_eq!(result.children[0].assert_count, 1);
        assert_eq!(context.assert_count(), 2);
    }
}
