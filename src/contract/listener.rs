//! Progress listener contract
//!
//! Listeners are notified synchronously, in traversal order, once when each
//! work item starts and once when it finishes.

use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::{TestNode, TestResult, TestStatus};

/// Receives progress notifications from the engine
pub trait TestListener: Send + Sync {
    fn test_started(&self, node: &TestNode);

    fn test_finished(&self, result: &TestResult);
}

/// Listener that ignores every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NullListener;

impl TestListener for NullListener {
    fn test_started(&self, _node: &TestNode) {}

    fn test_finished(&self, _result: &TestResult) {}
}

/// Listener that reports progress as tracing events
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingListener;

impl TestListener for TracingListener {
    fn test_started(&self, node: &TestNode) {
        debug!("Starting {}", node.full_name);
    }

    fn test_finished(&self, result: &TestResult) {
        match result.state.status {
            TestStatus::Failure | TestStatus::Error | TestStatus::Cancelled => {
                warn!("  {}", result)
            }
            _ if result.is_suite => debug!("  {}", result),
            _ => info!("  {}", result),
        }
    }
}

/// Notification recorded by [`CollectingListener`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenerEvent {
    Started(String),
    Finished(String, TestStatus),
}

/// Listener that records every notification in order
#[derive(Debug, Default)]
pub struct CollectingListener {
    events: Mutex<Vec<ListenerEvent>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Full names of finished items, in notification order
    pub fn finished(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ListenerEvent::Finished(name, _) => Some(name),
                ListenerEvent::Started(_) => None,
            })
            .collect()
    }

    fn push(&self, event: ListenerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl TestListener for CollectingListener {
    fn test_started(&self, node: &TestNode) {
        self.push(ListenerEvent::Started(node.full_name.clone()));
    }

    fn test_finished(&self, result: &TestResult) {
        self.push(ListenerEvent::Finished(
            result.full_name.clone(),
            result.state.status,
        ));
    }
}
