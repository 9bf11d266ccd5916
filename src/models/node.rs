//! Test node model
//!
//! Read-only description of runnable units as produced by discovery.

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::outcome::{Fault, TestOutcome};
use crate::context::TestContext;

/// Well-known property keys
pub mod property_names {
    /// Timeout in milliseconds for a test case, or the inherited default for a suite
    pub const TIMEOUT: &str = "Timeout";
    pub const CATEGORY: &str = "Category";
    pub const DESCRIPTION: &str = "Description";
    /// Culture applied to the execution context of a suite's descendants
    pub const SET_CULTURE: &str = "SetCulture";
}

/// Whether a node can be run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Runnable,
    NotRunnable,
    Ignored,
    /// Runs only when selected explicitly by the filter
    Explicit,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Runnable => write!(f, "Runnable"),
            RunState::NotRunnable => write!(f, "NotRunnable"),
            RunState::Ignored => write!(f, "Ignored"),
            RunState::Explicit => write!(f, "Explicit"),
        }
    }
}

/// Shape of a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Case,
    Suite,
}

/// Single property value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i64),
    Text(String),
}

impl PropertyValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(n) => Some(*n),
            PropertyValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            PropertyValue::Int(_) => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(n) => write!(f, "{n}"),
            PropertyValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Int(n)
    }
}

impl From<u64> for PropertyValue {
    fn from(n: u64) -> Self {
        PropertyValue::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<i32> for PropertyValue {
    fn from(n: i32) -> Self {
        PropertyValue::Int(n.into())
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

/// Multi-valued property bag keyed by name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Properties {
    entries: BTreeMap<String, Vec<PropertyValue>>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under a key, keeping existing values
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// Replace all values under a key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.entries.insert(key.into(), vec![value.into()]);
    }

    /// First value stored under a key
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key).and_then(|values| values.first())
    }

    pub fn get_all(&self, key: &str) -> &[PropertyValue] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Check whether any value under `key` renders as `value`
    pub fn has_value(&self, key: &str, value: &str) -> bool {
        self.get_all(key).iter().any(|v| v.to_string() == value)
    }

    /// Timeout declared on the node, in milliseconds
    pub fn timeout_ms(&self) -> Option<i64> {
        self.get(property_names::TIMEOUT).and_then(PropertyValue::as_int)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<PropertyValue>)> {
        self.entries.iter()
    }
}

/// Synchronous body or hook
pub type HookFn = Arc<dyn Fn(&TestContext) -> TestOutcome + Send + Sync>;

/// Factory for an asynchronous body
pub type AsyncBodyFn = Arc<dyn Fn(TestContext) -> BoxFuture<'static, TestOutcome> + Send + Sync>;

/// Handler invoked with the fault that satisfied an expected-error contract
pub type ErrorHandlerFn = Arc<dyn Fn(&Fault, &TestContext) -> TestOutcome + Send + Sync>;

/// Wrap a closure as a hook
pub fn hook<F>(f: F) -> HookFn
where
    F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Executable body of a test case
#[derive(Clone)]
pub enum Body {
    Sync(HookFn),
    Async(AsyncBodyFn),
}

impl Body {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        Body::Sync(Arc::new(f))
    }

    /// Body driven to completion on a dedicated async runtime
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestOutcome> + Send + 'static,
    {
        Body::Async(Arc::new(move |ctx| f(ctx).boxed()))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Body::Async(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Sync(_) => write!(f, "Body::Sync"),
            Body::Async(_) => write!(f, "Body::Async"),
        }
    }
}

/// Contract stating that a body must fail with a particular fault kind
#[derive(Clone)]
pub struct ExpectedError {
    pub kind: String,
    pub handler: Option<ErrorHandlerFn>,
}

impl ExpectedError {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            handler: None,
        }
    }

    /// Expect an error of type `E` raised through `?`
    pub fn of<E: std::error::Error>() -> Self {
        Self::new(std::any::type_name::<E>())
    }

    /// Expect the body to panic
    pub fn panic() -> Self {
        Self::new(super::outcome::PANIC_KIND)
    }

    /// True when `fault` is of the expected kind, by full type path or by
    /// its last path segment
    pub fn matches(&self, fault: &Fault) -> bool {
        fault.kind == self.kind
            || fault
                .kind
                .rsplit("::")
                .next()
                .is_some_and(|short| short == self.kind)
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Fault, &TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for ExpectedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectedError")
            .field("kind", &self.kind)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}

/// Callables registered for a node
#[derive(Clone, Default)]
pub struct TestHooks {
    pub set_up: Option<HookFn>,
    pub body: Option<Body>,
    pub tear_down: Option<HookFn>,
    pub one_time_set_up: Option<HookFn>,
    pub one_time_tear_down: Option<HookFn>,
    pub expected_error: Option<ExpectedError>,
}

impl fmt::Debug for TestHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestHooks")
            .field("set_up", &self.set_up.is_some())
            .field("body", &self.body)
            .field("tear_down", &self.tear_down.is_some())
            .field("one_time_set_up", &self.one_time_set_up.is_some())
            .field("one_time_tear_down", &self.one_time_tear_down.is_some())
            .field("expected_error", &self.expected_error)
            .finish()
    }
}

/// Immutable description of a runnable unit
#[derive(Clone, Debug)]
pub struct TestNode {
    pub name: String,
    pub full_name: String,
    pub kind: NodeKind,
    pub run_state: RunState,
    /// Reason recorded alongside a non-runnable state
    pub skip_reason: Option<String>,
    pub children: Vec<Arc<TestNode>>,
    pub properties: Properties,
    pub hooks: TestHooks,
}

impl TestNode {
    /// Create a test case with the given body
    pub fn case(name: impl Into<String>, full_name: impl Into<String>, body: Body) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            kind: NodeKind::Case,
            run_state: RunState::Runnable,
            skip_reason: None,
            children: Vec::new(),
            properties: Properties::new(),
            hooks: TestHooks {
                body: Some(body),
                ..Default::default()
            },
        }
    }

    /// Create a suite over the given children
    pub fn suite(
        name: impl Into<String>,
        full_name: impl Into<String>,
        children: Vec<Arc<TestNode>>,
    ) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            kind: NodeKind::Suite,
            run_state: RunState::Runnable,
            skip_reason: None,
            children,
            properties: Properties::new(),
            hooks: TestHooks::default(),
        }
    }

    pub fn with_run_state(mut self, run_state: RunState, reason: Option<String>) -> Self {
        self.run_state = run_state;
        self.skip_reason = reason;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.add(key, value);
        self
    }

    pub fn with_expected_error(mut self, expected: ExpectedError) -> Self {
        self.hooks.expected_error = Some(expected);
        self
    }

    pub fn with_hooks(mut self, hooks: TestHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn is_suite(&self) -> bool {
        self.kind == NodeKind::Suite
    }

    /// Number of test cases at or below this node
    pub fn test_case_count(&self) -> usize {
        match self.kind {
            NodeKind::Case => 1,
            NodeKind::Suite => self.children.iter().map(|c| c.test_case_count()).sum(),
        }
    }

    /// Find a descendant (or this node) by full name
    pub fn find(&self, full_name: &str) -> Option<&TestNode> {
        if self.full_name == full_name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(full_name))
    }
}

impl fmt::Display for TestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Body {
        Body::sync(|_| Ok(()))
    }

    #[test]
    fn test_properties_multi_valued() {
        let mut props = Properties::new();
        props.add(property_names::CATEGORY, "Fast");
        props.add(property_names::CATEGORY, "Db");
        props.set("Priority", "low");
        props.set("Priority", "high");

        assert_eq!(props.get_all(property_names::CATEGORY).len(), 2);
        assert!(props.has_value(property_names::CATEGORY, "Db"));
        assert_eq!(props.get("Priority"), Some(&PropertyValue::from("high")));
        assert_eq!(props.len(), 2);
    }

    #[test]
    fn test_timeout_property_parsing() {
        let mut props = Properties::new();
        assert_eq!(props.timeout_ms(), None);

        props.set(property_names::TIMEOUT, 250_i64);
        assert_eq!(props.timeout_ms(), Some(250));

        props.set(property_names::TIMEOUT, "75");
        assert_eq!(props.timeout_ms(), Some(75));
    }

    #[test]
    fn test_case_count() {
        let a = Arc::new(TestNode::case("a", "S.a", noop()));
        let b = Arc::new(TestNode::case("b", "S.b", noop()));
        let inner = Arc::new(TestNode::suite("Inner", "S.Inner", vec![b]));
        let root = TestNode::suite("S", "S", vec![a, inner]);

        assert_eq!(root.test_case_count(), 2);
        assert!(root.is_suite());
        assert_eq!(root.find("S.b").map(|n| n.name.as_str()), Some("b"));
        assert!(root.find("S.c").is_none());
    }

    #[test]
    fn test_empty_suite_is_still_a_suite() {
        let suite = TestNode::suite("Empty", "Empty", Vec::new());
        assert!(suite.is_suite());
        assert_eq!(suite.test_case_count(), 0);
    }

    #[test]
    fn test_expected_error_matching() {
        let parse_error = "x".parse::<i32>().unwrap_err();
        let fault = Fault::from_error(&parse_error);

        assert!(ExpectedError::of::<std::num::ParseIntError>().matches(&fault));
        assert!(ExpectedError::new("ParseIntError").matches(&fault));
        assert!(!ExpectedError::new("IntError").matches(&fault));
        assert!(ExpectedError::panic().matches(&Fault::new("panic", "boom")));
    }
}
