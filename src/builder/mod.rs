//! Suite builder
//!
//! Registration API producing the immutable test tree consumed by the
//! runner. Full names are the dot-joined names of a node and its ancestors.

use std::future::Future;
use std::sync::Arc;

use crate::context::TestContext;
use crate::models::{
    hook, property_names, Body, HookFn, Properties, PropertyValue, RunState, TestHooks, TestNode,
    TestOutcome,
};

enum Entry {
    Case(TestNode),
    Suite(SuiteBuilder),
}

/// Builder for a suite and everything below it
pub struct SuiteBuilder {
    name: String,
    namespace: Option<String>,
    set_up: Option<HookFn>,
    tear_down: Option<HookFn>,
    one_time_set_up: Option<HookFn>,
    one_time_tear_down: Option<HookFn>,
    properties: Properties,
    run_state: RunState,
    skip_reason: Option<String>,
    entries: Vec<Entry>,
}

impl SuiteBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            set_up: None,
            tear_down: None,
            one_time_set_up: None,
            one_time_tear_down: None,
            properties: Properties::new(),
            run_state: RunState::Runnable,
            skip_reason: None,
            entries: Vec::new(),
        }
    }

    /// Prefix for the full name of a top-level suite
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// SetUp run before each test case of this suite
    pub fn set_up<F>(mut self, f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        self.set_up = Some(hook(f));
        self
    }

    /// TearDown run after each test case of this suite
    pub fn tear_down<F>(mut self, f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        self.tear_down = Some(hook(f));
        self
    }

    pub fn one_time_set_up<F>(mut self, f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        self.one_time_set_up = Some(hook(f));
        self
    }

    pub fn one_time_tear_down<F>(mut self, f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        self.one_time_tear_down = Some(hook(f));
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.add(key, value);
        self
    }

    pub fn category(self, category: impl Into<String>) -> Self {
        let category: String = category.into();
        self.property(property_names::CATEGORY, category)
    }

    /// Default timeout for test cases below this suite
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.properties.set(property_names::TIMEOUT, ms);
        self
    }

    pub fn run_state(mut self, run_state: RunState, reason: Option<String>) -> Self {
        self.run_state = run_state;
        self.skip_reason = reason;
        self
    }

    /// Add a test case with a synchronous body
    pub fn test<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&TestContext) -> TestOutcome + Send + Sync + 'static,
    {
        self.leaf(unqualified(name.into(), Body::sync(f)))
    }

    /// Add a test case with an asynchronous body
    pub fn async_test<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestOutcome> + Send + 'static,
    {
        self.leaf(unqualified(name.into(), Body::future(f)))
    }

    /// Add a test case and adjust the node before it is registered
    pub fn leaf_with<F>(self, name: impl Into<String>, body: Body, configure: F) -> Self
    where
        F: FnOnce(TestNode) -> TestNode,
    {
        self.leaf(configure(unqualified(name.into(), body)))
    }

    /// Add a prebuilt test case; its full name is rewritten under this suite
    pub fn leaf(mut self, node: TestNode) -> Self {
        self.entries.push(Entry::Case(node));
        self
    }

    pub fn suite(mut self, suite: SuiteBuilder) -> Self {
        self.entries.push(Entry::Suite(suite));
        self
    }

    pub fn build(self) -> Arc<TestNode> {
        Arc::new(self.build_node(None))
    }

    fn build_node(self, parent: Option<&str>) -> TestNode {
        let full_name = match (parent, &self.namespace) {
            (Some(parent), _) => format!("{parent}.{}", self.name),
            (None, Some(namespace)) => format!("{namespace}.{}", self.name),
            (None, None) => self.name.clone(),
        };

        let set_up = self.set_up;
        let tear_down = self.tear_down;
        let children = self
            .entries
            .into_iter()
            .map(|entry| {
                let node = match entry {
                    Entry::Case(mut node) => {
                        node.full_name = format!("{full_name}.{}", node.name);
                        if node.hooks.set_up.is_none() {
                            node.hooks.set_up = set_up.clone();
                        }
                        if node.hooks.tear_down.is_none() {
                            node.hooks.tear_down = tear_down.clone();
                        }
                        node
                    }
                    Entry::Suite(builder) => builder.build_node(Some(&full_name)),
                };
                Arc::new(node)
            })
            .collect();

        let mut node = TestNode::suite(self.name, full_name, children)
            .with_run_state(self.run_state, self.skip_reason)
            .with_hooks(TestHooks {
                one_time_set_up: self.one_time_set_up,
                one_time_tear_down: self.one_time_tear_down,
                ..Default::default()
            });
        node.properties = self.properties;
        node
    }
}

fn unqualified(name: String, body: Body) -> TestNode {
    TestNode::case(name.clone(), name, body)
}
