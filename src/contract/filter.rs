//! Test selection filters
//!
//! A filter is evaluated once per node when its work item is created.

use std::collections::BTreeSet;

use crate::models::{property_names, TestNode};

/// Predicate selecting which nodes run
pub trait TestFilter: Send + Sync {
    fn matches(&self, node: &TestNode) -> bool;

    /// True when the node was selected by name rather than by default,
    /// which lets an `Explicit` node run
    fn is_explicit_match(&self, _node: &TestNode) -> bool {
        false
    }
}

/// Selects everything
#[derive(Clone, Copy, Debug, Default)]
pub struct AllFilter;

impl TestFilter for AllFilter {
    fn matches(&self, _node: &TestNode) -> bool {
        true
    }
}

/// Selects nodes by full name
///
/// A node matches when it is selected, lies inside a selected suite, or is
/// an ancestor of a selected node.
#[derive(Clone, Debug, Default)]
pub struct NameFilter {
    names: BTreeSet<String>,
}

impl NameFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    fn is_ancestor_of_selected(&self, full_name: &str) -> bool {
        self.names.iter().any(|n| is_descendant(n, full_name))
    }
}

impl TestFilter for NameFilter {
    fn matches(&self, node: &TestNode) -> bool {
        let name = node.full_name.as_str();
        self.names.contains(name)
            || self.names.iter().any(|n| is_descendant(name, n))
            || self.is_ancestor_of_selected(name)
    }

    fn is_explicit_match(&self, node: &TestNode) -> bool {
        self.names.contains(&node.full_name) || self.is_ancestor_of_selected(&node.full_name)
    }
}

/// `name` lies strictly below `ancestor` in the dotted name hierarchy
fn is_descendant(name: &str, ancestor: &str) -> bool {
    name.len() > ancestor.len()
        && name.starts_with(ancestor)
        && name.as_bytes()[ancestor.len()] == b'.'
}

/// Selects nodes carrying one of the given categories
///
/// Suites always match so that categorised cases inside them are reached.
#[derive(Clone, Debug, Default)]
pub struct CategoryFilter {
    categories: BTreeSet<String>,
}

impl CategoryFilter {
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }
}

impl TestFilter for CategoryFilter {
    fn matches(&self, node: &TestNode) -> bool {
        node.is_suite()
            || self
                .categories
                .iter()
                .any(|c| node.properties.has_value(property_names::CATEGORY, c))
    }
}

/// Inverts another filter for test cases; suites always match
pub struct NotFilter {
    inner: Box<dyn TestFilter>,
}

impl NotFilter {
    pub fn new(inner: impl TestFilter + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

impl TestFilter for NotFilter {
    fn matches(&self, node: &TestNode) -> bool {
        node.is_suite() || !self.inner.matches(node)
    }
}
