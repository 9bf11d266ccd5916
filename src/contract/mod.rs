//! Boundary contracts
//!
//! Interfaces the engine consumes (filters) and produces to (listeners).

mod filter;
mod listener;

pub use filter::{AllFilter, CategoryFilter, NameFilter, NotFilter, TestFilter};
pub use listener::{CollectingListener, ListenerEvent, NullListener, TestListener, TracingListener};
