//! Handle given to test bodies and hooks
//!
//! Carries what user code may observe about the running test: its identity,
//! properties, ambient settings, the assertion counter and the cancellation
//! token. Cheap to clone and safe to move onto a timeout worker.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::cancel::CancellationToken;
use crate::models::{Properties, TestOutcome, TestSignal};

#[derive(Clone, Debug)]
pub struct TestContext {
    name: String,
    full_name: String,
    properties: Properties,
    culture: Option<String>,
    work_directory: PathBuf,
    seed: u64,
    asserts: Arc<AtomicUsize>,
    cancellation: CancellationToken,
}

impl TestContext {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            properties: Properties::new(),
            culture: None,
            work_directory: PathBuf::from("."),
            seed: 0,
            asserts: Arc::new(AtomicUsize::new(0)),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_culture(mut self, culture: Option<String>) -> Self {
        self.culture = culture;
        self
    }

    pub fn with_work_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_directory = dir.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn culture(&self) -> Option<&str> {
        self.culture.as_deref()
    }

    pub fn work_directory(&self) -> &Path {
        &self.work_directory
    }

    /// Assertions counted so far through this handle and its clones
    pub fn assert_count(&self) -> usize {
        self.asserts.load(Ordering::SeqCst)
    }

    /// Count an assertion evaluated by an external assertion layer
    pub fn record_assertion(&self) {
        self.asserts.fetch_add(1, Ordering::SeqCst);
    }

    /// Count one assertion and fail with `message` when `condition` is false
    pub fn check(&self, condition: bool, message: impl Into<String>) -> TestOutcome {
        self.record_assertion();
        if condition {
            Ok(())
        } else {
            Err(TestSignal::fail(message))
        }
    }

    pub fn check_eq<T: PartialEq + Debug>(&self, expected: T, actual: T) -> TestOutcome {
        self.record_assertion();
        if expected == actual {
            Ok(())
        } else {
            Err(TestSignal::fail(format!(
                "Expected: {expected:?}\n  But was:  {actual:?}"
            )))
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Safe point at which a timed-out or stopped test is unwound
    pub fn checkpoint(&self) {
        self.cancellation.checkpoint();
    }

    /// Cancellable sleep
    pub fn sleep(&self, duration: Duration) {
        self.cancellation.sleep(duration);
    }

    /// Seed for this test, derived from the run seed and the full name
    pub fn seed(&self) -> u64 {
        self.seed ^ fnv1a(self.full_name.as_bytes())
    }

    /// Deterministic random generator for this test
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed())
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_check_counts_assertions() {
        let ctx = TestContext::new("t", "Suite.t");
        assert!(ctx.check(true, "fine").is_ok());
        assert!(ctx.check_eq(2, 1 + 1).is_ok());
        let failed = ctx.check_eq("a", "b");

        assert_eq!(ctx.assert_count(), 3);
        match failed {
            Err(TestSignal::Failure { message, .. }) => {
                assert!(message.contains("Expected: \"a\""));
                assert!(message.contains("But was:  \"b\""));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_clones_share_counter() {
        let ctx = TestContext::new("t", "Suite.t");
        let clone = ctx.clone();
        clone.record_assertion();
        assert_eq!(ctx.assert_count(), 1);
    }

    #[test]
    fn test_rng_is_deterministic_per_test() {
        let a = TestContext::new("t", "Suite.t").with_seed(42);
        let b = TestContext::new("t", "Suite.t").with_seed(42);
        let other = TestContext::new("u", "Suite.u").with_seed(42);

        let mut ra = a.rng();
        let mut rb = b.rng();
        let xs: Vec<u32> = (0..4).map(|_| ra.random()).collect();
        let ys: Vec<u32> = (0..4).map(|_| rb.random()).collect();
        assert_eq!(xs, ys);
        assert_ne!(a.seed(), other.seed());
    }
}
