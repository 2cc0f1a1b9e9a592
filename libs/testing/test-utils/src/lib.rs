//! Shared test utilities
//!
//! - `TestRedis`: Redis container with automatic cleanup (feature: "redis")
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Redis Testing
//!
//! Add `features = ["redis"]` to your dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["redis"] }
//! ```
//!
//! Container-backed tests need Docker; mark them `#[ignore]` and run with
//! `cargo test -- --ignored`.

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Builder for test data with deterministic values
///
/// The same test name always yields the same ids and titles, so failures reproduce.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_create_task");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// A positive user id in `1..=1_000_000`
    pub fn user_id(&self) -> i64 {
        (self.seed % 1_000_000) as i64 + 1
    }

    /// A task title unique to this test
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(42);
    /// assert_eq!(builder.title("groceries"), "test-task-42-groceries");
    /// ```
    pub fn title(&self, suffix: &str) -> String {
        format!("test-task-{}-{}", self.seed, suffix)
    }

    /// A stream or consumer-group name unique to this test
    pub fn stream_name(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.seed)
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that a sequence is sorted newest first
    pub fn assert_sorted_desc<T: PartialOrd + std::fmt::Debug>(items: &[T], context: &str) {
        for pair in items.windows(2) {
            assert!(
                pair[0] >= pair[1],
                "{}: expected descending order, found {:?} before {:?}",
                context,
                pair[0],
                pair[1]
            );
        }
    }

    /// Assert that a result is Ok and return the value
    pub fn assert_ok<T, E: std::fmt::Debug>(result: Result<T, E>, context: &str) -> T {
        match result {
            Ok(value) => value,
            Err(e) => panic!("{}: expected Ok, got Err({:?})", context, e),
        }
    }
}
