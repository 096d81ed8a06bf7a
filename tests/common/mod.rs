//! Shared helpers for the integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchyard::prelude::*;
use tracing_subscriber::EnvFilter;

/// Installs a subscriber writing to the test output; safe to call repeatedly
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Ordered record of what ran
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }

    /// Asserts `before` was recorded ahead of `after`
    pub fn assert_order(&self, before: &str, after: &str) {
        let entries = self.entries();
        let first = self
            .position(before)
            .unwrap_or_else(|| panic!("{before} missing from {entries:?}"));
        let second = self
            .position(after)
            .unwrap_or_else(|| panic!("{after} missing from {entries:?}"));
        assert!(first < second, "expected {before} before {after} in {entries:?}");
    }
}

/// A call that records its name, optionally after a delay, optionally failing
pub struct Step {
    name: String,
    journal: Journal,
    delay: Duration,
    fail: bool,
}

impl Step {
    pub fn new(name: impl Into<String>, journal: &Journal) -> Self {
        Self {
            name: name.into(),
            journal: journal.clone(),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    pub fn delayed(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl Call for Step {
    async fn call(&self, _cancel: &CancellationToken, store: &dyn Store) -> CallResult {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.journal.record(self.name.clone());
        store.store("steps", Reference::new(self.name.clone(), serde_json::json!(true)));

        if self.fail {
            return Err(CallError::AbortFlow { status: 500 });
        }
        Ok(())
    }
}

/// Shorthand for a node whose call records `id` and whose revert records `revert:id`
pub fn recorded(id: &str, journal: &Journal) -> Node {
    Node::new(id)
        .with_call(Step::new(id, journal))
        .with_revert(Step::new(format!("revert:{id}"), journal))
}

pub fn new_store() -> Arc<ReferenceStore> {
    Arc::new(ReferenceStore::new())
}
