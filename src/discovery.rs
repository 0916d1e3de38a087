//! Accumulator of artist spellings the correction map did not know.
//!
//! The normalizer records every artist token it passes through unchanged. At the
//! end of a run the caller drains the collector and hands the list to the review
//! step, which may add the spellings to the correction map.

use std::sync::{Mutex, MutexGuard};

use rustc_hash::FxHashSet;

#[derive(Debug, Default)]
struct Discovered {
    order: Vec<String>,
    seen: FxHashSet<String>,
}

/// Insertion-ordered, duplicate-free set of unresolved artist tokens.
/// Safe to share between worker threads.
#[derive(Debug, Default)]
pub struct ArtistDiscoveryCollector {
    inner: Mutex<Discovered>,
}

impl ArtistDiscoveryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Discovered> {
        // The set only ever grows, so a panic mid-insert leaves it usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a token. Recording the same string twice has no effect.
    pub fn record(&self, token: &str) {
        let mut inner = self.lock();
        if inner.seen.insert(token.to_string()) {
            inner.order.push(token.to_string());
        }
    }

    pub fn record_all<I, S>(&self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut inner = self.lock();
        for token in tokens {
            let token = token.as_ref();
            if inner.seen.insert(token.to_string()) {
                inner.order.push(token.to_string());
            }
        }
    }

    /// Take every recorded token in first-seen order, leaving the collector empty.
    pub fn drain(&self) -> Vec<String> {
        let mut inner = self.lock();
        inner.seen.clear();
        std::mem::take(&mut inner.order)
    }

    /// Copy of the recorded tokens without clearing them.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().order.clone()
    }

    /// Forget everything. Called at the start of each run.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.seen.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().order.is_empty()
    }
}
