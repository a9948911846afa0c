//! A thread-safe counted set of canonicalized error messages.
//!
//! Per-request transport failures and timeouts are never fatal to the run;
//! they are rewritten to strip ephemeral address/port detail (so that
//! "dial tcp 10.0.0.7:53211: connection refused" and
//! "dial tcp 10.0.0.9:44102: connection refused" count as the same error)
//! and tallied here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;

/// Ordered rewrite rules applied to an error message before counting.
/// Unmatched text passes through unchanged. The rule set is intentionally
/// small and fixed; growing it only requires adding entries here.
static CANONICALIZATION_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\[[0-9a-fA-F:]+\]:\d+").expect("valid regex"),
            "[addr]",
        ),
        (
            Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}:\d+\b").expect("valid regex"),
            "addr",
        ),
        (
            Regex::new(r"\b[A-Za-z0-9.-]+:\d{2,5}\b").expect("valid regex"),
            "addr",
        ),
    ]
});

/// Rewrite `message` by applying the fixed, ordered canonicalization rules.
pub fn canonicalize(message: &str) -> String {
    let mut out = message.to_string();
    for (pattern, replacement) in CANONICALIZATION_RULES.iter() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out
}

/// A counted set of canonicalized error messages, safe to share across
/// worker tasks.
#[derive(Default)]
pub struct ErrorMap {
    entries: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl ErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonicalize `message` and increment its occurrence counter,
    /// inserting a zeroed counter first if this is the first time the
    /// canonical message has been seen. Takes a read lock for the common
    /// case (key already present) and only upgrades to a write lock on a
    /// first sighting, double-checking under the write lock to avoid a
    /// duplicate insert race.
    pub fn add(&self, message: &str) {
        let key = canonicalize(message);

        if let Some(counter) = self.entries.read().expect("error map lock poisoned").get(&key) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let counter = {
            let mut entries = self.entries.write().expect("error map lock poisoned");
            entries
                .entry(key)
                .or_insert_with(|| Arc::new(AtomicU64::new(0)))
                .clone()
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Total occurrences recorded for `message`'s canonical form.
    pub fn get(&self, message: &str) -> u64 {
        let key = canonicalize(message);
        self.entries
            .read()
            .expect("error map lock poisoned")
            .get(&key)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Snapshot the `(message, count)` pairs, sorted by descending count.
    pub fn by_frequency(&self) -> Vec<(String, u64)> {
        let entries = self.entries.read().expect("error map lock poisoned");
        let mut pairs: Vec<(String, u64)> = entries
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();
        pairs.sort_by(|a, b| b.1.cmp(&a.1));
        pairs
    }

    /// Sum of all occurrence counts across every canonical message.
    pub fn total(&self) -> u64 {
        self.entries
            .read()
            .expect("error map lock poisoned")
            .values()
            .map(|c| c.load(Ordering::Relaxed))
            .sum()
    }
}
