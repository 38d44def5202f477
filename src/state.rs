//! scan-session shared state: the reported-target registry
//!
//! The registry is the only mutable resource shared between concurrent scan
//! invocations. Everything else a strategy touches is invocation-local.
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::{debug, error};
use url::Url;

use crate::issues::IssueSink;

/// category → already-reported urls, used to suppress re-probing and
/// re-reporting the same endpoint across insertion points
///
/// Intended to live in an `Arc` handed to each strategy at construction. The
/// read-check-then-insert in [`insert`](Self::insert) happens under a single
/// lock acquisition, so two invocations racing on the same endpoint can't both
/// report it.
#[derive(Debug, Default)]
pub struct ReportedTargets {
    inner: Mutex<HashMap<String, HashSet<Url>>>,
}

impl ReportedTargets {
    /// an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// record `url` under `category`, returning `true` when it wasn't already
    /// recorded
    ///
    /// a poisoned registry answers `false` — ambiguity resolves to silence,
    /// not to a speculative duplicate report
    pub fn insert(&self, category: &str, url: &Url) -> bool {
        match self.inner.lock() {
            Ok(mut guard) => guard
                .entry(category.to_owned())
                .or_default()
                .insert(url.clone()),
            Err(_) => {
                error!(category, "reported-target registry is poisoned; suppressing report");

                false
            }
        }
    }

    /// true when `url` is already recorded under `category`
    pub fn contains(&self, category: &str, url: &Url) -> bool {
        match self.inner.lock() {
            Ok(guard) => guard
                .get(category)
                .is_some_and(|targets| targets.contains(url)),
            Err(_) => {
                error!(category, "reported-target registry is poisoned");

                false
            }
        }
    }

    /// record every given url under `category`
    pub fn seed<I>(&self, category: &str, urls: I)
    where
        I: IntoIterator<Item = Url>,
    {
        if let Ok(mut guard) = self.inner.lock() {
            guard
                .entry(category.to_owned())
                .or_default()
                .extend(urls);
        }
    }

    /// populate `category` from the sink's previously reported findings
    pub fn seed_from_sink(&self, sink: &dyn IssueSink, category: &str) {
        let urls: Vec<Url> = sink
            .existing_issues(category)
            .iter()
            .map(|issue| issue.url().clone())
            .collect();

        debug!(category, count = urls.len(), "seeded reported targets from sink");

        self.seed(category, urls);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(text: &str) -> Url {
        Url::parse(text).unwrap()
    }

    /// the first insert wins; the second caller learns it lost
    #[test]
    fn insert_is_check_then_record() {
        let targets = ReportedTargets::new();
        let endpoint = url("http://example.com/run.php");

        assert!(targets.insert("Code injection", &endpoint));
        assert!(!targets.insert("Code injection", &endpoint));
        assert!(targets.contains("Code injection", &endpoint));
    }

    /// categories don't bleed into each other
    #[test]
    fn categories_are_independent() {
        let targets = ReportedTargets::new();
        let endpoint = url("http://example.com/run.php");

        targets.seed("Code injection", [endpoint.clone()]);

        assert!(targets.contains("Code injection", &endpoint));
        assert!(!targets.contains("Host header poisoning", &endpoint));
        assert!(targets.insert("Host header poisoning", &endpoint));
    }

    /// concurrent racers on one endpoint produce exactly one winner
    #[test]
    fn racing_inserts_have_one_winner() {
        use std::sync::Arc;

        let targets = Arc::new(ReportedTargets::new());
        let endpoint = url("http://example.com/run.php");

        let winners: usize = std::thread::scope(|scope| {
            (0..8)
                .map(|_| {
                    let targets = Arc::clone(&targets);
                    let endpoint = endpoint.clone();

                    scope.spawn(move || usize::from(targets.insert("Code injection", &endpoint)))
                })
                .collect::<Vec<_>>()
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .sum()
        });

        assert_eq!(winners, 1);
    }
}
