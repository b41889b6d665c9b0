//! Which documents depend on which included files.

use std::collections::{BTreeSet, HashMap};

/// Maps an included file to the documents that include it.
///
/// Owned by the [`Session`](super::Session); a change to an included file
/// means every dependent document must be converted again.
#[derive(Debug, Default, Clone)]
pub struct IncludeGraph {
    dependents: HashMap<String, BTreeSet<String>>,
}

impl IncludeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `document` includes each of `includes`.
    pub fn register(&mut self, document: &str, includes: &[String]) {
        for include in includes {
            self.dependents
                .entry(include.clone())
                .or_default()
                .insert(document.to_string());
        }
    }

    /// Documents that include `path`, sorted.
    pub fn dependents(&self, path: &str) -> Vec<String> {
        self.dependents
            .get(path)
            .map(|docs| docs.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every edge from `document`, e.g. before re-registering it.
    pub fn forget(&mut self, document: &str) {
        self.dependents.retain(|_, docs| {
            docs.remove(document);
            !docs.is_empty()
        });
    }

    /// Number of tracked include files.
    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}
