//! Collection Registry
//!
//! Maps collection URIs to their published rule sets. Rule sets are never
//! edited in place: republishing swaps the `Arc`, so a reader holding the
//! previous snapshot keeps a consistent view.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::rule_set::IndexRuleSet;

/// Root of the internal collections
pub const SYSTEM_COLLECTION: &str = "/db/system";

/// Internal collections never contribute index rules to queries
pub fn is_system_collection(uri: &str) -> bool {
    uri.strip_prefix(SYSTEM_COLLECTION)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn normalize(uri: &str) -> &str {
    match uri.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Published index configurations, keyed by collection URI
#[derive(Debug, Default)]
pub struct CollectionRegistry {
    configs: RwLock<HashMap<String, Arc<IndexRuleSet>>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a rule set for its collection, replacing any previous snapshot
    pub fn publish(&self, rule_set: IndexRuleSet) -> Arc<IndexRuleSet> {
        let key = normalize(rule_set.collection()).to_string();
        let snapshot = Arc::new(rule_set);
        debug!(collection = %key, rules = snapshot.len(), "publishing index configuration");
        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&snapshot));
        snapshot
    }

    /// Drop the configuration of a collection
    pub fn remove(&self, uri: &str) -> Option<Arc<IndexRuleSet>> {
        self.configs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(normalize(uri))
    }

    /// Configuration in effect for `uri`: its own, or the nearest ancestor's
    pub fn index_configuration(&self, uri: &str) -> Option<Arc<IndexRuleSet>> {
        let configs = self.configs.read().unwrap_or_else(PoisonError::into_inner);
        let mut current = normalize(uri);
        loop {
            if let Some(set) = configs.get(current) {
                return Some(Arc::clone(set));
            }
            match current.rfind('/') {
                Some(0) if current.len() > 1 => current = "/",
                Some(pos) if pos > 0 => current = &current[..pos],
                _ => return None,
            }
        }
    }

    /// Rule sets for the given collections, in order, without system
    /// collections and without repeating a shared snapshot
    pub fn rule_sets_for<'a, I>(&self, collections: I) -> Vec<Arc<IndexRuleSet>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut sets: Vec<Arc<IndexRuleSet>> = Vec::new();
        for uri in collections {
            if is_system_collection(uri) {
                continue;
            }
            if let Some(set) = self.index_configuration(uri) {
                if !sets.iter().any(|s| Arc::ptr_eq(s, &set)) {
                    sets.push(set);
                }
            }
        }
        sets
    }

    /// Number of collections with a published configuration
    pub fn len(&self) -> usize {
        self.configs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
