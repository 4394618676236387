//! Parsed-query cache
//!
//! Query text is parsed once and shared; the least recently used entries
//! are evicted first.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;

use super::ast::Expr;
use super::parser::parse;
use crate::error::Result;

/// Default number of cached queries
pub const QUERY_CACHE_CAPACITY: usize = 256;

pub struct QueryCache {
    entries: Mutex<LruCache<String, Arc<Expr>>>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        QueryCache {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Parsed form of `query`; syntax errors are not cached
    pub fn get_or_parse(&self, query: &str) -> Result<Arc<Expr>> {
        if let Some(expr) = self.lock().get(query) {
            return Ok(Arc::clone(expr));
        }
        let expr = Arc::new(parse(query)?);
        self.lock().put(query.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<Expr>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QUERY_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuses_parsed_query() {
        let cache = QueryCache::default();
        let first = cache.get_or_parse("//a[b = 'x']").unwrap();
        let second = cache.get_or_parse("//a[b = 'x']").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recent() {
        let cache = QueryCache::new(2);
        let a = cache.get_or_parse("a").unwrap();
        cache.get_or_parse("b").unwrap();
        cache.get_or_parse("a").unwrap();
        cache.get_or_parse("c").unwrap();
        assert_eq!(cache.len(), 2);
        assert!(Arc::ptr_eq(&a, &cache.get_or_parse("a").unwrap()));
    }

    #[test]
    fn test_errors_not_cached() {
        let cache = QueryCache::default();
        assert!(cache.get_or_parse("//a[").is_err());
        assert!(cache.is_empty());
    }
}
