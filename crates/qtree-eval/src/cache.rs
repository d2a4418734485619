//! Memoized query results.

use lru::LruCache;
use parking_lot::Mutex;
use qtree_core::{Node, Triple};
use qtree_sparql::{parse_query, Binding, Endpoint, EndpointError};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cache key for a query: the canonical rendering of the parsed query, so
/// layout differences outside literals and IRIs do not matter. Text that
/// does not parse is only trimmed.
pub fn normalize_query(query: &str) -> String {
    match parse_query(query) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => query.trim().to_string(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// An endpoint decorator keeping the rows of the most recently used
/// `SELECT` queries. Failed queries are not cached and descriptions are
/// always fetched from the inner endpoint.
pub struct CachingEndpoint<E> {
    inner: E,
    cache: Mutex<LruCache<String, Vec<Binding>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<E> CachingEndpoint<E> {
    /// A capacity of zero is treated as one.
    pub fn new(inner: E, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Drop the cached rows of `query`. Returns whether any were cached.
    pub fn invalidate(&self, query: &str) -> bool {
        self.cache.lock().pop(&normalize_query(query)).is_some()
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<E: Endpoint> Endpoint for CachingEndpoint<E> {
    fn select(&self, query: &str) -> Result<Vec<Binding>, EndpointError> {
        let key = normalize_query(query);
        if let Some(rows) = self.cache.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(rows.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        // the lock is not held while the inner endpoint runs
        let rows = self.inner.select(query)?;
        self.cache.lock().put(key, rows.clone());
        Ok(rows)
    }

    fn construct_description(
        &self,
        resource: &Node,
        depth: usize,
    ) -> Result<Vec<Triple>, EndpointError> {
        self.inner.construct_description(resource, depth)
    }
}

impl<E> std::fmt::Debug for CachingEndpoint<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachingEndpoint")
            .field("entries", &self.len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Counts the calls reaching it; fails queries containing `FAIL`.
    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl Endpoint for Counting {
        fn select(&self, query: &str) -> Result<Vec<Binding>, EndpointError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if query.contains("FAIL") {
                return Err(EndpointError::Transport("down".into()));
            }
            let mut row = Binding::new();
            row.insert("q".into(), Node::literal(query));
            Ok(vec![row])
        }

        fn construct_description(&self, _: &Node, _: usize) -> Result<Vec<Triple>, EndpointError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn normalization_ignores_layout() {
        assert_eq!(
            normalize_query("SELECT ?s\n  WHERE {\t?s ?p ?o . }  "),
            normalize_query("SELECT ?s WHERE { ?s ?p ?o . }")
        );
        assert_eq!(normalize_query("  not a query "), "not a query");
    }

    #[test]
    fn whitespace_inside_literals_keeps_queries_apart() {
        let cache = CachingEndpoint::new(Counting::default(), 8);
        let one = cache
            .select("SELECT ?s WHERE { ?s <http://ex.org/city> \"New York\" . }")
            .expect("rows");
        let two = cache
            .select("SELECT ?s WHERE { ?s <http://ex.org/city> \"New  York\" . }")
            .expect("rows");
        assert_ne!(one, two);
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats(), CacheStats { hits: 0, misses: 2 });
    }

    #[test]
    fn repeated_queries_hit_the_cache() {
        let cache = CachingEndpoint::new(Counting::default(), 8);
        let first = cache.select("SELECT ?s WHERE { ?s ?p ?o . }").expect("rows");
        let second = cache.select("SELECT ?s  WHERE {\n?s ?p ?o . }").expect("rows");
        assert_eq!(first, second);
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn least_recently_used_entries_are_evicted() {
        let cache = CachingEndpoint::new(Counting::default(), 2);
        for q in ["a", "b", "a", "c", "a", "b"] {
            cache.select(q).expect("rows");
        }
        // b was evicted by c, then fetched again
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 4);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn invalidation_and_clear() {
        let cache = CachingEndpoint::new(Counting::default(), 4);
        cache.select("a").expect("rows");
        cache.select("b").expect("rows");
        assert!(cache.invalidate(" a "));
        assert!(!cache.invalidate("a"));
        cache.select("a").expect("rows");
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 3);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = CachingEndpoint::new(Counting::default(), 4);
        assert!(cache.select("FAIL").is_err());
        assert!(cache.select("FAIL").is_err());
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}
