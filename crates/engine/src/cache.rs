//! Bounded cache of query execution packages
//!
//! Maps raw query text to a shared [`QueryExecutionPackage`]. Readers do
//! not block each other; construction for one key happens at most once
//! concurrently (late callers wait on the in-flight cell instead of
//! re-parsing). Parse failures are never cached. Evicting a package only
//! drops the cache's handle; running queries keep theirs.

use crate::error::EngineError;
use crate::package::QueryExecutionPackage;
use crate::query::SparqlParser;
use crate::store::TripleStore;
use dashmap::DashMap;
use lru::LruCache;
use metrics::counter;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

type BuildResult = Result<Arc<QueryExecutionPackage>, EngineError>;

/// LRU cache over execution packages, keyed by query text
pub struct QueryCache {
    store: Arc<TripleStore>,
    parser: Arc<dyn SparqlParser>,
    packages: Mutex<LruCache<String, Arc<QueryExecutionPackage>>>,
    /// One construction barrier per key currently being built
    in_flight: DashMap<String, Arc<OnceLock<BuildResult>>>,
}

impl QueryCache {
    /// Create a cache bounded to `capacity` packages
    pub fn new(store: Arc<TripleStore>, parser: Arc<dyn SparqlParser>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            parser,
            packages: Mutex::new(LruCache::new(capacity)),
            in_flight: DashMap::new(),
        }
    }

    /// Fetch the package for a query, constructing it on a miss
    ///
    /// Concurrent callers for the same key share one construction; all of
    /// them receive the same package handle.
    pub fn get(&self, sparql: &str) -> BuildResult {
        if let Some(package) = self.packages.lock().get(sparql) {
            trace!(query = %sparql, "package cache hit");
            counter!("engine.query_cache.hits").increment(1);
            return Ok(Arc::clone(package));
        }
        counter!("engine.query_cache.misses").increment(1);

        let cell = Arc::clone(
            self.in_flight
                .entry(sparql.to_string())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .value(),
        );
        let result = cell.get_or_init(|| self.construct(sparql)).clone();

        // Publish before dropping the barrier so late callers always find
        // either the in-flight cell or the cached package
        if let Ok(package) = &result {
            let mut guard = self.packages.lock();
            if !guard.contains(sparql) {
                if let Some((evicted, _)) = guard.push(sparql.to_string(), Arc::clone(package)) {
                    if evicted != sparql {
                        counter!("engine.query_cache.evictions").increment(1);
                    }
                }
            }
        }
        self.in_flight
            .remove_if(sparql, |_, value| Arc::ptr_eq(value, &cell));
        result
    }

    fn construct(&self, sparql: &str) -> BuildResult {
        debug!(query = %sparql, "constructing execution package");
        let parsed = self.parser.parse(sparql)?;
        let package = QueryExecutionPackage::build(&self.store, sparql, &parsed)?;
        Ok(Arc::new(package))
    }

    /// Number of cached packages
    pub fn len(&self) -> usize {
        self.packages.lock().len()
    }

    /// Check if the cache holds no packages
    pub fn is_empty(&self) -> bool {
        self.packages.lock().is_empty()
    }

    /// Drop every cached package (in-use handles stay valid)
    pub fn clear(&self) {
        self.packages.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ParseError, ParsedQuery, PatternTerm, TriplePattern, Variable};
    use rdf_model::Term;

    /// Test parser: `"x <p> y"`-style fixed patterns keyed by query name
    struct StubParser {
        store: Arc<TripleStore>,
    }

    impl SparqlParser for StubParser {
        fn parse(&self, sparql: &str) -> Result<ParsedQuery, ParseError> {
            let Some(predicate) = sparql.strip_prefix("select-by-") else {
                return Err(ParseError::new("unsupported query form"));
            };
            let term = Term::iri(&format!("http://example.org/{predicate}"));
            let slot = match self.store.dictionary().get(&term) {
                Some(id) => PatternTerm::Term(id),
                None => PatternTerm::Unresolved,
            };
            ParsedQuery::new(
                vec![TriplePattern::new(
                    PatternTerm::Variable(Variable::new("x")),
                    slot,
                    PatternTerm::Variable(Variable::new("y")),
                )],
                vec![Variable::new("x"), Variable::new("y")],
                false,
                false,
            )
        }
    }

    fn cache_with(capacity: usize) -> QueryCache {
        let mut store = TripleStore::new();
        for (p, o) in [("p", "b"), ("q", "c")] {
            store.insert_terms(
                Term::iri("http://example.org/a"),
                Term::iri(&format!("http://example.org/{p}")),
                Term::iri(&format!("http://example.org/{o}")),
            );
        }
        let store = Arc::new(store);
        let parser = Arc::new(StubParser {
            store: Arc::clone(&store),
        });
        QueryCache::new(store, parser, capacity)
    }

    #[test]
    fn test_hit_returns_same_package() {
        let cache = cache_with(8);
        let first = cache.get("select-by-p").unwrap();
        let second = cache.get("select-by-p").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let cache = cache_with(8);
        assert!(matches!(
            cache.get("bogus"),
            Err(EngineError::Unparsable(_))
        ));
        assert!(cache.is_empty());
        // A later identical request parses again rather than replaying a miss
        assert!(cache.get("bogus").is_err());
    }

    #[test]
    fn test_capacity_is_bounded() {
        let cache = cache_with(1);
        let first = cache.get("select-by-p").unwrap();
        cache.get("select-by-q").unwrap();
        assert_eq!(cache.len(), 1);

        // The evicted package handle stays usable
        assert!(!first.is_trivially_empty());
    }

    #[test]
    fn test_concurrent_gets_share_construction() {
        let cache = Arc::new(cache_with(8));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get("select-by-p").unwrap())
            })
            .collect();
        let packages: Vec<_> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();
        for package in &packages[1..] {
            assert!(Arc::ptr_eq(&packages[0], package));
        }
    }
}
