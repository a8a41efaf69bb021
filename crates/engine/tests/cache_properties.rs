//! Randomized cache behavior checks

use engine::{
    ParseError, ParsedQuery, PatternTerm, QueryCache, SparqlParser, TriplePattern, TripleStore,
    Variable,
};
use proptest::prelude::*;
use rdf_model::Term;
use std::sync::Arc;

/// Parser accepting `q<N>` query names, each selecting over predicate `p<N>`
struct NumberedParser {
    store: Arc<TripleStore>,
}

impl SparqlParser for NumberedParser {
    fn parse(&self, sparql: &str) -> Result<ParsedQuery, ParseError> {
        let number: usize = sparql
            .strip_prefix('q')
            .and_then(|rest| rest.parse().ok())
            .ok_or_else(|| ParseError::new("syntax error"))?;
        let term = Term::iri(&format!("http://example.org/p{number}"));
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
            vec![Variable::new("x")],
            false,
            false,
        )
    }
}

fn build_cache(capacity: usize) -> QueryCache {
    let mut store = TripleStore::new();
    for i in 0..4 {
        store.insert_terms(
            Term::iri("http://example.org/s"),
            Term::iri(&format!("http://example.org/p{i}")),
            Term::iri("http://example.org/o"),
        );
    }
    let store = Arc::new(store);
    let parser = Arc::new(NumberedParser {
        store: Arc::clone(&store),
    });
    QueryCache::new(store, parser, capacity)
}

proptest! {
    /// The cache never exceeds its capacity, construction always succeeds
    /// for well-formed queries, and an immediate repeat is a hit
    #[test]
    fn cache_stays_bounded(
        capacity in 1..4usize,
        requests in proptest::collection::vec(0..8usize, 1..40),
    ) {
        let cache = build_cache(capacity);
        for number in requests {
            let text = format!("q{number}");
            let package = cache.get(&text).unwrap();
            prop_assert!(cache.len() <= capacity);

            // The package just constructed (or refreshed) is now the most
            // recently used entry, so asking again must hit
            let hit = cache.get(&text).unwrap();
            prop_assert!(Arc::ptr_eq(&package, &hit));

            // Queries over unknown predicates short-circuit, known ones don't
            prop_assert_eq!(package.is_trivially_empty(), number >= 4);
        }
    }
}
