//! Triple store: a depth-3 hypertrie plus the term dictionary
//!
//! Loaded once by the bulk loader, then shared read-only between all
//! concurrent query evaluations. No locks on the read path.

use crate::error::EngineError;
use crate::package::QueryExecutionPackage;
use crate::query::ParsedQuery;
use einsum::{Deadline, Einsum};
use hypertrie::{BoolHypertrie, SliceKey, SliceResult};
use rdf_model::{Dictionary, Term, Triple};
use std::sync::Arc;
use tracing::debug;

/// The shared RDF store the engine evaluates against
pub struct TripleStore {
    trie: BoolHypertrie,
    dictionary: Arc<Dictionary>,
}

impl Default for TripleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TripleStore {
    /// Create an empty store with a fresh dictionary
    pub fn new() -> Self {
        Self::with_dictionary(Arc::new(Dictionary::new()))
    }

    /// Create an empty store sharing an existing dictionary
    pub fn with_dictionary(dictionary: Arc<Dictionary>) -> Self {
        Self {
            trie: BoolHypertrie::new(3),
            dictionary,
        }
    }

    /// The term dictionary backing this store
    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    /// The underlying hypertrie
    pub fn hypertrie(&self) -> &BoolHypertrie {
        &self.trie
    }

    /// Number of stored triples
    pub fn len(&self) -> u64 {
        self.trie.size()
    }

    /// Check if the store holds no triples
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Insert one ID triple; returns `true` if it was new
    pub fn insert(&mut self, triple: Triple) -> bool {
        self.trie.insert(&triple.as_array())
    }

    /// Intern three terms and insert the resulting triple
    pub fn insert_terms(&mut self, subject: Term, predicate: Term, object: Term) -> bool {
        let triple = Triple::new(
            self.dictionary.intern(subject),
            self.dictionary.intern(predicate),
            self.dictionary.intern(object),
        );
        self.insert(triple)
    }

    /// Bulk-load triples; returns the number of newly added ones
    pub fn load<I: IntoIterator<Item = Triple>>(&mut self, triples: I) -> u64 {
        let mut added = 0;
        for triple in triples {
            if self.insert(triple) {
                added += 1;
            }
        }
        debug!(added, total = self.len(), "loaded triples");
        added
    }

    /// Slice the store by a triple pattern's constants
    pub fn resolve_pattern(&self, key: &SliceKey) -> SliceResult {
        self.trie.slice(key)
    }

    /// Evaluate a SELECT query directly, without the package cache
    pub fn eval_select(
        &self,
        query: &ParsedQuery,
        deadline: Deadline,
    ) -> Result<Einsum, EngineError> {
        let package = QueryExecutionPackage::build(self, String::new(), query)?;
        Ok(package.einsum(deadline))
    }

    /// Evaluate a query as ASK: does at least one binding exist?
    pub fn eval_ask(&self, query: &ParsedQuery, deadline: Deadline) -> Result<bool, EngineError> {
        let mut results = self.eval_select(query, deadline)?;
        match results.next() {
            Some(Ok(_)) => Ok(true),
            Some(Err(err)) => Err(err.into()),
            None => Ok(false),
        }
    }
}
