//! Bidirectional term interning dictionary
//!
//! Maps RDF terms to opaque 64-bit IDs and back:
//! - Thread-safe concurrent access (readers never block each other)
//! - Deduplication of identical terms
//! - IDs are stable for the lifetime of the dictionary
//!
//! The query engine only ever reads; the bulk loader is the single writer
//! population path, but concurrent interning is still safe.

use crate::{RdfError, Term};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;

/// Opaque identifier for an interned RDF term
///
/// IDs are issued densely starting at 1; 0 is never issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(u64);

impl TermId {
    /// The raw 64-bit value of this ID
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Default)]
struct DictInner {
    /// Term -> ID
    ids: FxHashMap<Term, TermId>,
    /// ID -> Term, indexed by `id - 1`
    terms: Vec<Term>,
}

/// Thread-safe bidirectional dictionary between terms and IDs
///
/// `intern` is stable: interning the same term twice returns the same ID.
/// `lookup` fails with [`RdfError::UnknownTerm`] for IDs that were never
/// issued.
#[derive(Default)]
pub struct Dictionary {
    inner: RwLock<DictInner>,
}

impl Dictionary {
    /// Create a new empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a term, returning its stable ID
    ///
    /// If the term is already known, the existing ID is returned.
    pub fn intern(&self, term: Term) -> TermId {
        // Fast path: already interned (read lock)
        {
            let guard = self.inner.read();
            if let Some(&id) = guard.ids.get(&term) {
                return id;
            }
        }

        // Slow path: insert under the write lock, double-checking first
        let mut guard = self.inner.write();
        if let Some(&id) = guard.ids.get(&term) {
            return id;
        }
        guard.terms.push(term.clone());
        let id = TermId(guard.terms.len() as u64);
        guard.ids.insert(term, id);
        id
    }

    /// Get the ID of a term without interning it
    pub fn get(&self, term: &Term) -> Option<TermId> {
        self.inner.read().ids.get(term).copied()
    }

    /// Resolve an ID back to its term
    pub fn lookup(&self, id: TermId) -> Result<Term, RdfError> {
        let guard = self.inner.read();
        let index = id.0.checked_sub(1).ok_or(RdfError::UnknownTerm(id))? as usize;
        guard
            .terms
            .get(index)
            .cloned()
            .ok_or(RdfError::UnknownTerm(id))
    }

    /// Number of interned terms
    pub fn len(&self) -> usize {
        self.inner.read().terms.len()
    }

    /// Check if the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().terms.is_empty()
    }
}
