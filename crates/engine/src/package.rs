//! Query execution packages
//!
//! A package bundles everything needed to run one parsed query against one
//! state of the store: the normalized subscript, the operands sliced by the
//! constants of each triple pattern, and the trivially-empty flag. Packages
//! are immutable and shared; the cache hands the same package to every
//! caller asking for the same query text.

use crate::error::EngineError;
use crate::query::{ParsedQuery, Variable};
use crate::store::TripleStore;
use einsum::{Deadline, Einsum, Modifier, Subscript};
use hypertrie::{BoolHypertrie, SliceResult};
use std::fmt;
use tracing::{debug, trace};

/// A parsed query with its operands sliced and ready to evaluate
pub struct QueryExecutionPackage {
    sparql: String,
    subscript: Subscript,
    projection: Vec<Variable>,
    ask: bool,
    operands: Vec<BoolHypertrie>,
    /// Size of each sliced operand, in pattern order (0 for misses and for
    /// fully-constant patterns that matched)
    operand_sizes: Vec<u64>,
    trivially_empty: bool,
}

impl QueryExecutionPackage {
    /// Slice the store for every triple pattern and bundle the result
    ///
    /// Slicing stops at the first empty operand: the query can never
    /// produce bindings, and the package records that instead of carrying
    /// operands. Fully-constant patterns resolve to a truth value; a hit
    /// contributes no operand, a miss makes the package trivially empty.
    pub fn build(
        store: &TripleStore,
        sparql: impl Into<String>,
        query: &ParsedQuery,
    ) -> Result<Self, EngineError> {
        let sparql = sparql.into();
        debug!(query = %sparql, "building execution package");

        let subscript = query.subscript()?.optimized();
        debug!(subscript = %subscript, distinct = query.distinct, "parsed subscript");

        let mut operands = Vec::with_capacity(query.patterns.len());
        let mut operand_sizes = Vec::with_capacity(query.patterns.len());
        let mut trivially_empty = false;

        for (position, pattern) in query.patterns.iter().enumerate() {
            let Some(key) = pattern.slice_key() else {
                trace!(position, "pattern holds a term unknown to the dictionary");
                operand_sizes.push(0);
                trivially_empty = true;
                break;
            };
            match store.resolve_pattern(&key) {
                SliceResult::Scalar(present) => {
                    operand_sizes.push(0);
                    if !present {
                        trivially_empty = true;
                    }
                }
                SliceResult::Trie(operand) => {
                    if operand.is_empty() {
                        operand_sizes.push(0);
                        operands.clear();
                        trivially_empty = true;
                    } else {
                        trace!(position, size = operand.size(), "sliced operand");
                        operand_sizes.push(operand.size());
                        operands.push(operand);
                    }
                }
            }
            if trivially_empty {
                debug!(position, "query is trivially empty");
                break;
            }
        }

        Ok(Self {
            sparql,
            subscript,
            projection: query.projection.clone(),
            ask: query.ask,
            operands,
            operand_sizes,
            trivially_empty,
        })
    }

    /// The raw query text this package was built from
    pub fn sparql(&self) -> &str {
        &self.sparql
    }

    /// The normalized subscript
    pub fn subscript(&self) -> &Subscript {
        &self.subscript
    }

    /// The projected variables, in projection order
    pub fn projection(&self) -> &[Variable] {
        &self.projection
    }

    /// Whether this package answers an ASK query
    pub fn is_ask(&self) -> bool {
        self.ask
    }

    /// The result modifier
    pub fn modifier(&self) -> Modifier {
        self.subscript.modifier()
    }

    /// The sliced operands (empty when trivially empty)
    pub fn operands(&self) -> &[BoolHypertrie] {
        &self.operands
    }

    /// Per-pattern operand sizes, up to the first empty one
    pub fn operand_sizes(&self) -> &[u64] {
        &self.operand_sizes
    }

    /// Whether some operand slice already proved the query empty
    pub fn is_trivially_empty(&self) -> bool {
        self.trivially_empty
    }

    /// Start an evaluation of this package under the given deadline
    pub fn einsum(&self, deadline: Deadline) -> Einsum {
        if self.trivially_empty {
            Einsum::empty(deadline)
        } else {
            Einsum::new(&self.subscript, &self.operands, deadline)
        }
    }
}

impl fmt::Display for QueryExecutionPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " SPARQL:          {}", self.sparql)?;
        writeln!(f, " subscript:       {}", self.subscript)?;
        writeln!(
            f,
            " distinct:        {}",
            self.modifier() == Modifier::Distinct
        )?;
        writeln!(f, " trivially empty: {}", self.trivially_empty)
    }
}
