//! The parsed-query structure the surface parser hands to the engine
//!
//! The SPARQL grammar lives outside this crate; whatever parses the query
//! text produces a [`ParsedQuery`]: normalized triple patterns with
//! constants already resolved to term IDs, the projection, modifier flags,
//! and a variable-to-label map. [`ParsedQuery::new`] assigns labels itself
//! for parsers (and tests) that do not carry their own map.

use crate::error::EngineError;
use einsum::{Label, LabelSeq, Modifier, Subscript};
use hypertrie::SliceKey;
use rdf_model::TermId;
use rustc_hash::FxHashMap;
use std::fmt;

/// Label alphabet, one symbol per distinct query variable
const LABEL_ALPHABET: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_";

/// A SPARQL query variable
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    name: String,
}

impl Variable {
    /// Create a variable from its name (without the leading `?`)
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// The variable name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}

/// One slot of a triple pattern
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternTerm {
    /// A query variable
    Variable(Variable),
    /// A constant already resolved to a term ID
    Term(TermId),
    /// A constant the dictionary does not know; the pattern cannot match
    Unresolved,
}

impl PatternTerm {
    /// Check whether this slot holds a variable
    pub fn is_variable(&self) -> bool {
        matches!(self, PatternTerm::Variable(_))
    }
}

/// A subject-predicate-object pattern
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriplePattern {
    /// Subject slot
    pub subject: PatternTerm,
    /// Predicate slot
    pub predicate: PatternTerm,
    /// Object slot
    pub object: PatternTerm,
}

impl TriplePattern {
    /// Create a pattern from its three slots
    pub fn new(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// The slots in subject, predicate, object order
    pub fn terms(&self) -> [&PatternTerm; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    /// Check whether any slot holds an unresolved constant
    pub fn has_unresolved(&self) -> bool {
        self.terms()
            .iter()
            .any(|term| matches!(term, PatternTerm::Unresolved))
    }

    /// The slice key fixing this pattern's constants
    ///
    /// `None` when the pattern holds an unresolved constant.
    pub fn slice_key(&self) -> Option<SliceKey> {
        let mut parts = Vec::with_capacity(3);
        for term in self.terms() {
            match term {
                PatternTerm::Variable(_) => parts.push(None),
                PatternTerm::Term(id) => parts.push(Some(*id)),
                PatternTerm::Unresolved => return None,
            }
        }
        Some(SliceKey::new(parts))
    }
}

/// Raised when the query text cannot be turned into a [`ParsedQuery`]
#[derive(Debug, Clone, thiserror::Error)]
#[error("unparsable query: {reason}")]
pub struct ParseError {
    /// Human-readable rejection reason
    pub reason: String,
}

impl ParseError {
    /// Create a parse error with the given reason
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The surface parser the engine consumes
///
/// Implementations turn SPARQL text into a normalized [`ParsedQuery`].
/// Parsing must be deterministic; the package cache keys on the raw text.
pub trait SparqlParser: Send + Sync {
    /// Parse a query string
    fn parse(&self, sparql: &str) -> Result<ParsedQuery, ParseError>;
}

/// A normalized basic graph pattern with projection and modifier flags
#[derive(Clone, Debug)]
pub struct ParsedQuery {
    /// Triple patterns of the basic graph pattern
    pub patterns: Vec<TriplePattern>,
    /// Projected variables, in projection order
    pub projection: Vec<Variable>,
    /// SELECT DISTINCT
    pub distinct: bool,
    /// ASK query (projection is ignored)
    pub ask: bool,
    /// Variable-to-label assignment
    pub var_to_label: FxHashMap<Variable, Label>,
}

impl ParsedQuery {
    /// Build a query, assigning a fresh label per distinct variable
    ///
    /// Labels follow first appearance order across the patterns. Fails when
    /// the label alphabet is exhausted.
    pub fn new(
        patterns: Vec<TriplePattern>,
        projection: Vec<Variable>,
        distinct: bool,
        ask: bool,
    ) -> Result<Self, ParseError> {
        let mut var_to_label: FxHashMap<Variable, Label> = FxHashMap::default();
        let mut alphabet = LABEL_ALPHABET.chars();
        for pattern in &patterns {
            for term in pattern.terms() {
                if let PatternTerm::Variable(var) = term {
                    if !var_to_label.contains_key(var) {
                        let Some(label) = alphabet.next() else {
                            return Err(ParseError::new(format!(
                                "more than {} distinct variables",
                                LABEL_ALPHABET.len()
                            )));
                        };
                        var_to_label.insert(var.clone(), label);
                    }
                }
            }
        }
        for var in &projection {
            if !var_to_label.contains_key(var) {
                return Err(ParseError::new(format!(
                    "projected variable {var} does not occur in any pattern"
                )));
            }
        }
        Ok(Self {
            patterns,
            projection,
            distinct,
            ask,
            var_to_label,
        })
    }

    /// The result modifier this query evaluates under
    ///
    /// ASK queries always use distinct semantics: one witness suffices.
    pub fn modifier(&self) -> Modifier {
        if self.distinct || self.ask {
            Modifier::Distinct
        } else {
            Modifier::Counted
        }
    }

    /// Variables occurring in two or more pattern slots
    pub fn join_variables(&self) -> Vec<Variable> {
        self.variables_by_occurrence(|count| count >= 2)
    }

    /// Variables occurring in exactly one pattern slot
    pub fn non_join_variables(&self) -> Vec<Variable> {
        self.variables_by_occurrence(|count| count == 1)
    }

    fn variables_by_occurrence(&self, keep: impl Fn(usize) -> bool) -> Vec<Variable> {
        let mut counts: FxHashMap<&Variable, usize> = FxHashMap::default();
        for pattern in &self.patterns {
            for term in pattern.terms() {
                if let PatternTerm::Variable(var) = term {
                    *counts.entry(var).or_insert(0) += 1;
                }
            }
        }
        let mut vars: Vec<Variable> = counts
            .into_iter()
            .filter(|(_, count)| keep(*count))
            .map(|(var, _)| var.clone())
            .collect();
        vars.sort();
        vars
    }

    /// Build the subscript this query evaluates
    ///
    /// One label row per pattern that contains at least one variable, in
    /// pattern order; the projection maps through the label assignment.
    /// ASK queries project nothing.
    pub fn subscript(&self) -> Result<Subscript, EngineError> {
        let mut rows: Vec<LabelSeq> = Vec::with_capacity(self.patterns.len());
        for pattern in &self.patterns {
            let row: LabelSeq = pattern
                .terms()
                .iter()
                .filter_map(|term| match term {
                    PatternTerm::Variable(var) => Some(self.label_of(var)),
                    _ => None,
                })
                .collect::<Result<_, _>>()?;
            if !row.is_empty() {
                rows.push(row);
            }
        }

        let result: LabelSeq = if self.ask {
            LabelSeq::new()
        } else {
            self.projection
                .iter()
                .map(|var| self.label_of(var))
                .collect::<Result<_, _>>()?
        };

        Ok(Subscript::new(rows, result, self.modifier())?)
    }

    fn label_of(&self, var: &Variable) -> Result<Label, EngineError> {
        self.var_to_label.get(var).copied().ok_or_else(|| {
            EngineError::Unexpected(format!("variable {var} has no label assigned"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdf_model::{Dictionary, Term};

    fn var(name: &str) -> PatternTerm {
        PatternTerm::Variable(Variable::new(name))
    }

    #[test]
    fn test_label_assignment_follows_first_appearance() {
        let dict = Dictionary::new();
        let p = dict.intern(Term::iri("http://example.org/p"));

        let query = ParsedQuery::new(
            vec![
                TriplePattern::new(var("x"), PatternTerm::Term(p), var("y")),
                TriplePattern::new(var("y"), PatternTerm::Term(p), var("z")),
            ],
            vec![Variable::new("x"), Variable::new("z")],
            false,
            false,
        )
        .unwrap();

        assert_eq!(query.var_to_label[&Variable::new("x")], 'a');
        assert_eq!(query.var_to_label[&Variable::new("y")], 'b');
        assert_eq!(query.var_to_label[&Variable::new("z")], 'c');

        let subscript = query.subscript().unwrap();
        assert_eq!(subscript.to_string(), "ab,bc->ac");
    }

    #[test]
    fn test_projection_must_be_bound() {
        let err = ParsedQuery::new(
            vec![TriplePattern::new(var("x"), var("p"), var("y"))],
            vec![Variable::new("missing")],
            false,
            false,
        )
        .unwrap_err();
        assert!(err.reason.contains("missing"));
    }

    #[test]
    fn test_join_and_non_join_variables() {
        let dict = Dictionary::new();
        let p = dict.intern(Term::iri("http://example.org/p"));

        let query = ParsedQuery::new(
            vec![
                TriplePattern::new(var("x"), PatternTerm::Term(p), var("y")),
                TriplePattern::new(var("x"), PatternTerm::Term(p), var("z")),
            ],
            vec![Variable::new("y")],
            false,
            false,
        )
        .unwrap();

        assert_eq!(query.join_variables(), vec![Variable::new("x")]);
        assert_eq!(
            query.non_join_variables(),
            vec![Variable::new("y"), Variable::new("z")]
        );
    }

    #[test]
    fn test_ask_projects_nothing_and_is_distinct() {
        let query = ParsedQuery::new(
            vec![TriplePattern::new(var("x"), var("p"), var("y"))],
            vec![],
            false,
            true,
        )
        .unwrap();

        assert_eq!(query.modifier(), Modifier::Distinct);
        let subscript = query.subscript().unwrap();
        assert!(subscript.result_labels().is_empty());
    }

    #[test]
    fn test_slice_key_with_unresolved_constant() {
        let pattern = TriplePattern::new(var("x"), PatternTerm::Unresolved, var("y"));
        assert!(pattern.has_unresolved());
        assert!(pattern.slice_key().is_none());
    }

    #[test]
    fn test_repeated_variable_in_pattern() {
        let dict = Dictionary::new();
        let p = dict.intern(Term::iri("http://example.org/p"));

        let query = ParsedQuery::new(
            vec![TriplePattern::new(var("x"), PatternTerm::Term(p), var("x"))],
            vec![Variable::new("x")],
            false,
            false,
        )
        .unwrap();

        let subscript = query.subscript().unwrap();
        assert_eq!(subscript.to_string(), "aa->a");
        assert!(subscript.is_join_label('a'));
    }
}
