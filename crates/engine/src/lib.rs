//! Query execution layer
//!
//! Ties the data model, the hypertrie, and the einsum operator together:
//! - [`ParsedQuery`]: the structure the surface parser hands over (triple
//!   patterns, projection, modifier flags, variable-to-label map)
//! - [`TripleStore`]: a depth-3 hypertrie plus the term dictionary, loaded
//!   once and shared read-only between concurrent queries
//! - [`QueryExecutionPackage`]: a parsed query with its operands already
//!   sliced by the pattern constants, ready to evaluate
//! - [`QueryCache`]: a bounded LRU over packages keyed by query text, with
//!   at most one in-flight construction per key
//! - [`QueryExecutor`]: drives a query end to end and reports status and
//!   timing to the caller
//!
//! Evaluation is cooperative: the deadline threads through the einsum
//! iterator and the serialization drain loop, and a query that overruns it
//! ends cleanly with a timeout status.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;
mod error;
mod executor;
mod package;
mod query;
mod store;

pub use cache::QueryCache;
pub use error::EngineError;
pub use executor::{ExecutionReport, QueryExecutor, QueryStatus, ResultSink, VecSink};
pub use package::QueryExecutionPackage;
pub use query::{ParseError, ParsedQuery, PatternTerm, SparqlParser, TriplePattern, Variable};
pub use store::TripleStore;
