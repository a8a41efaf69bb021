//! End-to-end query driver
//!
//! Fetches (or builds) the execution package, streams the einsum results
//! into a caller-provided sink, and reports final status with a timing
//! breakdown. The deadline is probed inside the join by the einsum
//! iterator and once per flush chunk while draining; a timeout before the
//! first binding reports as processing, afterwards as serialization.

use crate::cache::QueryCache;
use crate::error::EngineError;
use crate::query::SparqlParser;
use crate::store::TripleStore;
use einsum::{Deadline, Entry, EvalError, PROBE_INTERVAL};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Final status of one query execution
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryStatus {
    /// The query ran to completion
    Ok,
    /// The deadline fired while the join was evaluating
    ProcessingTimeout,
    /// The deadline fired while results were being drained
    SerializationTimeout,
    /// The parser rejected the query text
    Unparsable,
    /// An internal invariant was violated
    Unexpected,
}

/// What the caller gets back after a query ran
#[derive(Clone, Debug)]
pub struct ExecutionReport {
    /// Final status
    pub status: QueryStatus,
    /// Number of bindings handed to the sink
    pub bindings_emitted: u64,
    /// Time spent fetching or building the execution package
    pub parse_ns: u64,
    /// Time from evaluation start to the first binding (or to exhaustion)
    pub execute_ns: u64,
    /// Time spent draining bindings into the sink
    pub serialize_ns: u64,
    /// ASK answer, present only for ASK queries that completed
    pub ask_answer: Option<bool>,
}

impl ExecutionReport {
    fn failed(status: QueryStatus, parse_ns: u64) -> Self {
        Self {
            status,
            bindings_emitted: 0,
            parse_ns,
            execute_ns: 0,
            serialize_ns: 0,
            ask_answer: None,
        }
    }
}

/// Receives the binding stream of a SELECT query
///
/// Implementations serialize entries to their output format. `flush` is
/// called once per [`PROBE_INTERVAL`] entries and once at the end.
pub trait ResultSink {
    /// Consume one binding
    fn write(&mut self, entry: &Entry);

    /// Push buffered output onward
    fn flush(&mut self) {}
}

/// Sink that collects entries in memory
#[derive(Debug, Default)]
pub struct VecSink {
    /// The collected entries
    pub entries: Vec<Entry>,
}

impl VecSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultSink for VecSink {
    fn write(&mut self, entry: &Entry) {
        self.entries.push(entry.clone());
    }
}

/// Drives queries end to end against one store
pub struct QueryExecutor {
    store: Arc<TripleStore>,
    cache: QueryCache,
}

impl QueryExecutor {
    /// Create an executor over a store, with a package cache of the given
    /// capacity
    pub fn new(
        store: Arc<TripleStore>,
        parser: Arc<dyn SparqlParser>,
        cache_capacity: usize,
    ) -> Self {
        let cache = QueryCache::new(Arc::clone(&store), parser, cache_capacity);
        Self { store, cache }
    }

    /// The store this executor reads
    pub fn store(&self) -> &Arc<TripleStore> {
        &self.store
    }

    /// The package cache
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Run a query to completion or to its deadline
    ///
    /// SELECT results stream into `sink`; ASK answers land in the report.
    pub fn execute(
        &self,
        sparql: &str,
        deadline: Deadline,
        sink: &mut dyn ResultSink,
    ) -> ExecutionReport {
        counter!("engine.queries").increment(1);
        let parse_started = Instant::now();

        let package = match self.cache.get(sparql) {
            Ok(package) => package,
            Err(EngineError::Unparsable(reason)) => {
                debug!(query = %sparql, %reason, "query rejected by parser");
                return ExecutionReport::failed(
                    QueryStatus::Unparsable,
                    parse_started.elapsed().as_nanos() as u64,
                );
            }
            Err(err) => {
                warn!(query = %sparql, error = %err, "package construction failed");
                return ExecutionReport::failed(
                    QueryStatus::Unexpected,
                    parse_started.elapsed().as_nanos() as u64,
                );
            }
        };
        let parse_ns = parse_started.elapsed().as_nanos() as u64;

        if deadline.expired() {
            return ExecutionReport::failed(QueryStatus::ProcessingTimeout, parse_ns);
        }

        let report = if package.is_ask() {
            self.run_ask(&package, deadline, parse_ns)
        } else {
            self.run_select(&package, deadline, parse_ns, sink)
        };

        histogram!("engine.query.duration_ms")
            .record((parse_ns + report.execute_ns + report.serialize_ns) as f64 / 1e6);
        info!(
            query = %sparql,
            status = ?report.status,
            bindings = report.bindings_emitted,
            "query finished"
        );
        report
    }

    fn run_ask(
        &self,
        package: &crate::package::QueryExecutionPackage,
        deadline: Deadline,
        parse_ns: u64,
    ) -> ExecutionReport {
        let execute_started = Instant::now();
        let answer = match package.einsum(deadline).next() {
            Some(Ok(_)) => Some(true),
            None => Some(false),
            Some(Err(EvalError::ProcessingTimeout)) => None,
        };
        let execute_ns = execute_started.elapsed().as_nanos() as u64;
        ExecutionReport {
            status: if answer.is_some() {
                QueryStatus::Ok
            } else {
                QueryStatus::ProcessingTimeout
            },
            bindings_emitted: 0,
            parse_ns,
            execute_ns,
            serialize_ns: 0,
            ask_answer: answer,
        }
    }

    fn run_select(
        &self,
        package: &crate::package::QueryExecutionPackage,
        deadline: Deadline,
        parse_ns: u64,
        sink: &mut dyn ResultSink,
    ) -> ExecutionReport {
        let execute_started = Instant::now();
        let mut first_binding_at: Option<Instant> = None;
        let mut bindings_emitted: u64 = 0;
        let mut status = QueryStatus::Ok;

        let mut results = package.einsum(deadline);
        loop {
            match results.next() {
                None => break,
                Some(Err(EvalError::ProcessingTimeout)) => {
                    status = QueryStatus::ProcessingTimeout;
                    break;
                }
                Some(Ok(entry)) => {
                    first_binding_at.get_or_insert_with(Instant::now);
                    sink.write(&entry);
                    bindings_emitted += 1;
                    if bindings_emitted % u64::from(PROBE_INTERVAL) == 0 {
                        sink.flush();
                        if deadline.expired() {
                            status = QueryStatus::SerializationTimeout;
                            break;
                        }
                    }
                }
            }
        }
        sink.flush();

        let finished = Instant::now();
        let (execute_ns, serialize_ns) = match first_binding_at {
            Some(first) => (
                first.duration_since(execute_started).as_nanos() as u64,
                finished.duration_since(first).as_nanos() as u64,
            ),
            None => (
                finished.duration_since(execute_started).as_nanos() as u64,
                0,
            ),
        };

        ExecutionReport {
            status,
            bindings_emitted,
            parse_ns,
            execute_ns,
            serialize_ns,
            ask_answer: None,
        }
    }
}
