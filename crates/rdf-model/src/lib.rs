//! RDF term model with term interning
//!
//! This crate provides the core RDF data model for the tensor query engine:
//! - Owned term representations backed by cheaply clonable `Arc<str>` slices
//! - A bidirectional dictionary mapping terms to opaque 64-bit IDs
//! - ID-based triples as produced by the bulk loader
//!
//! All query-time data structures work on [`TermId`]s only; the dictionary is
//! consulted once at load time and once more when results are serialized.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod dictionary;
mod term;
mod triple;

pub use dictionary::{Dictionary, TermId};
pub use term::{Literal, Term};
pub use triple::Triple;

/// Errors that can occur when working with RDF terms
#[derive(Debug, thiserror::Error)]
pub enum RdfError {
    /// An ID was looked up that was never issued by the dictionary
    #[error("unknown term id: {0}")]
    UnknownTerm(TermId),
}
