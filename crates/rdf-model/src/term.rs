//! RDF term types
//!
//! Terms are owned values; string payloads are `Arc<str>` so that cloning a
//! term (e.g. out of the dictionary) never copies the underlying text.

use std::fmt;
use std::sync::Arc;

/// An RDF term: IRI, blank node, or literal
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// IRI reference
    /// Example: `<http://example.org/resource>`
    Iri(Arc<str>),

    /// Blank node with a document-scoped label
    /// Example: `_:b0`
    BlankNode(Arc<str>),

    /// Literal value (plain, language-tagged, or typed)
    /// Example: `"John"@en` or `"42"^^xsd:integer`
    Literal(Literal),
}

/// A literal term with optional language tag or datatype IRI
///
/// At most one of `language` and `datatype` is set; a plain literal has
/// neither.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Literal {
    /// The lexical form of the literal
    pub lexical: Arc<str>,
    /// Language tag, e.g. `en`
    pub language: Option<Arc<str>>,
    /// Datatype IRI, e.g. `http://www.w3.org/2001/XMLSchema#integer`
    pub datatype: Option<Arc<str>>,
}

impl Term {
    /// Create an IRI term
    pub fn iri(iri: &str) -> Self {
        Term::Iri(iri.into())
    }

    /// Create a blank node term
    pub fn blank(label: &str) -> Self {
        Term::BlankNode(label.into())
    }

    /// Create a plain string literal
    pub fn literal_str(value: &str) -> Self {
        Term::Literal(Literal {
            lexical: value.into(),
            language: None,
            datatype: None,
        })
    }

    /// Create a language-tagged literal
    pub fn literal_lang(value: &str, language: &str) -> Self {
        Term::Literal(Literal {
            lexical: value.into(),
            language: Some(language.into()),
            datatype: None,
        })
    }

    /// Create a typed literal
    pub fn literal_typed(value: &str, datatype: &str) -> Self {
        Term::Literal(Literal {
            lexical: value.into(),
            language: None,
            datatype: Some(datatype.into()),
        })
    }

    /// Check if this is an IRI
    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    /// Check if this is a blank node
    pub fn is_blank(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    /// Check if this is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::BlankNode(label) => write!(f, "_:{}", label),
            Term::Literal(lit) => {
                write!(f, "\"{}\"", lit.lexical)?;
                if let Some(lang) = &lit.language {
                    write!(f, "@{}", lang)?;
                } else if let Some(dt) = &lit.datatype {
                    write!(f, "^^<{}>", dt)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_constructors() {
        assert!(Term::iri("http://example.org/s").is_iri());
        assert!(Term::blank("b0").is_blank());
        assert!(Term::literal_str("value").is_literal());
    }

    #[test]
    fn test_term_display() {
        assert_eq!(
            Term::iri("http://example.org/s").to_string(),
            "<http://example.org/s>"
        );
        assert_eq!(Term::blank("b0").to_string(), "_:b0");
        assert_eq!(Term::literal_str("v").to_string(), "\"v\"");
        assert_eq!(Term::literal_lang("v", "en").to_string(), "\"v\"@en");
        assert_eq!(
            Term::literal_typed("42", "http://www.w3.org/2001/XMLSchema#integer")
                .to_string(),
            "\"42\"^^<http://www.w3.org/2001/XMLSchema#integer>"
        );
    }

    #[test]
    fn test_literal_equality() {
        // Plain and typed literals with the same lexical form are distinct
        assert_ne!(
            Term::literal_str("42"),
            Term::literal_typed("42", "http://www.w3.org/2001/XMLSchema#integer")
        );
        assert_eq!(Term::literal_str("42"), Term::literal_str("42"));
    }
}
