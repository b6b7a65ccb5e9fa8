//! Free-text query language.
//!
//! # Syntax Overview
//!
//! - **Field clause**: `status:running`, `name:"two words"`
//! - **Bare phrase**: `foo`, searched against every registered field
//! - Clauses separated by whitespace are ANDed
//!
//! # Pipeline
//!
//! text → [`parse_query`] → [`Term`] → [`Term::optimize`] → [`compile`] → [`Filter`]
//!
//! [`build_filter`] runs the whole pipeline. Its only failure is
//! [`Error::QuerySyntax`], which callers are expected to treat as
//! "no results".

mod ast;
mod compile;
mod parser;

pub use ast::{FieldTerm, Term};
pub use compile::{compile, Filter, Predicate, REGEX_OPTIONS};
pub use parser::{parse_query, tokenize, Clause};

use crate::registry::Registry;
use crate::{Error, Result};

/// Build a filter from a query string.
///
/// Blank input is the empty filter. A query that fails to parse, or whose
/// clauses can never all hold, is a [`Error::QuerySyntax`].
pub fn build_filter(registry: &Registry, input: &str) -> Result<Filter> {
    if input.trim().is_empty() {
        return Ok(Filter::MatchAll);
    }

    let term = parse_query(registry, input)?;
    tracing::debug!(parsed = %term, "parsed query");

    let term = term.optimize(registry);
    tracing::debug!(optimized = %term, "optimized query");

    match term {
        Term::Invalid => Err(Error::QuerySyntax(format!(
            "query can never match: {:?}",
            input
        ))),
        Term::Vacuous => Ok(Filter::MatchAll),
        term => Ok(Filter::Where(compile(registry, &term))),
    }
}

/// A filter as received from a caller: query text, or an already-built
/// datastore document.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSource {
    Text(String),
    Document(serde_json::Value),
}

impl FilterSource {
    /// Resolve to a datastore filter document.
    ///
    /// Text goes through [`build_filter`]; documents pass through untouched.
    pub fn into_document(self, registry: &Registry, use_timestamp: bool) -> Result<serde_json::Value> {
        match self {
            FilterSource::Text(text) => {
                let filter = build_filter(registry, &text)?;
                let doc = filter.to_document(use_timestamp);
                tracing::debug!(filter = %doc, "built filter");
                Ok(doc)
            }
            FilterSource::Document(doc) => Ok(doc),
        }
    }
}
