//! Compile optimized query trees into datastore filter predicates.

use serde_json::{json, Map};

use crate::registry::Registry;
use crate::value::Value;

use super::ast::Term;

/// Regex options applied to substring predicates (case-insensitive,
/// multi-line, dot matches newline).
pub const REGEX_OPTIONS: &str = "ism";

/// A backend-agnostic filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field = value`
    Eq { field: String, value: Value },
    /// Case-insensitive, unanchored containment of `literal` in `field`.
    Contains { field: String, literal: String },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Render in MongoDB filter syntax.
    pub fn to_document(&self, use_timestamp: bool) -> serde_json::Value {
        match self {
            Predicate::Eq { field, value } => {
                let mut doc = Map::new();
                doc.insert(field.clone(), value.to_json(use_timestamp));
                serde_json::Value::Object(doc)
            }
            Predicate::Contains { field, literal } => {
                let mut doc = Map::new();
                doc.insert(
                    field.clone(),
                    json!({ "$regex": regex::escape(literal), "$options": REGEX_OPTIONS }),
                );
                serde_json::Value::Object(doc)
            }
            Predicate::And(children) => json!({ "$and": documents(children, use_timestamp) }),
            Predicate::Or(children) => json!({ "$or": documents(children, use_timestamp) }),
            // $not only applies to operator expressions; $nor negates a whole clause
            Predicate::Not(child) => json!({ "$nor": [child.to_document(use_timestamp)] }),
        }
    }
}

fn documents(children: &[Predicate], use_timestamp: bool) -> Vec<serde_json::Value> {
    children.iter().map(|c| c.to_document(use_timestamp)).collect()
}

/// The result of building a filter from a query string.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// The empty filter: every record matches.
    MatchAll,
    Where(Predicate),
}

impl Filter {
    pub fn is_match_all(&self) -> bool {
        matches!(self, Filter::MatchAll)
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        match self {
            Filter::MatchAll => None,
            Filter::Where(p) => Some(p),
        }
    }

    /// Render in MongoDB filter syntax; the empty filter is `{}`.
    pub fn to_document(&self, use_timestamp: bool) -> serde_json::Value {
        match self {
            Filter::MatchAll => json!({}),
            Filter::Where(p) => p.to_document(use_timestamp),
        }
    }
}

/// Compile an optimized term.
///
/// # Panics
///
/// Panics if `term` still contains a sentinel or an unexpanded all-fields
/// term, which means it was not optimized first.
pub fn compile(registry: &Registry, term: &Term) -> Predicate {
    match term {
        Term::Field(field_term) => match &field_term.value {
            Value::String(s) if registry.is_regex_eligible(&field_term.field) => {
                Predicate::Contains {
                    field: field_term.field.clone(),
                    literal: s.clone(),
                }
            }
            value => Predicate::Eq {
                field: field_term.field.clone(),
                value: value.clone(),
            },
        },
        Term::And(children) => Predicate::And(compile_all(registry, children)),
        Term::Or(children) => Predicate::Or(compile_all(registry, children)),
        Term::Not(child) => Predicate::Not(Box::new(compile(registry, child))),
        Term::AllFields(_) | Term::Vacuous | Term::Invalid => {
            panic!("compile called on unoptimized term {}", term)
        }
    }
}

fn compile_all(registry: &Registry, children: &[Term]) -> Vec<Predicate> {
    children.iter().map(|c| compile(registry, c)).collect()
}
