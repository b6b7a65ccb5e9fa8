//! Query terms and the optimizer that normalizes them.

use std::fmt;

use crate::registry::Registry;
use crate::value::Value;

/// A constraint on a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldTerm {
    /// Datastore column (`id` already rewritten to the primary key).
    pub field: String,
    /// Coerced value, or the raw phrase when coercion failed.
    pub value: Value,
    /// Marks a clause that can never be satisfied.
    pub invalid: bool,
}

impl FieldTerm {
    /// Build a term from a query field name and phrase, coercing by the registry.
    ///
    /// A phrase the field's rule rejects stays a string; the term is never
    /// flagged invalid for it.
    pub fn new(registry: &Registry, field: &str, phrase: &str) -> Self {
        let column = registry.column(field);
        Self {
            value: registry.coerce(column, phrase),
            field: column.to_string(),
            invalid: false,
        }
    }

    /// Build a term with an already-typed value.
    pub fn with_value(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
            invalid: false,
        }
    }
}

/// A node of the query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Field(FieldTerm),
    /// A bare phrase, searched against every registered field.
    AllFields(String),
    And(Vec<Term>),
    Or(Vec<Term>),
    Not(Box<Term>),
    /// No constraint; matches everything.
    Vacuous,
    /// Unsatisfiable; poisons an enclosing conjunction.
    Invalid,
}

impl Term {
    /// Shorthand for a registry-coerced field term.
    pub fn field(registry: &Registry, field: &str, phrase: &str) -> Self {
        Term::Field(FieldTerm::new(registry, field, phrase))
    }

    pub fn not(term: Term) -> Self {
        Term::Not(Box::new(term))
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Term::Vacuous | Term::Invalid)
    }

    /// Rewrite into normalized, minimal form.
    ///
    /// The result contains no `AllFields` nodes, and sentinels appear only at
    /// the root. Nested `And`/`Or` nodes are flattened into their parents.
    /// Optimizing an optimized tree returns it unchanged.
    pub fn optimize(self, registry: &Registry) -> Term {
        match self {
            Term::Field(term) => {
                if term.invalid {
                    Term::Invalid
                } else if term.value.is_null() {
                    Term::Vacuous
                } else {
                    Term::Field(term)
                }
            }
            Term::AllFields(phrase) => expand_all_fields(registry, &phrase),
            Term::And(children) => optimize_and(registry, children),
            Term::Or(children) => optimize_or(registry, children),
            Term::Not(child) => optimize_not(registry, *child),
            Term::Vacuous => Term::Vacuous,
            Term::Invalid => Term::Invalid,
        }
    }
}

fn expand_all_fields(registry: &Registry, phrase: &str) -> Term {
    let terms: Vec<Term> = registry
        .fields()
        .iter()
        .map(|spec| Term::field(registry, &spec.name, phrase).optimize(registry))
        .filter(|t| !t.is_sentinel())
        .collect();
    if terms.is_empty() {
        return Term::Vacuous;
    }
    Term::Or(terms).optimize(registry)
}

/// AND is strict: one invalid child makes the whole conjunction invalid.
fn optimize_and(registry: &Registry, children: Vec<Term>) -> Term {
    let mut terms = Vec::with_capacity(children.len());
    for child in children {
        match child.optimize(registry) {
            Term::Invalid => return Term::Invalid,
            Term::Vacuous => {}
            Term::And(nested) => terms.extend(nested),
            other => terms.push(other),
        }
    }
    collapse(terms, Term::And)
}

/// OR is permissive: vacuous and invalid alternatives are dropped.
fn optimize_or(registry: &Registry, children: Vec<Term>) -> Term {
    let mut terms = Vec::with_capacity(children.len());
    for child in children {
        match child.optimize(registry) {
            Term::Invalid | Term::Vacuous => {}
            Term::Or(nested) => terms.extend(nested),
            other => terms.push(other),
        }
    }
    collapse(terms, Term::Or)
}

fn collapse(mut terms: Vec<Term>, combine: fn(Vec<Term>) -> Term) -> Term {
    match terms.len() {
        0 => Term::Vacuous,
        1 => terms.swap_remove(0),
        _ => combine(terms),
    }
}

/// Negating a sentinel yields no constraint, never an inverted match-all.
fn optimize_not(registry: &Registry, child: Term) -> Term {
    // Not(Not(x)) is x, whatever x optimizes to.
    if let Term::Not(inner) = child {
        return inner.optimize(registry);
    }
    match child.optimize(registry) {
        Term::Vacuous | Term::Invalid => Term::Vacuous,
        Term::Not(inner) => *inner,
        other => Term::not(other),
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Field(term) => {
                let bad = if term.invalid { ",bad" } else { "" };
                write!(f, "FieldQuery({}:{}{})", term.field, term.value, bad)
            }
            Term::AllFields(phrase) => write!(f, "AllFields({:?})", phrase),
            Term::And(children) => write_list(f, "And", children),
            Term::Or(children) => write_list(f, "Or", children),
            Term::Not(child) => write!(f, "Not({})", child),
            Term::Vacuous => write!(f, "Vacuous"),
            Term::Invalid => write!(f, "Invalid"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, children: &[Term]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}
