//! Parser for the free-text query syntax.
//!
//! A query is a whitespace-separated sequence of clauses:
//!
//! - `field:phrase` where `field` matches `[A-Za-z0-9._]+`
//! - `phrase` alone, searched against every registered field
//!
//! A phrase is either a double-quoted string (a backslash escapes the next
//! character) or a run of non-whitespace characters. Clauses are implicitly
//! ANDed; there are no operators or parentheses.

use crate::registry::{is_field_char, Registry};
use crate::{Error, Result};

use super::ast::Term;

/// One clause of a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `field:phrase`
    Field { field: String, phrase: String },
    /// A phrase with no field qualifier.
    Bare(String),
}

impl Clause {
    /// Turn the clause into a query term, coercing field values.
    pub fn into_term(self, registry: &Registry) -> Term {
        match self {
            Clause::Field { field, phrase } => Term::field(registry, &field, &phrase),
            Clause::Bare(phrase) => Term::AllFields(phrase),
        }
    }
}

/// Parse a query string into an (unoptimized) conjunction of its clauses.
///
/// Fails on an empty query, an unterminated quote, or a quoted phrase run
/// into the next clause.
pub fn parse_query(registry: &Registry, input: &str) -> Result<Term> {
    let clauses = tokenize(input)?;
    if clauses.is_empty() {
        return Err(Error::QuerySyntax("empty query".to_string()));
    }
    Ok(Term::And(
        clauses.into_iter().map(|c| c.into_term(registry)).collect(),
    ))
}

/// Split a query string into clauses.
pub fn tokenize(input: &str) -> Result<Vec<Clause>> {
    let mut clauses = Vec::new();
    let mut remaining = input.trim_start();

    while !remaining.is_empty() {
        let (clause, rest) = parse_clause(remaining)?;
        clauses.push(clause);

        // Clauses must be separated by whitespace
        if rest.chars().next().is_some_and(|c| !c.is_whitespace()) {
            let offset = input.len() - rest.len();
            return Err(Error::QuerySyntax(format!(
                "expected whitespace after clause at offset {}",
                offset
            )));
        }
        remaining = rest.trim_start();
    }

    Ok(clauses)
}

/// Parse one clause from the start of `input`.
fn parse_clause(input: &str) -> Result<(Clause, &str)> {
    if let Some((field, after_colon)) = try_parse_field_prefix(input) {
        // `field:` with nothing after it falls through to a bare phrase
        if after_colon.chars().next().is_some_and(|c| !c.is_whitespace()) {
            let (phrase, rest) = parse_phrase(after_colon)?;
            let clause = Clause::Field {
                field: field.to_string(),
                phrase,
            };
            return Ok((clause, rest));
        }
    }

    let (phrase, rest) = parse_phrase(input)?;
    Ok((Clause::Bare(phrase), rest))
}

/// Try to split off `field:`, returning the field name and what follows the colon.
fn try_parse_field_prefix(input: &str) -> Option<(&str, &str)> {
    let end = input.find(|c: char| !is_field_char(c))?;
    if end == 0 {
        return None;
    }
    let after_colon = input[end..].strip_prefix(':')?;
    Some((&input[..end], after_colon))
}

/// Parse a quoted or bare phrase.
fn parse_phrase(input: &str) -> Result<(String, &str)> {
    if let Some(body) = input.strip_prefix('"') {
        return parse_quoted(body);
    }
    let end = find_word_end(input);
    Ok((input[..end].to_string(), &input[end..]))
}

/// Parse the body of a quoted phrase (after the opening quote).
fn parse_quoted(body: &str) -> Result<(String, &str)> {
    let mut phrase = String::new();
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => phrase.push(escaped),
                None => break,
            },
            '"' => return Ok((phrase, &body[i + 1..])),
            _ => phrase.push(c),
        }
    }

    Err(Error::QuerySyntax("unterminated quoted phrase".to_string()))
}

/// Find where a bare phrase ends.
fn find_word_end(input: &str) -> usize {
    input
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, _)| i)
        .unwrap_or(input.len())
}
