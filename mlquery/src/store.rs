//! In-memory document store - the datastore side of the filter contract.
//!
//! Holds experiment documents as JSON and answers
//! `find(filter, skip, limit, sort)` with MongoDB-like matching, so compiled
//! filters can be exercised without a database.

use std::cmp::Ordering;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde_json::Value as Json;

use crate::query::{build_filter, Filter, Predicate};
use crate::registry::Registry;
use crate::value::{from_timestamp_seconds, parse_datetime, ObjectId, Value};
use crate::{Config, Error, Result};

/// Sort order for `find`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort key for `find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortBy {
    pub field: String,
    pub direction: SortDirection,
}

impl SortBy {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parse `[+|-]field`: `-` sorts descending, `+` or no sign ascending.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (direction, field) = if let Some(field) = s.strip_prefix('-') {
            (SortDirection::Descending, field)
        } else if let Some(field) = s.strip_prefix('+') {
            (SortDirection::Ascending, field)
        } else {
            (SortDirection::Ascending, s)
        };

        if field.is_empty() {
            return Err(Error::Config(format!("invalid sort key: {:?}", s)));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// Paging and ordering for `find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: usize,
    /// Maximum number of documents; 0 means no limit.
    pub limit: usize,
    pub sort: Option<SortBy>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: 10,
            sort: None,
        }
    }
}

impl FindOptions {
    /// Options using the configured default page size.
    pub fn from_config(config: &Config) -> Self {
        Self {
            limit: config.default_limit,
            ..Default::default()
        }
    }
}

/// A collection of JSON documents held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Vec<Json>,
}

impl MemoryStore {
    pub fn from_documents(documents: Vec<Json>) -> Self {
        Self { documents }
    }

    /// Load documents from a JSON array file or a JSON-lines file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;

        let documents: Vec<Json> = if contents.trim_start().starts_with('[') {
            serde_json::from_str(&contents)?
        } else {
            contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(serde_json::from_str)
                .collect::<std::result::Result<Vec<Json>, serde_json::Error>>()?
        };

        tracing::debug!(path = %path.display(), count = documents.len(), "loaded documents");
        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[Json] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Return the documents matching `filter`, sorted, then paged.
    pub fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Json>> {
        let matcher = match filter.predicate() {
            Some(predicate) => Matcher::compile(predicate)?,
            None => Matcher::All,
        };

        let mut hits: Vec<&Json> = self
            .documents
            .iter()
            .filter(|doc| matcher.matches(doc))
            .collect();

        if let Some(sort) = &options.sort {
            hits.sort_by(|a, b| {
                let ord = compare_json(first_value(a, &sort.field), first_value(b, &sort.field));
                match sort.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        let limit = if options.limit == 0 {
            usize::MAX
        } else {
            options.limit
        };
        Ok(hits
            .into_iter()
            .skip(options.skip)
            .take(limit)
            .cloned()
            .collect())
    }

    /// Run a text query; a bad query yields no documents rather than an error.
    pub fn find_by_query(
        &self,
        registry: &Registry,
        query: &str,
        options: &FindOptions,
    ) -> Result<Vec<Json>> {
        match build_filter(registry, query) {
            Ok(filter) => self.find(&filter, options),
            Err(e) if e.is_query_syntax() => {
                tracing::info!(error = %e, "bad query, returning empty result");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// A predicate with its substring patterns compiled.
enum Matcher {
    All,
    Eq { field: String, value: Value },
    Regex { field: String, regex: Regex },
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Not(Box<Matcher>),
}

impl Matcher {
    fn compile(predicate: &Predicate) -> Result<Self> {
        Ok(match predicate {
            Predicate::Eq { field, value } => Matcher::Eq {
                field: field.clone(),
                value: value.clone(),
            },
            Predicate::Contains { field, literal } => Matcher::Regex {
                field: field.clone(),
                regex: RegexBuilder::new(&regex::escape(literal))
                    .case_insensitive(true)
                    .multi_line(true)
                    .dot_matches_new_line(true)
                    .build()?,
            },
            Predicate::And(children) => Matcher::And(compile_all(children)?),
            Predicate::Or(children) => Matcher::Or(compile_all(children)?),
            Predicate::Not(child) => Matcher::Not(Box::new(Matcher::compile(child)?)),
        })
    }

    fn matches(&self, doc: &Json) -> bool {
        match self {
            Matcher::All => true,
            Matcher::Eq { field, value } => candidates(doc, field)
                .into_iter()
                .any(|candidate| json_equals(value, candidate)),
            Matcher::Regex { field, regex } => candidates(doc, field)
                .into_iter()
                .any(|candidate| candidate.as_str().is_some_and(|s| regex.is_match(s))),
            Matcher::And(children) => children.iter().all(|m| m.matches(doc)),
            Matcher::Or(children) => children.iter().any(|m| m.matches(doc)),
            Matcher::Not(child) => !child.matches(doc),
        }
    }
}

fn compile_all(children: &[Predicate]) -> Result<Vec<Matcher>> {
    children.iter().map(Matcher::compile).collect()
}

/// Values found at a dotted path, descending through arrays of sub-documents.
fn resolve<'a>(doc: &'a Json, path: &str, out: &mut Vec<&'a Json>) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    match doc {
        Json::Object(map) => {
            if let Some(value) = map.get(head) {
                match rest {
                    Some(rest) => resolve(value, rest, out),
                    None => out.push(value),
                }
            }
        }
        Json::Array(items) => {
            for item in items.iter().filter(|item| item.is_object()) {
                resolve(item, path, out);
            }
        }
        _ => {}
    }
}

/// Values a field test is applied to: each resolved value, plus the
/// elements of resolved arrays.
fn candidates<'a>(doc: &'a Json, path: &str) -> Vec<&'a Json> {
    let mut resolved = Vec::new();
    resolve(doc, path, &mut resolved);

    let mut out = Vec::with_capacity(resolved.len());
    for value in resolved {
        if let Json::Array(items) = value {
            out.extend(items.iter());
        }
        out.push(value);
    }
    out
}

fn first_value<'a>(doc: &'a Json, path: &str) -> Option<&'a Json> {
    let mut resolved = Vec::new();
    resolve(doc, path, &mut resolved);
    resolved.into_iter().next()
}

/// Whether a stored JSON value equals a query literal.
fn json_equals(value: &Value, json: &Json) -> bool {
    match (value, json) {
        (Value::Null, Json::Null) => true,
        (Value::String(s), Json::String(j)) => s == j,
        (Value::Integer(n), Json::Number(num)) => {
            num.as_i64() == Some(*n) || (!num.is_i64() && num.as_f64() == Some(*n as f64))
        }
        (Value::Float(f), Json::Number(num)) => num.as_f64() == Some(*f),
        (Value::ObjectId(oid), Json::String(s)) => ObjectId::parse_str(s) == Some(*oid),
        (Value::ObjectId(_), Json::Object(map)) => {
            map.get("$oid").is_some_and(|inner| json_equals(value, inner))
        }
        (Value::DateTime(dt), Json::String(s)) => parse_datetime(s) == Some(*dt),
        (Value::DateTime(dt), Json::Number(num)) => {
            num.as_f64().and_then(from_timestamp_seconds) == Some(*dt)
        }
        (Value::DateTime(_), Json::Object(map)) => {
            map.get("$date").is_some_and(|inner| json_equals(value, inner))
        }
        _ => false,
    }
}

/// Type rank for ordering mixed values: missing/null, numbers, strings,
/// objects, arrays, booleans.
fn type_rank(json: Option<&Json>) -> u8 {
    match json {
        None | Some(Json::Null) => 0,
        Some(Json::Number(_)) => 1,
        Some(Json::String(_)) => 2,
        Some(Json::Object(_)) => 3,
        Some(Json::Array(_)) => 4,
        Some(Json::Bool(_)) => 5,
    }
}

fn compare_json(a: Option<&Json>, b: Option<&Json>) -> Ordering {
    match (a, b) {
        (Some(Json::Number(x)), Some(Json::Number(y))) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => {
                    let x = x.as_f64().unwrap_or(f64::NAN);
                    let y = y.as_f64().unwrap_or(f64::NAN);
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
            }
        }
        (Some(Json::String(x)), Some(Json::String(y))) => x.cmp(y),
        (Some(Json::Bool(x)), Some(Json::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn experiments() -> MemoryStore {
        MemoryStore::from_documents(vec![
            json!({
                "_id": "5c9e1a2b3c4d5e6f70819201",
                "name": "MNIST baseline",
                "description": "plain CNN",
                "tags": ["mnist", "baseline"],
                "status": "COMPLETED",
                "exit_code": 0,
                "start_time": "2019-03-01T12:30:00+00:00",
                "exc_info": { "hostname": "gpu-01", "work_dir": "/home/alice/mnist" }
            }),
            json!({
                "_id": "5c9e1a2b3c4d5e6f70819202",
                "name": "cifar resnet",
                "description": "ResNet-50 on CIFAR-10",
                "tags": ["cifar"],
                "status": "RUNNING",
                "start_time": 1551530000,
                "exc_info": { "hostname": "gpu-02", "work_dir": "/home/bob/cifar" }
            }),
            json!({
                "_id": { "$oid": "5c9e1a2b3c4d5e6f70819203" },
                "name": "mnist sweep",
                "status": "FAILED",
                "exit_code": 1,
                "exc_info": { "hostname": "gpu-01", "work_dir": "/home/alice/sweep" }
            }),
        ])
    }

    fn names(docs: &[Json]) -> Vec<&str> {
        docs.iter().map(|d| d["name"].as_str().unwrap()).collect()
    }

    fn query(store: &MemoryStore, q: &str) -> Vec<Json> {
        let options = FindOptions {
            limit: 0,
            ..Default::default()
        };
        store.find_by_query(&Registry::default(), q, &options).unwrap()
    }

    #[test]
    fn test_sort_by_parse() {
        assert_eq!(SortBy::parse("-start_time").unwrap(), SortBy::descending("start_time"));
        assert_eq!(SortBy::parse("+name").unwrap(), SortBy::ascending("name"));
        assert_eq!(SortBy::parse("name").unwrap(), SortBy::ascending("name"));
        assert!(SortBy::parse("-").is_err());
        assert!(SortBy::parse("").is_err());
    }

    #[test]
    fn test_find_options_from_config() {
        let config = Config {
            default_limit: 3,
            ..Config::default()
        };
        let options = FindOptions::from_config(&config);
        assert_eq!(options.limit, 3);
        assert_eq!(options.skip, 0);
    }

    #[test]
    fn test_match_all() {
        let store = experiments();
        assert_eq!(query(&store, "").len(), 3);
    }

    #[test]
    fn test_status_equality() {
        let store = experiments();
        assert_eq!(names(&query(&store, "status:running")), vec!["cifar resnet"]);
    }

    #[test]
    fn test_integer_equality() {
        let store = experiments();
        assert_eq!(names(&query(&store, "exit_code:0")), vec!["MNIST baseline"]);
        assert_eq!(names(&query(&store, "exit_code:1")), vec!["mnist sweep"]);
    }

    #[test]
    fn test_substring_is_case_insensitive() {
        let store = experiments();
        assert_eq!(
            names(&query(&store, "name:mnist")),
            vec!["MNIST baseline", "mnist sweep"]
        );
        assert_eq!(names(&query(&store, "description:resnet-50")), vec!["cifar resnet"]);
    }

    #[test]
    fn test_substring_literal_is_not_a_pattern() {
        let store = experiments();
        assert!(query(&store, "name:m.ist").is_empty());
        assert!(query(&store, "name:(a+)+$").is_empty());
    }

    #[test]
    fn test_nested_field() {
        let store = experiments();
        assert_eq!(
            names(&query(&store, "exc_info.hostname:gpu-01")),
            vec!["MNIST baseline", "mnist sweep"]
        );
        assert_eq!(names(&query(&store, "exc_info.work_dir:BOB")), vec!["cifar resnet"]);
    }

    #[test]
    fn test_array_element_equality() {
        let store = experiments();
        assert_eq!(names(&query(&store, "tags:cifar")), vec!["cifar resnet"]);
    }

    #[test]
    fn test_object_id_forms() {
        let store = experiments();
        assert_eq!(
            names(&query(&store, "id:5c9e1a2b3c4d5e6f70819201")),
            vec!["MNIST baseline"]
        );
        assert_eq!(
            names(&query(&store, "id:5c9e1a2b3c4d5e6f70819203")),
            vec!["mnist sweep"]
        );
        assert!(query(&store, "id:nonsense").is_empty());
    }

    #[test]
    fn test_datetime_forms() {
        let store = experiments();
        assert_eq!(
            names(&query(&store, "start_time:2019-03-01T12:30:00Z")),
            vec!["MNIST baseline"]
        );
        assert_eq!(names(&query(&store, "start_time:1551530000")), vec!["cifar resnet"]);
    }

    #[test]
    fn test_bare_word_searches_all_fields() {
        let store = experiments();
        assert_eq!(
            names(&query(&store, "alice")),
            vec!["MNIST baseline", "mnist sweep"]
        );
        assert_eq!(names(&query(&store, "failed")), vec!["mnist sweep"]);
    }

    #[test]
    fn test_conjunction() {
        let store = experiments();
        assert_eq!(names(&query(&store, "mnist exit_code:1")), vec!["mnist sweep"]);
    }

    #[test]
    fn test_bad_query_is_empty() {
        let store = experiments();
        assert!(query(&store, "name:\"unterminated").is_empty());
    }

    #[test]
    fn test_negation() {
        let filter = Filter::Where(Predicate::Not(Box::new(Predicate::Eq {
            field: "status".to_string(),
            value: Value::from("RUNNING"),
        })));
        let options = FindOptions {
            limit: 0,
            ..Default::default()
        };
        let docs = experiments().find(&filter, &options).unwrap();
        assert_eq!(names(&docs), vec!["MNIST baseline", "mnist sweep"]);
    }

    #[test]
    fn test_sort_skip_limit() {
        let store = experiments();
        let options = FindOptions {
            skip: 1,
            limit: 1,
            sort: Some(SortBy::descending("name")),
        };
        let docs = store.find(&Filter::MatchAll, &options).unwrap();
        assert_eq!(names(&docs), vec!["cifar resnet"]);
    }

    #[test]
    fn test_sort_missing_first() {
        let store = experiments();
        let options = FindOptions {
            limit: 0,
            sort: Some(SortBy::ascending("exit_code")),
            ..Default::default()
        };
        let docs = store.find(&Filter::MatchAll, &options).unwrap();
        assert_eq!(
            names(&docs),
            vec!["cifar resnet", "MNIST baseline", "mnist sweep"]
        );
    }

    #[test]
    fn test_default_limit() {
        let docs: Vec<Json> = (0..15).map(|i| json!({ "name": format!("run {}", i) })).collect();
        let store = MemoryStore::from_documents(docs);
        let found = store.find(&Filter::MatchAll, &FindOptions::default()).unwrap();
        assert_eq!(found.len(), 10);
    }

    #[test]
    fn test_load_json_array_and_lines() {
        let tmp = TempDir::new().unwrap();

        let array = tmp.path().join("docs.json");
        std::fs::write(&array, r#"[{"name": "a"}, {"name": "b"}]"#).unwrap();
        assert_eq!(MemoryStore::load(&array).unwrap().len(), 2);

        let lines = tmp.path().join("docs.jsonl");
        std::fs::write(&lines, "{\"name\": \"a\"}\n\n{\"name\": \"b\"}\n{\"name\": \"c\"}\n").unwrap();
        let store = MemoryStore::load(&lines).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(names(store.documents()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_load_errors() {
        let tmp = TempDir::new().unwrap();
        let missing = MemoryStore::load(&tmp.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, Error::NotFound(_)));

        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, "[{").unwrap();
        assert!(matches!(MemoryStore::load(&bad).unwrap_err(), Error::Json(_)));
    }
}
