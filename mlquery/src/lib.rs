//! mlquery: free-text query engine for experiment records.
//!
//! Compiles strings such as `status:running exit_code:0 foo` into filter
//! predicates for a document datastore.

pub mod config;
pub mod error;
pub mod query;
pub mod registry;
pub mod store;
pub mod value;

pub use config::Config;
pub use error::{Error, Result};
pub use query::{build_filter, parse_query, Filter, FilterSource, Predicate, Term};
pub use registry::{Coercion, FieldSpec, Registry};
pub use store::{FindOptions, MemoryStore, SortBy, SortDirection};
pub use value::{ObjectId, Value};
