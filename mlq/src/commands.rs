//! Command implementations for mlq.

use std::path::Path;

use mlquery::config::default_config_path;
use mlquery::{
    build_filter, parse_query, Config, Error, FindOptions, MemoryStore, Registry, SortBy, Term,
};

/// Options for the `find` command.
pub struct FindArgs {
    pub skip: usize,
    pub limit: Option<usize>,
    pub sort: Option<String>,
    pub pretty: bool,
}

fn load_config(path: Option<&Path>) -> mlquery::Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn load_registry(path: Option<&Path>) -> mlquery::Result<(Config, Registry)> {
    let config = load_config(path)?;
    let registry = config.registry()?;
    Ok((config, registry))
}

fn to_json_string(value: &serde_json::Value, pretty: bool) -> mlquery::Result<String> {
    let s = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(s)
}

/// Print the filter document for a query.
pub fn filter(config_path: Option<&Path>, query: &str, pretty: bool, timestamp: bool) -> mlquery::Result<()> {
    let (config, registry) = load_registry(config_path)?;
    let filter = build_filter(&registry, query)?;
    let doc = filter.to_document(timestamp || config.use_timestamp);
    println!("{}", to_json_string(&doc, pretty)?);
    Ok(())
}

/// Print the parsed and optimized trees for a query.
pub fn explain(config_path: Option<&Path>, query: &str) -> mlquery::Result<()> {
    let (_, registry) = load_registry(config_path)?;
    // Blank input matches everything, as in `filter`
    let parsed = if query.trim().is_empty() {
        Term::Vacuous
    } else {
        parse_query(&registry, query)?
    };
    println!("parsed:    {}", parsed);
    println!("optimized: {}", parsed.optimize(&registry));
    Ok(())
}

/// Run a query against a document file and print the matches.
pub fn find(config_path: Option<&Path>, query: &str, data: &Path, args: &FindArgs) -> mlquery::Result<()> {
    let (config, registry) = load_registry(config_path)?;
    let store = MemoryStore::load(data)?;

    let mut options = FindOptions::from_config(&config);
    options.skip = args.skip;
    if let Some(limit) = args.limit {
        options.limit = limit;
    }
    if let Some(sort) = &args.sort {
        let mut sort = SortBy::parse(sort)?;
        sort.field = registry.column(&sort.field).to_string();
        options.sort = Some(sort);
    }

    let docs = store.find_by_query(&registry, query, &options)?;
    let out = serde_json::Value::Array(docs);
    println!("{}", to_json_string(&out, args.pretty)?);
    Ok(())
}

/// List the registered fields.
pub fn fields(config_path: Option<&Path>) -> mlquery::Result<()> {
    let (_, registry) = load_registry(config_path)?;
    for field in registry.fields() {
        let regex = if field.regex { "regex" } else { "-" };
        println!("{}\t{}\t{}", field.name, field.coercion.as_str(), regex);
    }
    Ok(())
}

/// Write the default config to `path` (or the standard location).
pub fn init_config(path: Option<&Path>, force: bool) -> mlquery::Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?,
    };

    if path.exists() && !force {
        return Err(Error::Config(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    Config::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
