//! mlq: compile and run free-text experiment queries.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mlq")]
#[command(about = "mlq - compile and run free-text experiment queries")]
#[command(version)]
struct Cli {
    /// Config file (default: $MLQUERY_CONFIG, then the platform config dir)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the datastore filter a query compiles to
    #[command(visible_alias = "f")]
    Filter {
        /// Query string (e.g., status:running exit_code:0 mnist)
        query: String,

        /// Pretty-print the JSON output
        #[arg(short = 'p', long = "pretty")]
        pretty: bool,

        /// Render date-times as Unix timestamps
        #[arg(short = 't', long = "timestamp")]
        timestamp: bool,
    },

    /// Show the parsed and optimized query trees
    Explain {
        /// Query string
        query: String,
    },

    /// Run a query against a JSON (array or lines) document file
    Find {
        /// Query string (empty matches everything)
        #[arg(default_value = "")]
        query: String,

        /// Document file to search
        #[arg(short = 'd', long = "data")]
        data: PathBuf,

        /// Number of matches to skip
        #[arg(long = "skip", default_value = "0")]
        skip: usize,

        /// Maximum number of matches (default from config; 0 = unlimited)
        #[arg(short = 'n', long = "limit")]
        limit: Option<usize>,

        /// Sort key: [+|-]field
        #[arg(short = 's', long = "sort", allow_hyphen_values = true)]
        sort: Option<String>,

        /// Pretty-print the JSON output
        #[arg(short = 'p', long = "pretty")]
        pretty: bool,
    },

    /// List the queryable fields
    Fields,

    /// Write the default config file
    InitConfig {
        /// Destination (default: the standard config location)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long = "force")]
        force: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Filter { query, pretty, timestamp } => {
            commands::filter(config, &query, pretty, timestamp)
        }
        Commands::Explain { query } => commands::explain(config, &query),
        Commands::Find { query, data, skip, limit, sort, pretty } => {
            let opts = commands::FindArgs {
                skip,
                limit,
                sort,
                pretty,
            };
            commands::find(config, &query, &data, &opts)
        }
        Commands::Fields => commands::fields(config),
        Commands::InitConfig { path, force } => commands::init_config(path.as_deref(), force),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
