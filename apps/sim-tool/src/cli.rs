use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sim_query::StrategyKind;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `sim_core=debug`; RUST_LOG wins when set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that a state file parses, matches its checksum and optional schema
    Validate {
        /// State file to check
        state: PathBuf,

        /// State schema JSON file
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Drop nulls and empty containers from a state file
    Minify {
        state: PathBuf,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List collections with record counts
    Inspect { state: PathBuf },

    /// Search records of one collection
    Search {
        state: PathBuf,
        collection: String,
        query: String,

        #[arg(long, value_enum, default_value_t = StrategyArg::Keyword)]
        strategy: StrategyArg,

        /// Record fields to search (dotted paths, repeatable)
        #[arg(long = "field", default_value = "text")]
        fields: Vec<String>,

        /// Maximum results
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Generate a function-calling schema from a docstring file
    Fcspec {
        /// File holding the docstring text
        docstring: PathBuf,

        /// Function name placed in the schema
        #[arg(long)]
        name: String,

        /// Parameters with a default in the signature (comma-separated)
        #[arg(long, value_delimiter = ',')]
        defaults: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyArg {
    Substring,
    Keyword,
    Fuzzy,
    Hybrid,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Substring => StrategyKind::Substring,
            StrategyArg::Keyword => StrategyKind::Keyword,
            StrategyArg::Fuzzy => StrategyKind::Fuzzy,
            StrategyArg::Hybrid => StrategyKind::Hybrid,
        }
    }
}
