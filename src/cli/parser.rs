//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::pipeline::DEFAULT_TRIPLETS_MAX_ROWS;

/// kg-prompt: knowledge-graph grounded prompt enhancement.
///
/// Turns a question into a Cypher query, runs it against the knowledge
/// graph, and rewrites the question into an evidence-grounded prompt.
#[derive(Parser, Debug)]
#[command(name = "kg-prompt")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the TOML config file.
    ///
    /// Defaults to `configs/kg-prompt.toml` when it exists.
    #[arg(short, long, env = "KGP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// The user's question, inline or from a file.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Question text.
    #[arg(short = 'q', long)]
    pub user_query: Option<String>,

    /// File holding the question (takes precedence over --user-query).
    #[arg(long)]
    pub user_query_file: Option<PathBuf>,
}

/// Knowledge-graph context for the retrieval prompt.
#[derive(Args, Debug, Clone)]
pub struct ContextArgs {
    /// Graph schema description.
    #[arg(long, default_value = "configs/prompts/kg_schema.txt")]
    pub schema_file: PathBuf,

    /// Example Cypher query shown to the model.
    #[arg(long, default_value = "configs/prompts/cypher_example.cypher")]
    pub cypher_example_file: PathBuf,

    /// Value dictionary JSON.
    #[arg(long, default_value = "configs/kg_value_dict_min.json")]
    pub value_dict: PathBuf,

    /// Maximum value-dictionary keys to include (0 = all).
    #[arg(long, default_value = "80")]
    pub value_dict_max_keys: usize,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline: question → query → rows → enhanced prompt.
    ///
    /// Every intermediate result is written to the output directory.
    #[command(after_help = r#"Examples:
  kg-prompt run -q "Which LFP cells lost more than 10% capacity?"
  kg-prompt run --user-query-file question.txt --output-dir out/run1
  kg-prompt run -q "..." --rows-file out/run1/kg_results.json   # skip Neo4j
  kg-prompt --format json run -q "..." | jq .enhanced_prompt
"#)]
    Run {
        /// Question input.
        #[command(flatten)]
        query: QueryArgs,

        /// Retrieval context.
        #[command(flatten)]
        context: ContextArgs,

        /// Maximum result rows rendered as evidence.
        #[arg(long, default_value_t = DEFAULT_TRIPLETS_MAX_ROWS)]
        triplets_max_rows: usize,

        /// Artifact directory (overrides `paths.output_dir`).
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Read rows from a JSON file instead of querying Neo4j.
        #[arg(long)]
        rows_file: Option<PathBuf>,

        /// Prompt template directory (overrides `paths.prompt_dir`).
        #[arg(long)]
        prompt_dir: Option<PathBuf>,
    },

    /// Generate a Cypher query for a question and print it.
    #[command(after_help = r#"Examples:
  kg-prompt retrieve -q "Average end voltage of NMC cells at 25 C?"
  kg-prompt --format json retrieve -q "..." | jq -r .query
"#)]
    Retrieve {
        /// Question input.
        #[command(flatten)]
        query: QueryArgs,

        /// Retrieval context.
        #[command(flatten)]
        context: ContextArgs,

        /// Prompt template directory (overrides `paths.prompt_dir`).
        #[arg(long)]
        prompt_dir: Option<PathBuf>,
    },

    /// Build an enhanced prompt from a question and an evidence file.
    Generate {
        /// Question input.
        #[command(flatten)]
        query: QueryArgs,

        /// Evidence text (e.g. a previous `kg_triplets.txt`).
        #[arg(short, long)]
        evidence_file: PathBuf,

        /// Prompt template directory (overrides `paths.prompt_dir`).
        #[arg(long)]
        prompt_dir: Option<PathBuf>,
    },

    /// Print the rendered retrieval prompt without calling any endpoint.
    Render {
        /// Question input.
        #[command(flatten)]
        query: QueryArgs,

        /// Retrieval context.
        #[command(flatten)]
        context: ContextArgs,

        /// Prompt template directory (overrides `paths.prompt_dir`).
        #[arg(long)]
        prompt_dir: Option<PathBuf>,
    },

    /// Write the default prompt templates for customization.
    ///
    /// Existing files are left untouched.
    #[command(after_help = r#"Examples:
  kg-prompt init-prompts                        # ~/.config/kg-prompt/prompts
  kg-prompt init-prompts --dir configs/prompts
"#)]
    InitPrompts {
        /// Target directory.
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}
