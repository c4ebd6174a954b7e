use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use clauseseek::{
    annotator::DEFAULT_KEYPHRASE_LIMIT,
    embedding::DEFAULT_BATCH_SIZE,
    model_manager::{EmbedderKind, EmbedderOverrides},
};

#[derive(Debug, Parser)]
#[command(
    name = "clauseseek",
    about = "Find the sentences in your documents that answer a question"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Embedding provider to use
    #[arg(long, global = true, value_enum)]
    pub embedder: Option<EmbedderKind>,

    /// Override the ColBERT model ID or local model path
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Vector width of the hashing embedder
    #[arg(long, global = true)]
    pub dimension: Option<usize>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Embedder choices given on the command line.
    pub fn embedder_overrides(&self) -> EmbedderOverrides {
        EmbedderOverrides {
            kind: self.embedder,
            model: self.model.clone(),
            dimension: self.dimension,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index a document or a directory of documents
    Ingest(IngestArgs),
    /// Remove a document and its index
    Remove {
        /// Name of the document to remove
        name: String,
    },
    /// List ingested documents
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rank the sentences of ingested documents against a query
    Search(SearchArgs),
    /// Show a line of a document with its neighbours
    Context(ContextArgs),
    /// Show system status and statistics
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the embedder configuration
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Start MCP server for AI agent integration
    Mcp,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Ingest --

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// A .md/.txt file or a directory of them
    pub path: PathBuf,

    /// Document name (a prefix when ingesting a directory)
    #[arg(long)]
    pub name: Option<String>,

    /// File of extra titles, one per line
    #[arg(long)]
    pub titles: Option<PathBuf>,

    /// File of defined terms, one per line
    #[arg(long)]
    pub definitions: Option<PathBuf>,

    /// Rebuild documents that already exist
    #[arg(long)]
    pub replace: bool,

    /// Texts per embedding batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Keyphrases extracted per document
    #[arg(long, default_value_t = DEFAULT_KEYPHRASE_LIMIT)]
    pub keyphrases: usize,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The question or statement to match
    pub query: String,

    /// Search only documents whose names match this glob (repeatable)
    #[arg(short = 'd', long = "document")]
    pub documents: Vec<String>,

    /// Number of results to return
    #[arg(short = 'n', long, default_value = "10")]
    pub count: usize,

    /// Minimum score threshold
    #[arg(long, allow_negative_numbers = true)]
    pub min_score: Option<f32>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the per-term score breakdown
    #[arg(long)]
    pub explain: bool,
}

// -- Context --

#[derive(Debug, Parser)]
pub struct ContextArgs {
    /// Document name
    pub document: String,

    /// Line number (1-based, as printed by search)
    pub line: usize,

    /// Lines to show on each side
    #[arg(short, long, default_value = "2")]
    pub radius: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Model --

#[derive(Debug, Subcommand)]
pub enum ModelAction {
    /// Show the currently resolved embedder
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist the embedder chosen by --embedder/--model/--dimension
    Set,
    /// Clear the stored embedder settings (revert to defaults)
    Clear,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "clauseseek",
            &mut std::io::stdout(),
        );
    }
}
