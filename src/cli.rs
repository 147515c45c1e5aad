use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "planrag",
    about = "Ask questions about a regional plan document"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Document to index (PDF or plain text)
    #[arg(long, global = true)]
    pub document: Option<PathBuf>,

    /// Override the ColBERT model ID or local model path
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Use the offline hashing embedder instead of a model
    #[arg(long, global = true)]
    pub hash_embeddings: bool,

    /// Keep the index in memory instead of the data directory
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Name of the vector collection
    #[arg(long, global = true)]
    pub collection: Option<String>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract, chunk, embed and store the document
    Index(IndexArgs),
    /// Answer a single question
    Ask(AskArgs),
    /// Interactive question loop
    Chat(ChatArgs),
    /// Show pipeline statistics
    Stats(StatsArgs),
    /// Delete every entry in the collection
    Reset,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Clear the collection before indexing
    #[arg(long)]
    pub reset: bool,
}

// -- Ask --

#[derive(Debug, Parser)]
pub struct AskArgs {
    /// The question
    pub question: String,

    /// Number of passages to retrieve
    #[arg(short = 'n', long, default_value = "3")]
    pub n_results: usize,

    /// Generate the answer with Gemini (needs GEMINI_API_KEY)
    #[arg(long)]
    pub remote: bool,

    /// Output the answer and sources as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Chat --

#[derive(Debug, Parser)]
pub struct ChatArgs {
    /// Number of passages to retrieve per question
    #[arg(short = 'n', long, default_value = "3")]
    pub n_results: usize,

    /// Start with Gemini answers enabled
    #[arg(long)]
    pub remote: bool,
}

// -- Stats --

#[derive(Debug, Parser)]
pub struct StatsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
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
            "planrag",
            &mut std::io::stdout(),
        );
    }
}
