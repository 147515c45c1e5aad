use std::{
    io::{BufRead, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use serde::Serialize;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{AskArgs, ChatArgs, Cli, Command, IndexArgs, StatsArgs};
use planrag::{
    DataDir,
    PipelineConfig,
    RedbIndex,
    RetrievalPipeline,
    Result,
    config::{DEFAULT_DOCUMENT_PATH, EmbeddingBackendKind},
    pipeline::{PipelineStats, QueryResponse},
    transcript::{EXAMPLE_QUESTIONS, Transcript},
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("PLANRAG_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(stage = e.stage(), "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Index(args) => cmd_index(cli, args),
        Command::Ask(args) => cmd_ask(cli, args),
        Command::Chat(args) => cmd_chat(cli, args),
        Command::Stats(args) => cmd_stats(cli, args),
        Command::Reset => cmd_reset(cli),
        Command::Completions(args) => {
            args.generate();
            Ok(())
        }
    }
}

fn pipeline_config(cli: &Cli, use_remote: bool) -> PipelineConfig {
    let document = cli
        .document
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCUMENT_PATH));

    let mut config = PipelineConfig::for_document(document);
    if let Some(model) = &cli.model {
        config.embedding_model_name = model.clone();
    }
    if cli.hash_embeddings {
        config.embedding_backend = EmbeddingBackendKind::Hash;
    }
    if let Some(collection) = &cli.collection {
        config.collection_name = collection.clone();
    }
    config.use_remote_generation = use_remote;
    config
}

fn build_pipeline(cli: &Cli, use_remote: bool) -> Result<RetrievalPipeline> {
    let config = pipeline_config(cli, use_remote);
    let mut builder = RetrievalPipeline::builder(config.clone());

    if !cli.ephemeral {
        let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
        let index =
            RedbIndex::open(&data_dir.vectors_db(), &config.collection_name)?;
        builder = builder.index(Box::new(index));
    }

    builder.build()
}

/// Reuse a stored collection when there is one, otherwise index now.
fn ensure_ready(pipeline: &mut RetrievalPipeline) -> Result<()> {
    if pipeline.adopt_existing_index()? {
        return Ok(());
    }
    eprintln!("Indexing {}...", pipeline.config().document_path.display());
    let count = pipeline.index_document()?;
    eprintln!("Indexed {count} chunks.");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{json}");
    Ok(())
}

fn print_stats(stats: &PipelineStats) {
    println!("Document: {}", stats.document_path.display());
    println!("Collection: {}", stats.collection_name);
    println!("Chunks (this run): {}", stats.total_chunks);
    println!("Stored vectors: {}", stats.vector_db_size);
    println!(
        "Embedding model: {} ({} dimensions)",
        stats.embedding_model, stats.embedding_dimension
    );
    println!(
        "Answer mode: {}",
        if stats.gemini_enabled { "Gemini" } else { "local" }
    );
}

fn print_response(response: &QueryResponse) {
    println!("{}", response.answer);
    if response.sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (i, (id, distance)) in
        response.sources.iter().zip(&response.distances).enumerate()
    {
        let preview: String = response.source_documents[i]
            .chars()
            .take(80)
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();
        println!("  {}. {id} (distance {distance:.3}) {preview}", i + 1);
    }
}

fn cmd_index(cli: &Cli, args: &IndexArgs) -> Result<()> {
    let mut pipeline = build_pipeline(cli, false)?;
    if args.reset {
        pipeline.reset()?;
    }

    let count = pipeline.index_document()?;
    eprintln!("Indexed {count} chunks.");
    print_stats(&pipeline.get_stats()?);
    Ok(())
}

fn cmd_ask(cli: &Cli, args: &AskArgs) -> Result<()> {
    let mut pipeline = build_pipeline(cli, args.remote)?;
    ensure_ready(&mut pipeline)?;

    let response = pipeline.query(&args.question, args.n_results)?;
    if args.json {
        print_json(&response)?;
    } else {
        print_response(&response);
    }
    Ok(())
}

fn cmd_chat(cli: &Cli, args: &ChatArgs) -> Result<()> {
    let mut pipeline = build_pipeline(cli, args.remote)?;
    ensure_ready(&mut pipeline)?;
    let mut transcript = Transcript::new();

    println!("Ask a question about the document.");
    println!("Commands: mode, history, clear, examples, quit");
    print_mode(pipeline.use_remote_generation());

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();

        match input {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "mode" => {
                let requested = !pipeline.use_remote_generation();
                let effective = pipeline.set_use_remote_generation(requested);
                if requested && !effective {
                    println!("Gemini is unavailable: GEMINI_API_KEY is not set.");
                }
                print_mode(effective);
            }
            "clear" => {
                transcript.clear();
                println!("History cleared.");
            }
            "history" => {
                if transcript.is_empty() {
                    println!("No questions asked yet.");
                }
                for (i, record) in transcript.records().iter().enumerate() {
                    println!("{}. Q: {}", i + 1, record.question);
                    println!("   A: {}", record.answer);
                }
            }
            "examples" => {
                for question in EXAMPLE_QUESTIONS {
                    println!("  - {question}");
                }
            }
            question => match pipeline.query(question, args.n_results) {
                Ok(response) => {
                    print_response(&response);
                    transcript.push(response.question, response.answer);
                }
                Err(e) => eprintln!("Error: {e}"),
            },
        }
    }

    println!("Goodbye.");
    Ok(())
}

fn print_mode(remote: bool) {
    if remote {
        println!("Answer mode: Gemini");
    } else {
        println!("Answer mode: local");
    }
}

fn cmd_stats(cli: &Cli, args: &StatsArgs) -> Result<()> {
    let mut pipeline = build_pipeline(cli, false)?;
    // Stats stay readable for a collection built with another model.
    if let Err(e) = pipeline.adopt_existing_index() {
        eprintln!("Warning: {e}");
    }

    let stats = pipeline.get_stats()?;
    if args.json {
        print_json(&stats)?;
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn cmd_reset(cli: &Cli) -> Result<()> {
    let mut pipeline = build_pipeline(cli, false)?;
    let stats = pipeline.get_stats()?;
    pipeline.reset()?;
    println!(
        "Removed {} entries from '{}'",
        stats.vector_db_size, stats.collection_name
    );
    Ok(())
}
