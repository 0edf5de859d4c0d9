//! QnA CLI - Command-line interface
//!
//! Usage:
//!   qna ask <document> -q <question> [-q <question>...] [--questions-file <file>]
//!   qna chunks <document> [--chunk-size <n>] [--chunk-overlap <n>]
//!   qna serve [--host <host>] [--port <port>]

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use qna_core::AppConfig;
use qna_parser::DocumentChunker;
use qna_rag::QnaPipeline;
use serde_json::{Map, Value};

#[derive(Parser)]
#[command(name = "qna")]
#[command(about = "Answer questions about a document")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer questions about a document and print them as JSON
    Ask {
        /// Document to answer from
        document: PathBuf,

        /// Question to ask (repeatable)
        #[arg(short, long = "question")]
        questions: Vec<String>,

        /// JSON file shaped like {"questions": [...]}
        #[arg(long)]
        questions_file: Option<PathBuf>,
    },
    /// Show how a document is split into chunks
    Chunks {
        /// Document to split
        document: PathBuf,

        /// Maximum chunk length in tokens
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Tokens shared between consecutive chunks
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Run the HTTP server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qna=info,qna_rag=info,qna_api=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask {
            document,
            mut questions,
            questions_file,
        } => {
            if let Some(path) = questions_file {
                questions.extend(read_questions_file(&path)?);
            }
            anyhow::ensure!(!questions.is_empty(), "No questions given");

            let config = AppConfig::load()?;
            let pipeline = QnaPipeline::from_config(&config)?;
            let records = pipeline.answer_all(&document, &questions).await?;

            let mut answers = Map::new();
            for record in records {
                answers.insert(record.question, Value::String(record.answer));
            }
            println!("{}", serde_json::to_string_pretty(&answers)?);
        }
        Commands::Chunks {
            document,
            chunk_size,
            chunk_overlap,
        } => {
            // No chat model involved, so a missing API key is fine here
            let config = AppConfig::load_unvalidated(None)?;
            let chunker = DocumentChunker::with_tiktoken(
                chunk_size.unwrap_or(config.rag.chunk_size),
                chunk_overlap.unwrap_or(config.rag.chunk_overlap),
            )?;

            let chunks = chunker.extract_chunks(&document)?;
            for chunk in &chunks {
                let page = chunk
                    .metadata
                    .page
                    .map(|p| format!("page {p}, "))
                    .unwrap_or_default();
                println!(
                    "--- chunk {} ({}offset {}, {} tokens)",
                    chunk.index,
                    page,
                    chunk.metadata.start_index,
                    chunker.splitter().token_len(&chunk.content)
                );
                println!("{}", chunk.content);
            }
            let splitter = chunker.splitter();
            eprintln!(
                "{} chunks (size {}, overlap {} tokens)",
                chunks.len(),
                splitter.chunk_size(),
                splitter.chunk_overlap()
            );
        }
        Commands::Serve { host, port } => {
            let mut config = AppConfig::load()?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            qna_api::serve(config).await?;
        }
    }

    Ok(())
}

/// Questions from a `{"questions": [...]}` file
fn read_questions_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read(path)
        .with_context(|| format!("Failed to read questions file {}", path.display()))?;
    let value: Value = serde_json::from_slice(&raw)
        .with_context(|| format!("Questions file {} is not valid JSON", path.display()))?;

    let questions = value
        .get("questions")
        .and_then(Value::as_array)
        .with_context(|| format!("{} has no \"questions\" list", path.display()))?;

    questions
        .iter()
        .map(|q| {
            q.as_str()
                .map(str::to_string)
                .context("Every question must be a string")
        })
        .collect()
}
