use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docrag::answer::openai::OpenAiChat;
use docrag::answer::{self, AnswerGenerator};
use docrag::config::{Config, DEFAULT_CONFIG_PATH};
use docrag::db::{Collection, Db};
use docrag::embedder::{self, Embedder};
use docrag::error::RagError;
use docrag::indexer::IndexBuilder;
use docrag::retriever::Retriever;
use docrag::server::{self, AppState};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "Index a document folder and answer questions against it")]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the vector index from the documents directory
    Build,

    /// Retrieve the most relevant chunks for a question
    Query {
        question: String,

        /// Number of chunks to return (defaults to search_top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Also generate an answer from the retrieved chunks
        #[arg(short, long)]
        answer: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server
    Serve {
        /// Listen address (defaults to server.bind)
        #[arg(long)]
        bind: Option<String>,

        /// Do not rebuild the index at startup
        #[arg(long)]
        skip_build: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            let code = e
                .downcast_ref::<RagError>()
                .map_or(1, |rag| rag.kind().exit_code());
            ExitCode::from(code as u8)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    config.validate()?;

    match cli.command {
        Commands::Build => {
            let report = index_builder(&config)?.build_index()?;
            println!(
                "Indexed {} chunk(s) from {} document(s) at {}",
                report.chunks,
                report.documents,
                report.finished_at.to_rfc3339()
            );
            Ok(())
        }
        Commands::Query {
            question,
            top_k,
            answer,
            json,
        } => query(&config, &question, top_k, answer, json),
        Commands::Serve { bind, skip_build } => serve(&config, bind, skip_build),
    }
}

fn open_collection(config: &Config) -> Result<Collection> {
    let db = Db::open(&config.index_path, config.embedding.dimensions)
        .map_err(RagError::from)
        .with_context(|| format!("failed to open index: {}", config.index_path.display()))?;
    Ok(Arc::new(db).collection(&config.collection))
}

fn index_builder(config: &Config) -> Result<IndexBuilder> {
    let store = Arc::new(open_collection(config)?);
    let embedder = embedder::from_config(&config.embedding)?;
    Ok(IndexBuilder::from_config(config, store, embedder)?)
}

fn retriever(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Retriever> {
    let store = Arc::new(open_collection(config)?);
    Ok(Retriever::new(embedder, store, config.search_top_k))
}

fn query(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    with_answer: bool,
    json: bool,
) -> Result<()> {
    let embedder = embedder::from_config(&config.embedding)?;
    let mut retriever = retriever(config, embedder)?;
    if let Some(k) = top_k {
        retriever = retriever.with_top_k(k);
    }

    if with_answer {
        let generator = OpenAiChat::from_config(&config.chat)?;
        let response = answer::ask(
            &retriever,
            &generator,
            question,
            config.server.snippet_chars,
        )?;
        if json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            println!("{}\n", response.answer);
            for r in &response.references {
                println!("[{:.3}] {}: {}", r.score, r.document_title, r.snippet);
            }
        }
        return Ok(());
    }

    let items = retriever.retrieve(question)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No matching chunks.");
    } else {
        for (i, item) in items.iter().enumerate() {
            println!(
                "{}. [{:.3}] {} (chunk {})",
                i + 1,
                item.score,
                item.metadata.document_title,
                item.metadata.chunk_index
            );
            println!("   {}", answer::snippet(&item.content, 200).replace('\n', " "));
        }
    }
    Ok(())
}

fn serve(config: &Config, bind: Option<String>, skip_build: bool) -> Result<()> {
    let embedder = embedder::from_config(&config.embedding)?;

    if config.server.build_on_start && !skip_build {
        let store = Arc::new(open_collection(config)?);
        let report = IndexBuilder::from_config(config, store, embedder.clone())?.build_index()?;
        info!("Startup build indexed {} chunk(s)", report.chunks);
    }

    let generator: Arc<dyn AnswerGenerator> = Arc::new(OpenAiChat::from_config(&config.chat)?);
    let state = Arc::new(AppState {
        retriever: Arc::new(retriever(config, embedder)?),
        generator,
        snippet_chars: config.server.snippet_chars,
        allowed_origins: config.server.allowed_origins.clone(),
    });
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    // The HTTP clients inside `state` block; keep the last reference out here
    // so they are dropped after the runtime is gone.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let result = runtime.block_on(server::serve(state.clone(), &bind));
    drop(runtime);
    drop(state);
    result
}
