use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use insight_core::config::{expand_path, Config, Settings};
use insight_core::data_processor::DataProcessor;
use insight_core::{Embedder, Generator};
use insight_embed::get_default_embedder;
use insight_gen::get_default_generator;
use insight_rag::analysis::{ClauseAnalyzer, ClauseSource, DocumentAnalyzer};
use insight_rag::{AnswerGenerator, Retriever};
use insight_vector::{ActiveIndex, IndexSnapshot, IndexStatus, Indexer};

mod render;

#[derive(Parser, Debug)]
#[command(name = "insight", version, about = "Ask questions about contract clauses")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk, embed and index every .txt document under DIR.
    Ingest {
        /// Defaults to `data.documents_dir`.
        dir: Option<PathBuf>,
    },
    /// Answer a question from the indexed clauses.
    Query {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Overview of the whole indexed document.
    Analyze {
        #[arg(long)]
        json: bool,
    },
    /// Explain a single clause read from FILE.
    AnalyzeClause {
        file: PathBuf,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        json: bool,
    },
    /// Report whether an index is available.
    Status,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    init_tracing(&settings);

    match cli.command {
        Command::Ingest { dir } => ingest(&settings, dir),
        Command::Query { question, top_k, json } => query(&settings, &question, top_k, json),
        Command::Analyze { json } => analyze(&settings, json),
        Command::AnalyzeClause { file, source, page, json } => analyze_clause(&settings, &file, source, page, json),
        Command::Status => status(&settings),
    }
}

fn index_dir(settings: &Settings) -> PathBuf {
    expand_path(&settings.data.index_dir)
}

fn load_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let embedder: Arc<dyn Embedder> = Arc::from(get_default_embedder(&settings.embedding).context("creating embedder")?);
    embedder.ensure_loaded().context("loading embedding model")?;
    Ok(embedder)
}

fn load_generator(settings: &Settings) -> Result<Arc<dyn Generator>> {
    let generator: Arc<dyn Generator> = Arc::from(get_default_generator(&settings.generation).context("creating generator")?);
    generator.ensure_loaded().context("loading generation model")?;
    Ok(generator)
}

/// Restores the persisted index into a fresh slot.
fn restore_index(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Arc<ActiveIndex>> {
    let active = Arc::new(ActiveIndex::empty());
    let indexer = Indexer::new(embedder, active.clone()).persist_to(index_dir(settings));
    match indexer.load_persisted()? {
        Some(status) => info!(chunks = status.chunks, "restored clause index"),
        None => warn!(dir = %index_dir(settings).display(), "no usable clause index found; run `insight ingest` first"),
    }
    Ok(active)
}

fn ingest(settings: &Settings, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or_else(|| expand_path(&settings.data.documents_dir));
    info!(dir = %dir.display(), "ingesting documents");
    let chunks = DataProcessor::with_settings(&settings.chunking)
        .process_directory(&dir)
        .with_context(|| format!("reading documents from {}", dir.display()))?;
    if chunks.is_empty() {
        anyhow::bail!("no .txt documents found in {}", dir.display());
    }

    let embedder = load_embedder(settings)?;
    let indexer = Indexer::new(embedder, Arc::new(ActiveIndex::empty()))
        .persist_to(index_dir(settings))
        .with_progress(std::io::stderr().is_terminal());
    let status = indexer.rebuild(chunks)?;
    println!("{}", render::status(&status));
    Ok(())
}

fn query(settings: &Settings, question: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let embedder = load_embedder(settings)?;
    let index = restore_index(settings, embedder.clone())?;
    let retriever = Retriever::new(embedder, index, load_generator(settings)?, settings);

    let response = retriever.respond(question, top_k.unwrap_or(settings.retrieval.top_k))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", render::response(&response));
    }
    Ok(())
}

fn analyze(settings: &Settings, json: bool) -> Result<()> {
    let embedder = load_embedder(settings)?;
    let index = restore_index(settings, embedder)?;
    let answers = AnswerGenerator::from_settings(load_generator(settings)?, &settings.generation);

    let analysis = DocumentAnalyzer::new(index, answers).analyze()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        println!("{}", render::document(&analysis));
    }
    Ok(())
}

fn analyze_clause(settings: &Settings, file: &Path, source: Option<String>, page: Option<u32>, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("reading clause from {}", file.display()))?;
    let source = source.unwrap_or_else(|| {
        file.file_name().map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().to_string())
    });
    let answers = AnswerGenerator::from_settings(load_generator(settings)?, &settings.generation);

    let analysis = ClauseAnalyzer::new(answers).analyze(text.trim(), &ClauseSource { source, page })?;
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        println!("{}", render::clause(&analysis));
    }
    Ok(())
}

/// Reads the snapshot directly so no model has to be loaded.
fn status(settings: &Settings) -> Result<()> {
    let dir = index_dir(settings);
    let status = if IndexSnapshot::exists(&dir) {
        let snapshot = IndexSnapshot::load(&dir)?;
        let created_at = snapshot.created_at;
        IndexStatus::of(&snapshot.into_index()?, Some(created_at))
    } else {
        IndexStatus::not_ready()
    };
    println!("{}", render::status(&status));
    Ok(())
}
