use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use refrag_core::config::{expand_path, Config, PipelineConfig};
use refrag_core::data_processor::DataProcessor;
use refrag_core::traits::Generator;
use refrag_core::types::{Chunk, Mode};
use refrag_hybrid::{ComparisonEngine, QueryEvent, RetrievalOrchestrator, TracingSink};
use refrag_vector::{HashingEmbedder, InMemoryVectorStore};

const INDEX_BATCH: usize = 64;

/// Answers with the prompt it was given, so the assembled context can be
/// inspected without a generation backend.
struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(prompt.to_string())
    }
}

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {} <chunk|query|baseline|compare|stream> [data_dir] [\"<query>\"]", prog);
    std::process::exit(1)
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() { usage(&prog); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn data_dir(config: &Config, arg: Option<&String>) -> PathBuf {
    match arg {
        Some(dir) => expand_path(dir),
        None => config.data_dir(),
    }
}

fn build_store(chunks: &[Chunk]) -> anyhow::Result<InMemoryVectorStore> {
    let mut store = InMemoryVectorStore::new(Arc::new(HashingEmbedder::default()));
    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")?
            .progress_chars("#>-"),
    );
    for batch in chunks.chunks(INDEX_BATCH) {
        store.index(batch)?;
        pb.inc(batch.len() as u64);
    }
    pb.finish_and_clear();
    Ok(store)
}

fn ingest(dir: &Path, pipeline: &PipelineConfig) -> anyhow::Result<Vec<Chunk>> {
    info!(dir = %dir.display(), "ingesting");
    Ok(DataProcessor::new(pipeline.clone()).process_directory(dir)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let pipeline = config.pipeline()?;
    let (cmd, args) = parse_args();
    let dir = data_dir(&config, args.first());
    let chunks = ingest(&dir, &pipeline)?;

    if cmd == "chunk" {
        let mut per_doc: BTreeMap<&str, usize> = BTreeMap::new();
        for c in &chunks { *per_doc.entry(c.source_document_id.as_str()).or_insert(0) += 1; }
        for (doc, n) in &per_doc { println!("{}\t{}", doc, n); }
        println!("total\t{}", chunks.len());
        return Ok(());
    }

    let query = match args.get(1) {
        Some(q) => q.clone(),
        None => usage("refrag"),
    };
    let store = build_store(&chunks)?;
    let orchestrator = RetrievalOrchestrator::new(Arc::new(store), Arc::new(EchoGenerator), pipeline)
        .with_sink(Arc::new(TracingSink));

    match cmd.as_str() {
        "query" | "baseline" => {
            let mode = if cmd == "query" { Mode::Compressed } else { Mode::Baseline };
            let result = orchestrator.query(&query, mode).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        "compare" => {
            let result = ComparisonEngine::new(orchestrator).compare(&query).await?;
            println!("{}", serde_json::to_string_pretty(&result.improvements)?);
            if let Some(m) = &result.compressed.metadata.compression {
                println!("{}", serde_json::to_string_pretty(m)?);
            }
        }
        "stream" => {
            let mut rx = orchestrator.stream(query, Mode::Compressed);
            while let Some(event) = rx.recv().await {
                match event {
                    QueryEvent::ContentDelta { text } => print!("{}", text),
                    QueryEvent::Error { message } => anyhow::bail!(message),
                    other => eprintln!("{}", serde_json::to_string(&other)?),
                }
            }
            println!();
        }
        _ => { eprintln!("Unknown command: {}", cmd); std::process::exit(1); }
    }
    Ok(())
}
