mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{
    hit, hits_with_scores, long_text, CountingGenerator, FailingGenerator, FailingSearch, FixedGenerator, PiecewiseGenerator,
    PromptPacedGenerator, ScriptedSearch, SlowSearch,
};
use refrag_core::config::PipelineConfig;
use refrag_core::traits::{Generator, VectorSearch};
use refrag_core::types::Mode;
use refrag_core::Error;
use refrag_hybrid::comparison::reduction_pct;
use refrag_hybrid::{ChannelSink, ComparisonEngine, MetricsAggregator, QueryEvent, RetrievalOrchestrator, NO_INFORMATION_ANSWER};

fn orchestrator(search: impl VectorSearch + 'static, generator: impl Generator + 'static) -> RetrievalOrchestrator {
    RetrievalOrchestrator::new(Arc::new(search), Arc::new(generator), PipelineConfig::default())
}

fn answer() -> FixedGenerator {
    FixedGenerator("Stack firewood off the ground.".to_string())
}

#[tokio::test]
async fn five_candidates_keep_three_full() {
    let search = ScriptedSearch { hits: hits_with_scores(&[0.95, 0.85, 0.75, 0.65, 0.55]) };
    let result = orchestrator(search, answer()).query("homestead routine", Mode::Compressed).await.unwrap();

    assert_eq!(result.answer, "Stack firewood off the ground.");
    let meta = &result.metadata;
    assert_eq!(meta.mode, Mode::Compressed);
    assert_eq!(meta.chunks_retrieved, 5);
    assert_eq!(meta.confidence, 75);
    let compression = meta.compression.as_ref().unwrap();
    assert_eq!(compression.total_chunks, 5);
    assert_eq!(compression.full_chunks, 3);
    assert_eq!(compression.compressed_chunks, 2);
    assert!(compression.compressed_tokens < compression.original_tokens);
    assert!(meta.tokens_used > 0);
    let stages = meta.retrieval_time + meta.compression_time + meta.generation_time;
    assert!((meta.total_time - stages).abs() < 1e-9);
    assert_eq!(result.sources.len(), 5);
}

#[tokio::test]
async fn empty_search_yields_the_fallback_answer() {
    let result = orchestrator(ScriptedSearch { hits: vec![] }, answer()).query("anything", Mode::Compressed).await.unwrap();
    assert_eq!(result.answer, NO_INFORMATION_ANSWER);
    assert!(result.sources.is_empty());
    let meta = &result.metadata;
    assert_eq!(meta.chunks_retrieved, 0);
    assert_eq!(meta.confidence, 0);
    assert_eq!(meta.total_time, 0.0);
    assert_eq!(meta.retrieval_time, 0.0);
    assert_eq!(meta.tokens_used, 0);
    assert!(meta.compression.is_none());
}

#[tokio::test]
async fn blank_chunks_never_reach_scoring() {
    let hits = vec![hit("a", 0, "   ", 0.9), hit("b", 0, "", 0.8)];
    let result = orchestrator(ScriptedSearch { hits }, answer()).query("q", Mode::Compressed).await.unwrap();
    assert_eq!(result.answer, NO_INFORMATION_ANSWER);

    let hits = vec![hit("a", 0, "   ", 0.9), hit("b", 0, &long_text("b"), 0.8)];
    let result = orchestrator(ScriptedSearch { hits }, answer()).query("q", Mode::Compressed).await.unwrap();
    assert_eq!(result.metadata.chunks_retrieved, 1);
}

#[tokio::test]
async fn collaborator_failures_propagate() {
    let err = orchestrator(FailingSearch, answer()).query("q", Mode::Compressed).await.unwrap_err();
    assert!(matches!(err, Error::Search(_)));
    assert!(err.to_string().contains("connection refused"));

    let search = ScriptedSearch { hits: hits_with_scores(&[0.9]) };
    let err = orchestrator(search, FailingGenerator).query("q", Mode::Baseline).await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)));
}

#[tokio::test]
async fn citations_group_by_document() {
    let long = "x".repeat(300);
    let hits = vec![hit("manual", 0, &long, 0.9), hit("manual", 1, &long_text("m"), 0.8), hit("notes", 0, &long_text("n"), 0.7)];
    let result = orchestrator(ScriptedSearch { hits }, answer()).query("routine", Mode::Compressed).await.unwrap();
    assert_eq!(result.sources.len(), 2);
    let manual = result.sources.iter().find(|s| s.document_id == "manual").unwrap();
    assert_eq!(manual.chunk_count, 2);
    let best = result.sources.iter().map(|s| s.relevance_score).fold(f32::MIN, f32::max);
    assert_eq!(result.sources[0].relevance_score, best);
    for s in &result.sources {
        assert!(s.excerpt.chars().count() <= 203);
    }
}

#[tokio::test]
async fn records_reach_the_sink() {
    let (sink, mut rx) = ChannelSink::channel();
    let search = ScriptedSearch { hits: hits_with_scores(&[0.9, 0.8, 0.7, 0.6]) };
    let orch = orchestrator(search, answer()).with_sink(Arc::new(sink));
    let result = orch.query("routine", Mode::Compressed).await.unwrap();

    let record = rx.try_recv().expect("one record per query");
    assert_eq!(record.mode, Mode::Compressed);
    assert_eq!(record.tokens_used, result.metadata.tokens_used);
    assert!(rx.try_recv().is_err());

    let mut aggregator = MetricsAggregator::new();
    aggregator.increment(&record);
    aggregator.increment(&record);
    assert_eq!(aggregator.total_queries, 2);
    assert_eq!(aggregator.total_tokens, 2 * record.tokens_used as u64);
    assert!((aggregator.avg_latency_ms - record.total_time_ms).abs() < 1e-9);
    assert_eq!(aggregator.history().count(), 2);
    aggregator.reset();
    assert_eq!(aggregator.total_queries, 0);
}

#[test]
fn aggregator_history_is_bounded() {
    let mut aggregator = MetricsAggregator::new();
    let record = refrag_core::types::QueryRecord { tokens_used: 10, total_time_ms: 5.0, mode: Mode::Baseline, tokens_saved: 0 };
    for _ in 0..150 {
        aggregator.increment(&record);
    }
    assert_eq!(aggregator.total_queries, 150);
    assert_eq!(aggregator.history().count(), refrag_hybrid::metrics::HISTORY_LIMIT);
}

#[tokio::test]
async fn comparison_reports_token_savings() {
    let scores: Vec<f32> = (0..10).map(|i| 0.95 - i as f32 * 0.05).collect();
    let (sink, mut rx) = ChannelSink::channel();
    let orch = orchestrator(ScriptedSearch { hits: hits_with_scores(&scores) }, answer()).with_sink(Arc::new(sink));
    let result = ComparisonEngine::new(orch).compare("homestead routine").await.unwrap();

    let base = result.baseline.metadata.compression.as_ref().unwrap();
    assert_eq!(result.baseline.metadata.mode, Mode::Baseline);
    assert_eq!(base.full_chunks, 10);
    assert_eq!(base.compressed_chunks, 0);
    assert_eq!(base.compression_rate, 0.0);

    let comp = result.compressed.metadata.compression.as_ref().unwrap();
    assert_eq!(comp.full_chunks, 3);
    assert_eq!(comp.compressed_chunks, 7);
    assert_eq!(comp.original_tokens, base.original_tokens);

    let imp = &result.improvements;
    assert!(imp.token_savings_pct > 0.0);
    assert!((imp.cost_savings_pct - imp.token_savings_pct).abs() < 1e-6);
    assert_eq!(result.baseline.metadata.retrieval_time, result.compressed.metadata.retrieval_time);

    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_ok());
}

#[tokio::test]
async fn comparison_on_empty_search_is_all_zero() {
    let orch = orchestrator(ScriptedSearch { hits: vec![] }, answer());
    let result = ComparisonEngine::new(orch).compare("q").await.unwrap();
    assert_eq!(result.baseline.answer, NO_INFORMATION_ANSWER);
    assert_eq!(result.compressed.answer, NO_INFORMATION_ANSWER);
    assert_eq!(result.improvements.latency_reduction_pct, 0.0);
    assert_eq!(result.improvements.token_savings_pct, 0.0);
    assert_eq!(result.improvements.cost_savings_pct, 0.0);
}

#[tokio::test]
async fn latency_reduction_excludes_shared_retrieval() {
    let scores: Vec<f32> = (0..10).map(|i| 0.95 - i as f32 * 0.05).collect();
    let search = SlowSearch { hits: hits_with_scores(&scores), delay: Duration::from_millis(100) };
    let result = ComparisonEngine::new(orchestrator(search, PromptPacedGenerator)).compare("homestead routine").await.unwrap();

    let (base, comp) = (&result.baseline.metadata, &result.compressed.metadata);
    assert!(base.retrieval_time >= 100.0);
    let latency = result.improvements.latency_reduction_pct;
    assert_eq!(latency, reduction_pct(base.path_time(), comp.path_time()));
    assert!(latency > 0.0);
    assert!(latency > reduction_pct(base.total_time, comp.total_time));
}

#[test]
fn reduction_guards_zero_baseline() {
    assert_eq!(reduction_pct(0.0, 12.0), 0.0);
    assert_eq!(reduction_pct(200.0, 50.0), 75.0);
    assert!(reduction_pct(100.0, 120.0) < 0.0);
}

#[tokio::test]
async fn stream_emits_retrieval_deltas_and_completion() {
    let generator = PiecewiseGenerator(vec!["Hello".into(), ", ".into(), "world".into()]);
    let orch = orchestrator(ScriptedSearch { hits: hits_with_scores(&[0.9, 0.8]) }, generator);
    let mut rx = orch.stream("routine", Mode::Compressed);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert!(matches!(events[0], QueryEvent::Retrieval { chunks: 2 }));
    let deltas: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            QueryEvent::ContentDelta { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, ["Hello", ", ", "world"]);
    match events.last() {
        Some(QueryEvent::Complete { result }) => assert_eq!(result.answer, "Hello, world"),
        other => panic!("expected completion, got {:?}", other),
    }
}

#[tokio::test]
async fn dropping_the_stream_receiver_stops_generation() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let generator = CountingGenerator { total: 10_000, pulled: Arc::clone(&pulled) };
    let (sink, mut records) = ChannelSink::channel();
    let orch = orchestrator(ScriptedSearch { hits: hits_with_scores(&[0.9, 0.8]) }, generator).with_sink(Arc::new(sink));

    let mut rx = orch.stream("routine", Mode::Compressed);
    assert!(matches!(rx.recv().await, Some(QueryEvent::Retrieval { chunks: 2 })));
    assert!(matches!(rx.recv().await, Some(QueryEvent::ContentDelta { .. })));
    drop(rx);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let seen = pulled.load(Ordering::SeqCst);
    assert!(seen < 100, "generator kept running after cancel: {} deltas", seen);
    assert!(records.try_recv().is_err(), "a cancelled stream records nothing");
}

#[tokio::test]
async fn stream_surfaces_generation_errors() {
    let orch = orchestrator(ScriptedSearch { hits: hits_with_scores(&[0.9]) }, FailingGenerator);
    let mut rx = orch.stream("routine", Mode::Compressed);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(events.len(), 2);
    match &events[1] {
        QueryEvent::Error { message } => assert!(message.contains("quota exceeded")),
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test]
async fn stream_on_empty_search_completes_with_fallback() {
    let orch = orchestrator(ScriptedSearch { hits: vec![] }, answer());
    let mut rx = orch.stream("q", Mode::Compressed);
    assert!(matches!(rx.recv().await, Some(QueryEvent::Retrieval { chunks: 0 })));
    match rx.recv().await {
        Some(QueryEvent::Complete { result }) => assert_eq!(result.answer, NO_INFORMATION_ANSWER),
        other => panic!("expected completion, got {:?}", other),
    }
    assert!(rx.recv().await.is_none());
}

#[test]
fn events_serialize_with_type_tags() {
    let json = serde_json::to_value(QueryEvent::ContentDelta { text: "hi".into() }).unwrap();
    assert_eq!(json["type"], "content-delta");
    assert_eq!(json["text"], "hi");
}
