//! End-to-end tests for the retrieval service and the tool surface,
//! running the full chunk, embed, index, query pipeline against the
//! in-memory index with deterministic embedders.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use antipattern_rag::{
    ChunkConfig, Document, Embedder, InMemoryIndex, KbSearchTool, ProviderErrorKind, Result,
    RetrievalConfig, RetrievalError, RetrievalService, SplitStrategy, VectorIndex, NO_RESULTS,
};
use async_trait::async_trait;
use serde_json::json;

const DIM: usize = 8;

/// Deterministic embedder: folds the text's bytes into a seed and fills
/// the vector from it. Same text, same vector; no network.
struct HashEmbedder;

impl HashEmbedder {
    fn vector_for(text: &str) -> Vec<f32> {
        let seed = text
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)));
        let mut v: Vec<f32> = (0..DIM)
            .map(|i| ((seed.wrapping_add(i as u64 * 2_654_435_761)) % 1000) as f32 / 500.0 - 1.0)
            .collect();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-6 {
            v[0] = 1.0;
            return v;
        }
        for val in &mut v {
            *val /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector_for(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Embeds text as normalized keyword-occurrence counts plus a constant
/// component, making relevance ranking predictable.
struct KeywordEmbedder {
    keywords: Vec<&'static str>,
}

impl KeywordEmbedder {
    fn new(keywords: Vec<&'static str>) -> Self {
        Self { keywords }
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v: Vec<f32> = self
            .keywords
            .iter()
            .map(|k| text.matches(k).count() as f32)
            .collect();
        v.push(1.0);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        Ok(v.into_iter().map(|x| x / norm).collect())
    }

    fn dimensions(&self) -> usize {
        self.keywords.len() + 1
    }
}

/// Fails every call with a retryable provider error.
struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RetrievalError::Provider {
            provider: "mock".to_string(),
            kind: ProviderErrorKind::RateLimited,
            message: "quota exhausted".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Counts calls before delegating, to observe whether a remote call was
/// ever attempted.
#[derive(Default)]
struct CountingEmbedder {
    calls: AtomicUsize,
}

impl CountingEmbedder {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HashEmbedder::vector_for(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Takes a minute per call; used with a paused clock to exercise timeouts.
struct SlowEmbedder;

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(HashEmbedder::vector_for(text))
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

fn test_config() -> RetrievalConfig {
    RetrievalConfig::builder().default_top_k(3).build().unwrap()
}

fn service_with(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> RetrievalService {
    RetrievalService::builder()
        .config(test_config())
        .embedder(embedder)
        .index(index)
        .build()
        .unwrap()
}

#[tokio::test]
async fn ingestion_indexes_every_chunk_of_a_document() {
    let index = Arc::new(InMemoryIndex::new());
    let service = service_with(Arc::new(HashEmbedder), index.clone());

    let document = Document::new("guide", "a".repeat(500)).with_metadata("source", "unit");
    let chunk_config = ChunkConfig {
        max_chars: 200,
        overlap: 20,
        strategy: SplitStrategy::Characters,
    };
    let count = service
        .ingest_with("kb", &document, &chunk_config)
        .await
        .unwrap();
    assert_eq!(count, 3);

    let probe = HashEmbedder::vector_for("anything");
    let hits = index.query("kb", &probe, 10).await.unwrap();
    assert_eq!(hits.len(), 3);

    let ids: HashSet<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert!(ids.contains("guide_0"));
    assert!(ids.contains("guide_1"));
    assert!(ids.contains("guide_2"));
    for hit in &hits {
        assert_eq!(hit.document_id, "guide");
        assert!(hit.metadata.contains_key("seq"));
        assert_eq!(hit.metadata.get("source").map(String::as_str), Some("unit"));
    }
}

#[tokio::test]
async fn reingesting_a_document_overwrites_instead_of_duplicating() {
    let index = Arc::new(InMemoryIndex::new());
    let service = service_with(Arc::new(HashEmbedder), index.clone());

    let document =
        Document::new("catalog", "first paragraph\n\nsecond paragraph\n\nthird paragraph");
    let first = service.ingest("kb", &document).await.unwrap();
    let second = service.ingest("kb", &document).await.unwrap();
    assert_eq!(first, second);

    let probe = HashEmbedder::vector_for("probe");
    let hits = index.query("kb", &probe, 100).await.unwrap();
    assert_eq!(hits.len(), first);
}

#[tokio::test]
async fn failed_embedding_leaves_the_index_untouched() {
    let index = Arc::new(InMemoryIndex::new());
    let service = service_with(Arc::new(FailingEmbedder), index.clone());

    let err = service
        .ingest("kb", &Document::new("doc", "some text"))
        .await
        .unwrap_err();
    match err {
        RetrievalError::Provider { kind, .. } => assert!(kind.is_retryable()),
        other => panic!("expected a provider error, got {other}"),
    }

    // The failure happened before any index write; the index was never
    // even created.
    let err = index.query("kb", &vec![0.0; DIM], 3).await.unwrap_err();
    assert!(matches!(err, RetrievalError::IndexNotFound { .. }));
}

#[tokio::test]
async fn blank_documents_are_a_no_op() {
    let index = Arc::new(InMemoryIndex::new());
    let service = service_with(Arc::new(HashEmbedder), index.clone());

    assert_eq!(service.ingest("kb", &Document::new("e", "")).await.unwrap(), 0);
    assert_eq!(
        service
            .ingest("kb", &Document::new("w", "  \n\n \t"))
            .await
            .unwrap(),
        0
    );

    let err = index.query("kb", &vec![0.0; DIM], 3).await.unwrap_err();
    assert!(matches!(err, RetrievalError::IndexNotFound { .. }));
}

#[tokio::test]
async fn invalid_retrieval_input_is_rejected_before_any_remote_call() {
    let embedder = Arc::new(CountingEmbedder::default());
    let service = service_with(embedder.clone(), Arc::new(InMemoryIndex::new()));

    let err = service.retrieve("kb", "   ").await.unwrap_err();
    assert!(matches!(err, RetrievalError::Input(_)));

    let err = service.retrieve_top_k("kb", "valid query", 0).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Input(_)));

    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn querying_a_missing_index_reports_index_not_found() {
    let service = service_with(Arc::new(HashEmbedder), Arc::new(InMemoryIndex::new()));

    let err = service
        .retrieve("nonexistent_kb", "naming conventions")
        .await
        .unwrap_err();
    match &err {
        RetrievalError::IndexNotFound { index } => assert_eq!(index, "nonexistent_kb"),
        other => panic!("expected IndexNotFound, got {other}"),
    }
    assert!(err.to_string().contains("Index not found"));
}

#[tokio::test]
async fn empty_index_yields_zero_hits_not_an_error() {
    let index = Arc::new(InMemoryIndex::new());
    index.create_index("kb", DIM).await.unwrap();
    let service = service_with(Arc::new(HashEmbedder), index);

    let hits = service.retrieve("kb", "anything").await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn japanese_naming_query_ranks_the_naming_passage_first() {
    let embedder = Arc::new(KeywordEmbedder::new(vec![
        "命名",
        "インデックス",
        "ツリー",
        "カンマ区切り",
    ]));
    let index = Arc::new(InMemoryIndex::new());
    let service = service_with(embedder, index);

    let kb = "db_design_antipattern_embeddings";
    let documents = [
        Document::new(
            "naming",
            "データベースの命名に関するアンチパターン。テーブルやカラムの命名規則が統一されて\
             いないと意味の解釈に時間がかかる。命名は省略せず一貫した規則に従うこと。",
        ),
        Document::new(
            "jaywalking",
            "カンマ区切りの値を一つのカラムに格納するアンチパターン。検索や結合が困難になり、\
             インデックスも効かない。交差テーブルで多対多の関連を表現すること。",
        ),
        Document::new(
            "naive_tree",
            "ナイーブツリーは階層構造を隣接リストだけで表現するアンチパターン。深い階層の取得に\
             再帰が必要になる。経路列挙や閉包テーブルを検討すること。",
        ),
        Document::new(
            "index_shotgun",
            "闇雲にインデックスを追加すると更新コストが増える。使われないインデックスは削除し、\
             複合インデックスの列順を検討すること。",
        ),
    ];
    for document in &documents {
        let count = service.ingest(kb, document).await.unwrap();
        assert_eq!(count, 1);
    }

    let hits = service
        .retrieve(kb, "命名に関するアンチパターンについて教えて")
        .await
        .unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].document_id, "naming");
    assert!(hits[0].text.contains("命名"));
    for window in hits.windows(2) {
        assert!(window[0].score >= window[1].score);
    }
}

#[tokio::test(start_paused = true)]
async fn slow_embedding_times_out_with_a_retryable_error() {
    let config = RetrievalConfig::builder()
        .default_top_k(3)
        .request_timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let service = RetrievalService::builder()
        .config(config)
        .embedder(Arc::new(SlowEmbedder))
        .index(Arc::new(InMemoryIndex::new()))
        .build()
        .unwrap();

    let err = service.retrieve("kb", "anything").await.unwrap_err();
    match err {
        RetrievalError::Provider { kind, .. } => {
            assert_eq!(kind, ProviderErrorKind::Timeout);
            assert!(kind.is_retryable());
        }
        other => panic!("expected a provider timeout, got {other}"),
    }
}

#[tokio::test]
async fn tool_returns_ranked_contents() {
    let index = Arc::new(InMemoryIndex::new());
    let service = Arc::new(service_with(Arc::new(HashEmbedder), index));
    service
        .ingest("kb", &Document::new("doc", "a short passage about naming"))
        .await
        .unwrap();

    let tool = KbSearchTool::new(service, "kb");
    assert_eq!(tool.name(), "kb_search");
    assert_eq!(
        tool.parameters_schema()["required"],
        json!(["query"])
    );

    let value = tool
        .execute(json!({ "query": "how should things be named?" }))
        .await
        .unwrap();
    let contents = value["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0]["id"], "doc_0");
    assert_eq!(contents[0]["document_id"], "doc");
    assert!(contents[0]["score"].is_number());
    assert!(contents[0]["text"].as_str().unwrap().contains("naming"));
}

#[tokio::test]
async fn tool_reports_zero_matches_with_a_sentinel() {
    let index = Arc::new(InMemoryIndex::new());
    index.create_index("kb", DIM).await.unwrap();
    let service = Arc::new(service_with(Arc::new(HashEmbedder), index));

    let tool = KbSearchTool::new(service, "kb");
    let value = tool.execute(json!({ "query": "anything" })).await.unwrap();
    assert_eq!(value["contents"], NO_RESULTS);
}

#[tokio::test]
async fn tool_rejects_malformed_arguments() {
    let service = Arc::new(service_with(
        Arc::new(HashEmbedder),
        Arc::new(InMemoryIndex::new()),
    ));
    let tool = KbSearchTool::new(service, "kb");

    let err = tool.execute(json!({})).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Input(_)));

    let err = tool.execute(json!({ "query": 42 })).await.unwrap_err();
    assert!(matches!(err, RetrievalError::Input(_)));

    let err = tool
        .execute(json!({ "query": "x", "top_k": "three" }))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Input(_)));

    let err = tool
        .execute(json!({ "query": "x", "index": 7 }))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Input(_)));
}

#[tokio::test]
async fn tool_honors_index_and_top_k_overrides() {
    let index = Arc::new(InMemoryIndex::new());
    let service = Arc::new(service_with(Arc::new(HashEmbedder), index));
    for i in 0..4 {
        service
            .ingest(
                "other_kb",
                &Document::new(format!("doc{i}"), format!("passage number {i}")),
            )
            .await
            .unwrap();
    }

    let tool = KbSearchTool::new(service, "default_kb");
    let value = tool
        .execute(json!({ "query": "passage", "index": "other_kb", "top_k": 2 }))
        .await
        .unwrap();
    let contents = value["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 2);

    // The default index does not exist; the override was the only reason
    // the previous call succeeded.
    let err = tool.execute(json!({ "query": "passage" })).await.unwrap_err();
    assert!(matches!(err, RetrievalError::IndexNotFound { .. }));
}

#[test]
fn config_validation_rejects_inconsistent_values() {
    let err = RetrievalConfig::builder()
        .store_connection("mysql://somewhere/db")
        .build()
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Config(_)));

    let err = RetrievalConfig::builder().default_top_k(0).build().unwrap_err();
    assert!(matches!(err, RetrievalError::Config(_)));

    let err = RetrievalConfig::builder()
        .chunk(ChunkConfig {
            max_chars: 10,
            overlap: 10,
            strategy: SplitStrategy::Characters,
        })
        .build()
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Config(_)));

    let config = RetrievalConfig::builder()
        .store_connection("postgresql://user@localhost:5432/kb")
        .build()
        .unwrap();
    assert_eq!(config.default_top_k, 3);
    assert_eq!(config.embedding_model, "text-embedding-3-small");
}
