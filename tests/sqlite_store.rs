//! SQLite backend tests against a real on-disk database.

use std::sync::Arc;

use tempfile::TempDir;

use docchat::config::{ChunkingConfig, Config, DbConfig};
use docchat::db;
use docchat::migrate;
use docchat::models::{Chunk, Role, SourceKind, SourceMeta};
use docchat::store::sqlite::SqliteStore;
use docchat::store::{ConversationStore, KnowledgeStore, SearchScope};

async fn open_store() -> (TempDir, Arc<SqliteStore>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config {
        db: DbConfig {
            path: dir.path().join("docchat.db"),
        },
        chunking: ChunkingConfig::default(),
        retrieval: Default::default(),
        embedding: Default::default(),
        completion: Default::default(),
    };
    let pool = db::connect(&config).await.expect("connect");
    migrate::run_migrations(&pool).await.expect("migrate");
    (dir, Arc::new(SqliteStore::new(pool)))
}

fn chunk(source_id: &str, kind: SourceKind, index: i64, content: &str, embedding: Vec<f32>) -> Chunk {
    Chunk::new(
        source_id,
        kind,
        index,
        content.to_string(),
        embedding,
        serde_json::json!({"position": index}),
    )
}

async fn chunk_rows(store: &SqliteStore, source_id: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE source_id = ?")
        .bind(source_id)
        .fetch_one(store.pool())
        .await
        .expect("count")
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let (_dir, store) = open_store().await;
    migrate::run_migrations(store.pool()).await.expect("rerun");
}

#[tokio::test]
async fn reingest_replaces_the_chunk_set() {
    let (_dir, store) = open_store().await;

    let first = vec![
        chunk("doc-1", SourceKind::Document, 0, "alpha", vec![1.0, 0.0]),
        chunk("doc-1", SourceKind::Document, 1, "beta", vec![0.0, 1.0]),
        chunk("doc-1", SourceKind::Document, 2, "gamma", vec![1.0, 1.0]),
    ];
    store
        .ingest("doc-1", SourceKind::Document, &first)
        .await
        .unwrap();
    assert_eq!(chunk_rows(&store, "doc-1").await, 3);

    let second = vec![chunk(
        "doc-1",
        SourceKind::Document,
        0,
        "replacement",
        vec![1.0, 0.0],
    )];
    store
        .ingest("doc-1", SourceKind::Document, &second)
        .await
        .unwrap();
    assert_eq!(chunk_rows(&store, "doc-1").await, 1);

    let matches = store
        .search(
            &[1.0, 0.0],
            &SearchScope::SourceOnly("doc-1".into()),
            0.5,
            10,
        )
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].chunk.content, "replacement");
}

#[tokio::test]
async fn delete_source_removes_its_chunks() {
    let (_dir, store) = open_store().await;

    store
        .ingest(
            "doc-1",
            SourceKind::Document,
            &[chunk("doc-1", SourceKind::Document, 0, "alpha", vec![1.0, 0.0])],
        )
        .await
        .unwrap();
    store
        .ingest(
            "doc-2",
            SourceKind::Document,
            &[chunk("doc-2", SourceKind::Document, 0, "beta", vec![1.0, 0.0])],
        )
        .await
        .unwrap();

    store.delete_source("doc-1").await.unwrap();

    assert_eq!(chunk_rows(&store, "doc-1").await, 0);
    assert_eq!(chunk_rows(&store, "doc-2").await, 1);
    assert!(store.source_meta("doc-1").await.unwrap().is_none());
}

#[tokio::test]
async fn search_orders_and_thresholds() {
    let (_dir, store) = open_store().await;

    store
        .ingest(
            "doc-1",
            SourceKind::Document,
            &[
                chunk("doc-1", SourceKind::Document, 0, "close", vec![0.9, 0.1]),
                chunk("doc-1", SourceKind::Document, 1, "closest", vec![1.0, 0.0]),
                chunk("doc-1", SourceKind::Document, 2, "far", vec![0.0, 1.0]),
            ],
        )
        .await
        .unwrap();

    let matches = store
        .search(
            &[1.0, 0.0],
            &SearchScope::SourceOnly("doc-1".into()),
            0.7,
            10,
        )
        .await
        .unwrap();

    let contents: Vec<&str> = matches.iter().map(|m| m.chunk.content.as_str()).collect();
    assert_eq!(contents, vec!["closest", "close"]);
    assert!(matches[0].similarity > matches[1].similarity);
}

#[tokio::test]
async fn unified_scope_spans_knowledge_and_one_document() {
    let (_dir, store) = open_store().await;

    store
        .ingest(
            "doc-1",
            SourceKind::Document,
            &[chunk("doc-1", SourceKind::Document, 0, "doc one", vec![1.0, 0.0])],
        )
        .await
        .unwrap();
    store
        .ingest(
            "doc-2",
            SourceKind::Document,
            &[chunk("doc-2", SourceKind::Document, 0, "doc two", vec![1.0, 0.0])],
        )
        .await
        .unwrap();
    store
        .ingest(
            "kb-1",
            SourceKind::Faq,
            &[chunk("kb-1", SourceKind::Faq, 0, "faq entry", vec![1.0, 0.0])],
        )
        .await
        .unwrap();

    let matches = store
        .search(
            &[1.0, 0.0],
            &SearchScope::Unified {
                source_id: Some("doc-1".into()),
            },
            0.7,
            10,
        )
        .await
        .unwrap();

    let sources: Vec<&str> = matches.iter().map(|m| m.chunk.source_id.as_str()).collect();
    assert!(sources.contains(&"doc-1"));
    assert!(sources.contains(&"kb-1"));
    assert!(!sources.contains(&"doc-2"), "other documents must stay out of scope");

    // With no document in scope only curated knowledge matches.
    let curated = store
        .search(
            &[1.0, 0.0],
            &SearchScope::Unified { source_id: None },
            0.7,
            10,
        )
        .await
        .unwrap();
    assert_eq!(curated.len(), 1);
    assert_eq!(curated[0].chunk.source_id, "kb-1");
}

#[tokio::test]
async fn embeddings_survive_the_blob_roundtrip() {
    let (_dir, store) = open_store().await;

    let embedding = vec![0.25f32, -1.5, 3.0625];
    store
        .ingest(
            "doc-1",
            SourceKind::Document,
            &[chunk("doc-1", SourceKind::Document, 0, "alpha", embedding.clone())],
        )
        .await
        .unwrap();

    let matches = store
        .search(
            &embedding,
            &SearchScope::SourceOnly("doc-1".into()),
            0.99,
            10,
        )
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].chunk.embedding, embedding);
}

#[tokio::test]
async fn source_meta_round_trips() {
    let (_dir, store) = open_store().await;

    let meta = SourceMeta {
        title: "Q3 Proposal".into(),
        client_name: "Acme".into(),
    };
    store
        .register_source("doc-1", SourceKind::Document, Some(&meta))
        .await
        .unwrap();

    let loaded = store.source_meta("doc-1").await.unwrap().expect("meta");
    assert_eq!(loaded.title, "Q3 Proposal");
    assert_eq!(loaded.client_name, "Acme");

    assert!(store.source_meta("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn transcripts_persist_in_append_order() {
    let (_dir, store) = open_store().await;

    let id = store
        .create_conversation(Some("doc-1"), "session-1")
        .await
        .unwrap();
    store.append_message(&id, Role::User, "hi").await.unwrap();
    store
        .append_message(&id, Role::Assistant, "hello")
        .await
        .unwrap();
    store.append_message(&id, Role::User, "more").await.unwrap();

    let messages = store.messages(&id).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hi", "hello", "more"]);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn conversation_records_round_trip() {
    let (_dir, store) = open_store().await;

    let id = store
        .create_conversation(Some("doc-1"), "session-9")
        .await
        .unwrap();

    let conv = store.conversation(&id).await.unwrap().expect("row");
    assert_eq!(conv.id, id);
    assert_eq!(conv.source_id.as_deref(), Some("doc-1"));
    assert_eq!(conv.session_id, "session-9");

    assert!(store.conversation("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn appending_to_an_unknown_conversation_fails() {
    let (_dir, store) = open_store().await;
    let err = store
        .append_message("missing", Role::User, "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, docchat::Error::ConversationNotFound(_)));
}
