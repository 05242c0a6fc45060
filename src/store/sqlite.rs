//! SQLite-backed [`KnowledgeStore`] and [`ConversationStore`].
//!
//! Chunks carry their embedding inline as a little-endian f32 BLOB;
//! similarity is computed in Rust over fetched candidates. Replace-on-ingest
//! runs in one transaction so readers never observe a half-replaced chunk
//! set, and a busy-writer race retries once with latest-wins semantics.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::{Error, Result};
use crate::models::{ChatMessage, Chunk, Conversation, RetrievedMatch, Role, SourceKind, SourceMeta};

use super::{rank_matches, ConversationStore, KnowledgeStore, SearchScope};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn replace_chunks_once(
        &self,
        source_id: &str,
        kind: SourceKind,
        chunks: &[Chunk],
    ) -> std::result::Result<(), sqlx::Error> {
        let now = Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sources (id, kind, metadata_json, created_at, updated_at)
            VALUES (?, ?, '{}', ?, ?)
            ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at
            "#,
        )
        .bind(source_id)
        .bind(kind.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM chunks WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, source_id, source_kind, chunk_index, content, embedding, dims, metadata_json, hash)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.source_id)
            .bind(chunk.source_kind.as_str())
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(vec_to_blob(&chunk.embedding))
            .bind(chunk.embedding.len() as i64)
            .bind(chunk.metadata.to_string())
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn is_busy(err: &sqlx::Error) -> bool {
    let msg = err.to_string();
    msg.contains("locked") || msg.contains("busy")
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Chunk {
    let kind: String = row.get("source_kind");
    let metadata_json: String = row.get("metadata_json");
    let blob: Vec<u8> = row.get("embedding");

    Chunk {
        id: row.get("id"),
        source_id: row.get("source_id"),
        source_kind: SourceKind::parse(&kind).unwrap_or(SourceKind::Knowledge),
        chunk_index: row.get("chunk_index"),
        content: row.get("content"),
        embedding: blob_to_vec(&blob),
        metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({})),
        hash: row.get("hash"),
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn register_source(
        &self,
        source_id: &str,
        kind: SourceKind,
        meta: Option<&SourceMeta>,
    ) -> Result<()> {
        let now = Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO sources (id, kind, title, client_name, metadata_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, '{}', ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                title = excluded.title,
                client_name = excluded.client_name,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(source_id)
        .bind(kind.as_str())
        .bind(meta.map(|m| m.title.clone()))
        .bind(meta.map(|m| m.client_name.clone()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ingest(&self, source_id: &str, kind: SourceKind, chunks: &[Chunk]) -> Result<()> {
        match self.replace_chunks_once(source_id, kind, chunks).await {
            Ok(()) => Ok(()),
            Err(first) if is_busy(&first) => {
                // Latest-wins: one retry after a short pause covers the
                // concurrent re-ingest race.
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                self.replace_chunks_once(source_id, kind, chunks)
                    .await
                    .map_err(|retry| {
                        if is_busy(&retry) {
                            Error::WriteConflict {
                                source_id: source_id.to_string(),
                            }
                        } else {
                            Error::Store(retry)
                        }
                    })
            }
            Err(other) => Err(Error::Store(other)),
        }
    }

    async fn delete_source(&self, source_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sources WHERE id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        scope: &SearchScope,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievedMatch>> {
        let base = "SELECT id, source_id, source_kind, chunk_index, content, embedding, metadata_json, hash FROM chunks";

        let rows = match scope {
            SearchScope::Unified { source_id: None } => {
                sqlx::query(&format!("{base} WHERE source_kind != ?"))
                    .bind(SourceKind::Document.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            SearchScope::Unified {
                source_id: Some(id),
            } => {
                sqlx::query(&format!("{base} WHERE source_kind != ? OR source_id = ?"))
                    .bind(SourceKind::Document.as_str())
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            }
            SearchScope::SourceOnly(id) => {
                sqlx::query(&format!("{base} WHERE source_id = ?"))
                    .bind(id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let matches: Vec<RetrievedMatch> = rows
            .iter()
            .map(|row| {
                let chunk = row_to_chunk(row);
                let similarity = cosine_similarity(query, &chunk.embedding);
                RetrievedMatch { chunk, similarity }
            })
            .collect();

        Ok(rank_matches(matches, threshold, limit))
    }

    fn supports_unified_search(&self) -> bool {
        true
    }

    async fn source_meta(&self, source_id: &str) -> Result<Option<SourceMeta>> {
        let row = sqlx::query("SELECT title, client_name FROM sources WHERE id = ?")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| SourceMeta {
            title: r.get::<Option<String>, _>("title").unwrap_or_default(),
            client_name: r
                .get::<Option<String>, _>("client_name")
                .unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn create_conversation(
        &self,
        source_id: Option<&str>,
        session_id: &str,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO conversations (id, source_id, session_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(source_id)
        .bind(session_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, source_id, session_id, created_at FROM conversations WHERE id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Conversation {
            id: r.get("id"),
            source_id: r.get("source_id"),
            session_id: r.get("session_id"),
            created_at: r.get("created_at"),
        }))
    }

    async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
    ) -> Result<()> {
        let exists: bool =
            sqlx::query_scalar("SELECT COUNT(*) > 0 FROM conversations WHERE id = ?")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await?;

        if !exists {
            return Err(Error::ConversationNotFound(conversation_id.to_string()));
        }

        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(content)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, role, content, created_at
            FROM messages
            WHERE conversation_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let role: String = row.get("role");
                ChatMessage {
                    id: row.get("id"),
                    conversation_id: row.get("conversation_id"),
                    role: Role::parse(&role).unwrap_or(Role::Assistant),
                    content: row.get("content"),
                    created_at: row.get("created_at"),
                }
            })
            .collect())
    }
}
