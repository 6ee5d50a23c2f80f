//! Semantic (vector) memory (spec.md §3 "Memory chunk", §5).
//!
//! Retained up to [`VECTOR_MEMORY_CAP`] chunks per user; oldest are evicted
//! past the cap. Cosine similarity is computed in memory (spec.md §3), not
//! pushed down to SQLite, since the cap keeps the per-user working set
//! small.

use chainclaw_types::user::VECTOR_MEMORY_CAP;
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::error::StoreResult;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct MemoryChunk {
    pub id: i64,
    pub user_id: String,
    pub source: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl Store {
    pub async fn add_memory_chunk(
        &self,
        user_id: &str,
        source: &str,
        text: &str,
        embedding: &[f32],
        model: &str,
    ) -> StoreResult<i64> {
        let conn = self.conn().await;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO memory_chunks (user_id, source, text, embedding, model, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![user_id, source, text, encode_embedding(embedding), model, now.to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();

        // Evict oldest past the cap (spec.md §3, §5).
        conn.execute(
            "DELETE FROM memory_chunks WHERE user_id = ?1 AND id NOT IN (
                SELECT id FROM memory_chunks WHERE user_id = ?1
                ORDER BY id DESC LIMIT ?2
            )",
            params![user_id, VECTOR_MEMORY_CAP as i64],
        )?;
        Ok(id)
    }

    async fn all_chunks(&self, user_id: &str) -> StoreResult<Vec<MemoryChunk>> {
        let conn = self.conn().await;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, source, text, embedding, model, created_at
             FROM memory_chunks WHERE user_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                let created_at: String = row.get(6)?;
                let embedding: Vec<u8> = row.get(4)?;
                Ok(MemoryChunk {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    source: row.get(2)?,
                    text: row.get(3)?,
                    embedding: decode_embedding(&embedding),
                    model: row.get(5)?,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }

    /// Top-`k` chunks by cosine similarity to `query_embedding` (spec.md §3).
    pub async fn recall(&self, user_id: &str, query_embedding: &[f32], k: usize) -> StoreResult<Vec<(f32, MemoryChunk)>> {
        let mut scored: Vec<(f32, MemoryChunk)> = self
            .all_chunks(user_id)
            .await?
            .into_iter()
            .map(|chunk| (cosine_similarity(query_embedding, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    pub async fn memory_chunk_count(&self, user_id: &str) -> StoreResult<usize> {
        Ok(self.all_chunks(user_id).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn eviction_keeps_cap_and_most_recent() {
        let store = Store::open_in_memory().await.unwrap();
        for i in 0..(VECTOR_MEMORY_CAP + 10) {
            store
                .add_memory_chunk("u1", "chat", &format!("chunk-{i}"), &[1.0, 0.0], "test-model")
                .await
                .unwrap();
        }
        assert_eq!(store.memory_chunk_count("u1").await.unwrap(), VECTOR_MEMORY_CAP);
    }

    #[tokio::test]
    async fn recall_ranks_by_similarity() {
        let store = Store::open_in_memory().await.unwrap();
        store.add_memory_chunk("u1", "chat", "matching", &[1.0, 0.0], "m").await.unwrap();
        store.add_memory_chunk("u1", "chat", "orthogonal", &[0.0, 1.0], "m").await.unwrap();
        let results = store.recall("u1", &[1.0, 0.0], 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1.text, "matching");
    }
}
