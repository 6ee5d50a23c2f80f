//! Embedding boundary for semantic (vector) memory (spec.md §2, §3 "Memory
//! chunk"). `chainclaw-memory` depends on this trait rather than owning a
//! concrete embedding implementation, so the remote-LLM-embedding default
//! lives where all other outbound HTTP boundaries live.

use async_trait::async_trait;
use chainclaw_retry::{fetch_with_retry, BackoffPolicy};
use serde_json::{json, Value};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier recorded alongside each memory chunk (spec.md §3:
    /// `model` field) so a later provider swap doesn't silently mix
    /// incompatible vector spaces.
    fn model_id(&self) -> &str;
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Remote OpenAI-compatible embeddings endpoint (`/v1/embeddings`), the
/// default wired in by `chainclaw-engine` regardless of which
/// [`crate::LlmProvider`] is selected for chat — embeddings and chat are
/// independent boundaries, matching how the teacher keeps its embedding
/// client separate from its chat `Provider` trait.
pub struct OpenAiStyleEmbeddingProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiStyleEmbeddingProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".into(),
            client: reqwest::Client::builder().timeout(std::time::Duration::from_secs(30)).build().expect("reqwest client"),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiStyleEmbeddingProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({"model": self.model, "input": text});
        let resp = fetch_with_retry(
            || self.client.post(&url).bearer_auth(&self.api_key).json(&body).send(),
            3,
            BackoffPolicy::default(),
            None,
        )
        .await
        .map_err(|e| anyhow::anyhow!("embedding request failed: {e}"))?;

        let value: Value = resp.json().await?;
        let vector = value
            .get("data")
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
            .and_then(|row| row.get("embedding"))
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow::anyhow!("embedding response missing data[0].embedding"))?;

        Ok(vector.iter().filter_map(Value::as_f64).map(|f| f as f32).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_reports_its_configured_model_id() {
        let provider = OpenAiStyleEmbeddingProvider::new("key", "text-embedding-3-small");
        assert_eq!(provider.model_id(), "text-embedding-3-small");
    }
}
