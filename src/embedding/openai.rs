/// OpenAI embedding provider
///
/// Calls the OpenAI Embeddings API using reqwest.
/// Supports text-embedding-3-small (1536 dimensions) by default.
/// Requires HOTSCORE_EMBEDDING__OPENAI_API_KEY env var or embedding.openai_api_key in config.

use async_trait::async_trait;

use super::{EmbeddingError, EmbeddingProvider};

/// Request body for OpenAI Embeddings API (string or array input)
#[derive(serde::Serialize)]
struct EmbedRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

/// Response from OpenAI Embeddings API
#[derive(serde::Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

/// Single embedding result from OpenAI
#[derive(serde::Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI-backed embedding provider.
///
/// Requires a valid API key, checked on construction.
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dim: usize,
}

fn model_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

impl OpenAIEmbeddingProvider {
    /// Create a new OpenAIEmbeddingProvider.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key (must be non-empty)
    /// * `base_url` - API root, e.g. "https://api.openai.com/v1"
    /// * `model` - embedding model name
    ///
    /// # Errors
    /// Returns `EmbeddingError::NotConfigured` if api_key is empty.
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self, EmbeddingError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::NotConfigured(
                "OpenAI API key is required when using the openai embedding provider. \
                 Set HOTSCORE_EMBEDDING__OPENAI_API_KEY or embedding.openai_api_key in hotscore.toml"
                    .to_string(),
            ));
        }

        Ok(OpenAIEmbeddingProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            dim: model_dimension(&model),
            model,
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbedRequest {
            input: texts,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Generation(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EmbeddingError::Api {
                status,
                message: body,
            });
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Generation(format!("Failed to parse API response: {}", e)))?;

        order_by_index(embed_response.data, texts.len())
    }
}

/// Put results back in input order and check that every input got one.
fn order_by_index(mut data: Vec<EmbedData>, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::Generation(format!(
            "API returned {} embeddings for {} inputs",
            data.len(),
            expected
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.request(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Generation("API returned empty embedding list".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
