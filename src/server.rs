use rmcp::{
    ServerHandler,
    tool,
    model::{ServerCapabilities, Implementation, ProtocolVersion, CallToolResult},
    handler::server::wrapper::Parameters,
    ErrorData as McpError,
};
use serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::errors::HotScoreError;
use crate::pipeline::{ScoreRequest, ScoringPipeline};
use crate::scoring::ScoredItem;

pub struct ScoringService {
    pipeline: Arc<ScoringPipeline>,
    start_time: Instant,
}

impl ScoringService {
    pub fn new(pipeline: Arc<ScoringPipeline>) -> Self {
        Self {
            pipeline,
            start_time: Instant::now(),
        }
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// Parameter structs

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct CommitPublishedParams {
    /// Text of the published item (title and summary); embedded with the configured provider
    pub text: Option<String>,
    /// Precomputed embedding of the published item; takes precedence over text
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SetTopicsParams {
    /// Topic keywords, each embedded as its own topic vector
    pub keywords: Option<Vec<String>>,
    /// Precomputed topic vectors; takes precedence over keywords
    pub embeddings: Option<Vec<Vec<f32>>>,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Flat JSON view of a scored item with signals rounded to 3 decimals.
pub fn scored_item_json(scored: &ScoredItem) -> serde_json::Value {
    let b = &scored.breakdown;
    json!({
        "title": scored.item.title,
        "summary": scored.item.summary,
        "url": scored.item.url,
        "published_at": scored.item.published_at.to_rfc3339(),
        "source": scored.item.source,
        "hot_score": round3(scored.hot_score),
        "freshness": round3(b.freshness),
        "trend": round3(b.trend),
        "trend_source": b.trend_source,
        "virality": round3(b.virality),
        "relevance": round3(b.relevance),
        "sentiment": round3(b.sentiment),
        "uniqueness": round3(b.uniqueness),
    })
}

// Helper: convert HotScoreError to CallToolResult with isError: true
fn error_to_result(err: HotScoreError) -> CallToolResult {
    match err {
        HotScoreError::Validation { message, field } => {
            let mut obj = json!({
                "isError": true,
                "error": message,
            });
            if let Some(f) = field {
                obj["field"] = json!(f);
            }
            CallToolResult::structured_error(obj)
        }
        HotScoreError::DimensionMismatch { left, right } => {
            CallToolResult::structured_error(json!({
                "isError": true,
                "error": format!("Embedding dimension mismatch ({} vs {})", left, right),
                "hint": "All embeddings (items, topics, history) must come from the same model"
            }))
        }
        other => {
            CallToolResult::structured_error(json!({
                "isError": true,
                "error": other.to_string()
            }))
        }
    }
}

// Tool implementations
#[rmcp::tool_router]
impl ScoringService {
    #[tool(description = "Score a batch of news items by hot score (freshness, trend, relevance, sentiment, uniqueness) and return the top N with per-signal breakdowns. Optional topic_keywords replace the active topic.")]
    async fn score_news(
        &self,
        Parameters(params): Parameters<ScoreRequest>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(
            tool = "score_news",
            items = params.news.len(),
            keywords = params.topic_keywords.len(),
            top_n = ?params.top_n,
            "Tool called"
        );

        if params.news.is_empty() {
            return Ok(CallToolResult::structured_error(json!({
                "isError": true,
                "error": "Field 'news' is required and cannot be empty",
                "field": "news"
            })));
        }

        match self.pipeline.score(params).await {
            Ok(ranked) => {
                let results: Vec<serde_json::Value> = ranked.iter().map(scored_item_json).collect();
                let count = results.len();
                Ok(CallToolResult::structured(json!({
                    "results": results,
                    "count": count,
                    "hint": "Call commit_published for items you publish so later duplicates score lower"
                })))
            }
            Err(e) => Ok(error_to_result(e)),
        }
    }

    #[tool(description = "Record a published item (by text or precomputed embedding) so that similar future items receive a lower uniqueness score.")]
    async fn commit_published(
        &self,
        Parameters(params): Parameters<CommitPublishedParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(
            tool = "commit_published",
            has_text = params.text.is_some(),
            has_embedding = params.embedding.is_some(),
            "Tool called"
        );

        match self
            .pipeline
            .commit_published(params.text.as_deref(), params.embedding)
            .await
        {
            Ok(history_len) => Ok(CallToolResult::structured(json!({
                "committed": true,
                "published_count": history_len,
            }))),
            Err(e) => Ok(error_to_result(e)),
        }
    }

    #[tool(description = "Replace the topic reference set used for relevance, from keywords or precomputed vectors. An empty set makes relevance neutral (0.5).")]
    async fn set_topics(
        &self,
        Parameters(params): Parameters<SetTopicsParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(
            tool = "set_topics",
            has_keywords = params.keywords.is_some(),
            has_embeddings = params.embeddings.is_some(),
            "Tool called"
        );

        let result = match (params.embeddings, params.keywords) {
            (Some(embeddings), _) => self.pipeline.set_topic_vectors(embeddings),
            (None, Some(keywords)) => self.pipeline.set_topic_keywords(&keywords).await,
            (None, None) => Err(HotScoreError::validation(
                "keywords",
                "Either 'keywords' or 'embeddings' must be provided",
            )),
        };

        match result {
            Ok(count) => Ok(CallToolResult::structured(json!({
                "topic_count": count,
            }))),
            Err(e) => Ok(error_to_result(e)),
        }
    }

    #[tool(description = "Report the size of the topic set, recent-item window and published history, plus the active signal weights.")]
    async fn engine_stats(
        &self,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "engine_stats", "Tool called");

        let engine = self.pipeline.engine();
        Ok(CallToolResult::structured(json!({
            "topic_count": engine.topic_count(),
            "recent_count": engine.recent_count(),
            "published_count": engine.published_count(),
            "weights": engine.config().weights,
            "embedding_model": self.pipeline.provider_name(),
        })))
    }

    #[tool(description = "Check server health and status")]
    async fn health_check(
        &self,
    ) -> Result<CallToolResult, McpError> {
        tracing::info!(tool = "health_check", "Tool called");

        let response = json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": self.uptime_seconds(),
            "embedding": if self.pipeline.provider_name().is_some() { "ready" } else { "disabled" },
        });

        Ok(CallToolResult::structured(response))
    }
}

// ServerHandler implementation
#[rmcp::tool_handler(router = Self::tool_router())]
impl ServerHandler for ScoringService {
    fn get_info(&self) -> rmcp::model::InitializeResult {
        rmcp::model::InitializeResult {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "hotscore".to_string(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some("Hot-score ranking server for news items".to_string()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "News ranking server. Tools: score_news, commit_published, set_topics, engine_stats, health_check.".to_string()
            ),
        }
    }
}
