/// Request-level scoring: validation, embedding, ranking.
///
/// Turns a batch of raw news items plus optional topic keywords into a ranked list.
/// Embedding failures degrade the affected items to "no embedding" (and the
/// scorer's fallbacks) instead of failing the batch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingProvider;
use crate::errors::HotScoreError;
use crate::news::{parse_timestamp, NewsItem};
use crate::scoring::{check_dimension, HotScoreEngine, ScoredItem};

/// One incoming news item as supplied by a caller.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct NewsItemRequest {
    /// Headline (required)
    pub title: String,
    /// Summary or body text
    #[serde(default)]
    pub summary: String,
    /// Canonical URL
    #[serde(default)]
    pub url: String,
    /// Publication time, ISO-8601; values without a zone are read as UTC
    pub published_at: String,
    /// Source tag: "twitter", "reddit", "newsapi", "rss", ...
    pub source: String,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub retweets: u64,
    #[serde(default)]
    pub upvotes: u64,
    /// Polarity in [-1, 1] (default 0)
    #[serde(default)]
    pub sentiment: f64,
    /// Provocativeness in [0, 1] (default 0)
    #[serde(default)]
    pub controversy: f64,
    /// Precomputed embedding; when absent the configured provider is used
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// A batch to score.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ScoreRequest {
    /// Candidate items
    pub news: Vec<NewsItemRequest>,
    /// Keywords describing the topic of interest; replaces the active topic set when non-empty
    #[serde(default)]
    pub topic_keywords: Vec<String>,
    /// Number of items to return (default from config)
    pub top_n: Option<usize>,
}

impl NewsItemRequest {
    /// Convert to a `NewsItem`. An unparseable timestamp is replaced by `now`
    /// and an empty embedding counts as no embedding.
    fn into_item(self, now: DateTime<Utc>) -> Result<NewsItem, HotScoreError> {
        let published_at = match parse_timestamp(&self.published_at) {
            Ok(ts) => ts,
            Err(e) => {
                tracing::warn!(
                    title = %self.title,
                    published_at = %self.published_at,
                    error = %e,
                    "Unparseable published_at, treating item as published now"
                );
                now
            }
        };

        let item = NewsItem {
            title: self.title,
            summary: self.summary,
            url: self.url,
            source: self.source.trim().to_lowercase(),
            published_at,
            shares: self.shares,
            retweets: self.retweets,
            upvotes: self.upvotes,
            sentiment: self.sentiment,
            controversy: self.controversy,
            embedding: self.embedding.filter(|e| !e.is_empty()),
        };
        item.validate()?;
        Ok(item)
    }
}

/// Prefix a validation error's field with the item position in the batch.
fn locate(index: usize, err: HotScoreError) -> HotScoreError {
    match err {
        HotScoreError::Validation { message, field } => HotScoreError::Validation {
            message: format!("news[{}]: {}", index, message),
            field: Some(format!("news[{}].{}", index, field.unwrap_or_default())),
        },
        other => other,
    }
}

pub struct ScoringPipeline {
    engine: Arc<HotScoreEngine>,
    provider: Option<Arc<dyn EmbeddingProvider + Send + Sync>>,
}

impl ScoringPipeline {
    /// `provider` is `None` when embedding is disabled; every item is then
    /// scored with the no-embedding fallbacks.
    pub fn new(
        engine: Arc<HotScoreEngine>,
        provider: Option<Arc<dyn EmbeddingProvider + Send + Sync>>,
    ) -> Self {
        ScoringPipeline { engine, provider }
    }

    pub fn engine(&self) -> &Arc<HotScoreEngine> {
        &self.engine
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.model_name())
    }

    /// Validate, embed and rank a batch.
    pub async fn score(&self, request: ScoreRequest) -> Result<Vec<ScoredItem>, HotScoreError> {
        let now = Utc::now();
        let top_n = request.top_n.unwrap_or(self.engine.config().default_top_n);

        let mut items = request
            .news
            .into_iter()
            .enumerate()
            .map(|(i, raw)| raw.into_item(now).map_err(|e| locate(i, e)))
            .collect::<Result<Vec<_>, _>>()?;

        if !request.topic_keywords.is_empty() {
            self.apply_topic_keywords(&request.topic_keywords).await;
        }

        self.embed_missing(&mut items).await;
        self.check_batch_dimensions(&items)?;

        let recorded = if self.engine.config().track_recent {
            Some(items.clone())
        } else {
            None
        };

        let ranked = self.engine.rank_at(items, top_n, now)?;

        if let Some(batch) = recorded {
            self.engine.record_recent(batch);
            let pruned = self.engine.prune_recent(now);
            if pruned > 0 {
                tracing::debug!(pruned, "Dropped recent items outside the trend horizon");
            }
        }

        tracing::info!(
            returned = ranked.len(),
            top_score = ?ranked.first().map(|s| s.hot_score),
            "Batch scored"
        );
        Ok(ranked)
    }

    /// Replace the topic set with the embedding of the space-joined keywords.
    ///
    /// If the keywords cannot be embedded the topic set is cleared, so relevance
    /// falls back to neutral rather than to a previous request's topic.
    async fn apply_topic_keywords(&self, keywords: &[String]) {
        let text = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            return;
        }

        let Some(provider) = &self.provider else {
            tracing::warn!("Embedding disabled, topic keywords ignored");
            self.engine.clear_topics();
            return;
        };

        let applied = match provider.embed(&text).await {
            Ok(vector) => self.engine.set_topics(vec![vector]),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = applied {
            tracing::warn!(error = %e, "Failed to apply topic keywords, relevance will be neutral");
            self.engine.clear_topics();
        }
    }

    /// Dimension that every new vector must have: the one the engine already
    /// holds, else the provider's.
    fn expected_dimension(&self) -> Option<usize> {
        self.engine
            .dimension()
            .or_else(|| self.provider.as_ref().map(|p| p.dimension()))
    }

    /// Fail the request if its embeddings disagree with each other or with the
    /// engine, before anything is scored or recorded.
    fn check_batch_dimensions(&self, items: &[NewsItem]) -> Result<(), HotScoreError> {
        let mut expected = self.expected_dimension();
        for vector in items.iter().filter_map(NewsItem::embedding_vector) {
            check_dimension(vector, expected)?;
            expected = Some(vector.len());
        }
        Ok(())
    }

    /// Embed every item that arrived without an embedding, in one batch.
    async fn embed_missing(&self, items: &mut [NewsItem]) {
        let Some(provider) = &self.provider else {
            return;
        };

        let missing: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.embedding.is_none())
            .map(|(i, _)| i)
            .collect();
        if missing.is_empty() {
            return;
        }

        let texts: Vec<String> = missing.iter().map(|&i| items[i].embedding_text()).collect();
        match provider.embed_batch(&texts).await {
            Ok(vectors) if vectors.len() == missing.len() => {
                for (i, vector) in missing.into_iter().zip(vectors) {
                    items[i].embedding = Some(vector);
                }
            }
            Ok(vectors) => {
                tracing::warn!(
                    expected = missing.len(),
                    got = vectors.len(),
                    "Embedding provider returned a short batch, scoring without embeddings"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    count = missing.len(),
                    "Failed to embed items, scoring without embeddings"
                );
            }
        }
    }

    /// Embed the given keywords one by one and make them the topic set.
    ///
    /// Returns the number of topic vectors now active.
    pub async fn set_topic_keywords(&self, keywords: &[String]) -> Result<usize, HotScoreError> {
        let provider = self.require_provider("keywords")?;
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        let topics = provider.embed_batch(&keywords).await?;
        let count = topics.len();
        self.engine.set_topics(topics)?;
        Ok(count)
    }

    /// Replace the topic set with precomputed vectors.
    pub fn set_topic_vectors(&self, topics: Vec<Vec<f32>>) -> Result<usize, HotScoreError> {
        let expected = self.expected_dimension();
        for topic in &topics {
            check_dimension(topic, expected)?;
        }
        let count = topics.len();
        self.engine.set_topics(topics)?;
        Ok(count)
    }

    /// Record a published item in the uniqueness history.
    ///
    /// Uses `embedding` when given, otherwise embeds `text`.
    /// Returns the new history length.
    pub async fn commit_published(
        &self,
        text: Option<&str>,
        embedding: Option<Vec<f32>>,
    ) -> Result<usize, HotScoreError> {
        let vector = match (embedding, text) {
            (Some(vector), _) => vector,
            (None, Some(text)) if !text.trim().is_empty() => {
                self.require_provider("text")?.embed(text).await?
            }
            _ => {
                return Err(HotScoreError::validation(
                    "text",
                    "Either 'text' or 'embedding' must be provided",
                ))
            }
        };

        check_dimension(&vector, self.expected_dimension())?;
        self.engine.commit_published(vector)
    }

    fn require_provider(
        &self,
        field: &str,
    ) -> Result<&Arc<dyn EmbeddingProvider + Send + Sync>, HotScoreError> {
        self.provider.as_ref().ok_or_else(|| {
            HotScoreError::validation(
                field,
                "Embedding provider is disabled; supply precomputed embeddings instead",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::embedding::EmbeddingError;
    use async_trait::async_trait;

    /// Maps a text to a 3-d vector by keyword, so similarity is predictable.
    struct KeywordProvider;

    #[async_trait]
    impl EmbeddingProvider for KeywordProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let t = text.to_lowercase();
            Ok(if t.contains("bicycle") {
                vec![1.0, 0.0, 0.0]
            } else if t.contains("insurance") {
                vec![0.0, 1.0, 0.0]
            } else {
                vec![0.0, 0.0, 1.0]
            })
        }

        fn model_name(&self) -> &str {
            "keyword-test"
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Api { status: 503, message: "unavailable".to_string() })
        }

        fn model_name(&self) -> &str {
            "failing-test"
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    fn raw(title: &str, source: &str) -> NewsItemRequest {
        NewsItemRequest {
            title: title.to_string(),
            summary: String::new(),
            url: String::new(),
            published_at: Utc::now().to_rfc3339(),
            source: source.to_string(),
            shares: 0,
            retweets: 0,
            upvotes: 0,
            sentiment: 0.0,
            controversy: 0.0,
            embedding: None,
        }
    }

    fn pipeline(provider: Option<Arc<dyn EmbeddingProvider + Send + Sync>>) -> ScoringPipeline {
        let engine = Arc::new(HotScoreEngine::new(ScoringConfig::default()).unwrap());
        ScoringPipeline::new(engine, provider)
    }

    #[tokio::test]
    async fn test_topic_keywords_drive_relevance() {
        let pipeline = pipeline(Some(Arc::new(KeywordProvider)));
        let request = ScoreRequest {
            news: vec![raw("Weather today", "rss"), raw("Bicycle theft rises", "rss")],
            topic_keywords: vec!["bicycle".to_string()],
            top_n: Some(2),
        };

        let ranked = pipeline.score(request).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].item.title, "Bicycle theft rises");
        assert!((ranked[0].breakdown.relevance - 1.0).abs() < 1e-9);
        assert!(ranked[1].breakdown.relevance.abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_fallbacks() {
        let pipeline = pipeline(Some(Arc::new(FailingProvider)));
        let request = ScoreRequest {
            news: vec![raw("A", "rss")],
            topic_keywords: vec!["bicycle".to_string()],
            top_n: None,
        };

        let ranked = pipeline.score(request).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].item.embedding.is_none());
        assert_eq!(ranked[0].breakdown.relevance, 0.5);
        assert_eq!(ranked[0].breakdown.uniqueness, 1.0);
        assert_eq!(pipeline.engine().topic_count(), 0);
    }

    #[tokio::test]
    async fn test_source_lowercased_and_bad_timestamp_replaced() {
        let pipeline = pipeline(None);
        let mut item = raw("A", "  Twitter ");
        item.published_at = "not a date".to_string();
        item.retweets = 500;

        let ranked = pipeline
            .score(ScoreRequest { news: vec![item], topic_keywords: Vec::new(), top_n: Some(1) })
            .await
            .unwrap();
        assert_eq!(ranked[0].item.source, "twitter");
        assert_eq!(ranked[0].breakdown.virality, 0.5);
        assert!((ranked[0].breakdown.freshness - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_invalid_item_reports_position() {
        let pipeline = pipeline(None);
        let mut bad = raw("B", "rss");
        bad.sentiment = 3.0;

        let result = pipeline
            .score(ScoreRequest {
                news: vec![raw("A", "rss"), bad],
                topic_keywords: Vec::new(),
                top_n: None,
            })
            .await;
        match result {
            Err(HotScoreError::Validation { field, .. }) => {
                assert_eq!(field.as_deref(), Some("news[1].sentiment"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_scored_batch_feeds_trend_of_next_batch() {
        let pipeline = pipeline(Some(Arc::new(KeywordProvider)));
        let first = ScoreRequest {
            news: (0..4).map(|i| raw(&format!("Bicycle story {}", i), "rss")).collect(),
            topic_keywords: Vec::new(),
            top_n: Some(4),
        };
        pipeline.score(first).await.unwrap();
        assert_eq!(pipeline.engine().recent_count(), 4);

        let second = ScoreRequest {
            news: vec![raw("Bicycle story again", "rss")],
            topic_keywords: Vec::new(),
            top_n: Some(1),
        };
        let ranked = pipeline.score(second).await.unwrap();
        assert!((ranked[0].breakdown.trend - 0.4).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_commit_published_by_text_and_embedding() {
        let pipeline = pipeline(Some(Arc::new(KeywordProvider)));
        assert_eq!(pipeline.commit_published(Some("Bicycle news"), None).await.unwrap(), 1);
        assert_eq!(pipeline.commit_published(None, Some(vec![0.0, 1.0, 0.0])).await.unwrap(), 2);
        assert!(pipeline.commit_published(None, None).await.is_err());

        let ranked = pipeline
            .score(ScoreRequest {
                news: vec![raw("Bicycle news", "rss")],
                topic_keywords: Vec::new(),
                top_n: Some(1),
            })
            .await
            .unwrap();
        assert!(ranked[0].breakdown.uniqueness.abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_commit_text_without_provider_is_validation_error() {
        let pipeline = pipeline(None);
        assert!(matches!(
            pipeline.commit_published(Some("text"), None).await,
            Err(HotScoreError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_set_topic_keywords_embeds_each() {
        let pipeline = pipeline(Some(Arc::new(KeywordProvider)));
        let count = pipeline
            .set_topic_keywords(&["bicycle".to_string(), " ".to_string(), "insurance".to_string()])
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(pipeline.engine().topic_count(), 2);
    }

    #[tokio::test]
    async fn test_wrong_dimension_commit_rejected_without_breaking_scoring() {
        let pipeline = pipeline(None);
        assert_eq!(pipeline.commit_published(None, Some(vec![1.0, 0.0, 0.0])).await.unwrap(), 1);
        assert!(matches!(
            pipeline.commit_published(None, Some(vec![1.0, 0.0])).await,
            Err(HotScoreError::DimensionMismatch { left: 2, right: 3 })
        ));

        for _ in 0..2 {
            let mut item = raw("Fresh", "rss");
            item.embedding = Some(vec![0.0, 1.0, 0.0]);
            let ranked = pipeline
                .score(ScoreRequest { news: vec![item], topic_keywords: Vec::new(), top_n: None })
                .await
                .unwrap();
            assert_eq!(ranked[0].breakdown.uniqueness, 1.0);
        }
    }

    #[tokio::test]
    async fn test_commit_must_match_provider_dimension() {
        let pipeline = pipeline(Some(Arc::new(KeywordProvider)));
        assert!(matches!(
            pipeline.commit_published(None, Some(vec![1.0, 0.0])).await,
            Err(HotScoreError::DimensionMismatch { left: 2, right: 3 })
        ));
        assert_eq!(pipeline.engine().published_count(), 0);
        assert!(pipeline.set_topic_vectors(vec![vec![1.0, 0.0]]).is_err());
        assert_eq!(pipeline.set_topic_vectors(vec![vec![1.0, 0.0, 0.0]]).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_embedding_does_not_poison_recent_window() {
        let pipeline = pipeline(None);
        pipeline.engine().set_topics(vec![vec![1.0, 0.0]]).unwrap();

        let mut empty = raw("Empty", "rss");
        empty.embedding = Some(Vec::new());
        let ranked = pipeline
            .score(ScoreRequest { news: vec![empty], topic_keywords: Vec::new(), top_n: None })
            .await
            .unwrap();
        assert!(ranked[0].item.embedding.is_none());
        assert_eq!(ranked[0].breakdown.relevance, 0.5);

        let mut valid = raw("Valid", "rss");
        valid.embedding = Some(vec![1.0, 0.0]);
        let ranked = pipeline
            .score(ScoreRequest { news: vec![valid], topic_keywords: Vec::new(), top_n: None })
            .await
            .unwrap();
        assert!((ranked[0].breakdown.relevance - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_mixed_dimension_batch_fails_before_recording() {
        let pipeline = pipeline(None);
        let mut a = raw("A", "rss");
        a.embedding = Some(vec![1.0, 0.0]);
        let mut b = raw("B", "rss");
        b.embedding = Some(vec![1.0, 0.0, 0.0]);

        let result = pipeline
            .score(ScoreRequest { news: vec![a, b], topic_keywords: Vec::new(), top_n: None })
            .await;
        assert!(matches!(result, Err(HotScoreError::DimensionMismatch { .. })));
        assert_eq!(pipeline.engine().recent_count(), 0);
    }
}
