/// Shared hot-score engine.
///
/// Holds one validated `ScoringConfig` and one `ScoringContext` behind a
/// read-write lock. Scoring calls take a read guard and score the whole batch
/// against that snapshot; topic replacement, recent-window updates and
/// published-history commits take the write guard (single writer).

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::config::ScoringConfig;
use crate::errors::HotScoreError;
use crate::news::NewsItem;

use super::hot_score::{HotScorer, ScoreBreakdown, ScoredItem};
use super::ScoringContext;

pub struct HotScoreEngine {
    config: ScoringConfig,
    context: RwLock<ScoringContext>,
}

impl HotScoreEngine {
    /// Create an engine with an empty context.
    ///
    /// # Errors
    /// Returns `InvalidWeights` or `Config` if the scoring config is malformed.
    pub fn new(config: ScoringConfig) -> Result<Self, HotScoreError> {
        Self::with_context(config, ScoringContext::default())
    }

    pub fn with_context(config: ScoringConfig, context: ScoringContext) -> Result<Self, HotScoreError> {
        config.validate()?;
        Ok(HotScoreEngine {
            config,
            context: RwLock::new(context),
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    // -- scoring (read side) ------------------------------------------------

    pub fn calculate(&self, item: &NewsItem) -> Result<ScoreBreakdown, HotScoreError> {
        self.calculate_at(item, Utc::now())
    }

    pub fn calculate_at(&self, item: &NewsItem, now: DateTime<Utc>) -> Result<ScoreBreakdown, HotScoreError> {
        let context = self.context.read();
        HotScorer::at(&self.config, &context, now).score(item)
    }

    pub fn rank(&self, items: Vec<NewsItem>, top_n: usize) -> Result<Vec<ScoredItem>, HotScoreError> {
        self.rank_at(items, top_n, Utc::now())
    }

    pub fn rank_at(
        &self,
        items: Vec<NewsItem>,
        top_n: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredItem>, HotScoreError> {
        let context = self.context.read();
        let batch_size = items.len();
        let ranked = HotScorer::at(&self.config, &context, now).rank(items, top_n)?;
        tracing::debug!(
            batch_size,
            top_n,
            returned = ranked.len(),
            topics = context.topics.len(),
            recent = context.recent.len(),
            published = context.published.len(),
            "Batch ranked"
        );
        Ok(ranked)
    }

    // -- mutation (write side) ----------------------------------------------

    /// Replace the topic reference set.
    ///
    /// Every topic must be non-empty and share the dimension already held by
    /// the published history and recent window. On error the old set is kept.
    pub fn set_topics(&self, topics: Vec<Vec<f32>>) -> Result<(), HotScoreError> {
        let mut context = self.context.write();
        let mut expected = established_dimension(&context, false);
        for topic in &topics {
            check_dimension(topic, expected)?;
            expected = Some(topic.len());
        }
        context.topics = topics;
        Ok(())
    }

    /// Drop every topic, making relevance neutral.
    pub fn clear_topics(&self) {
        self.context.write().topics.clear();
    }

    /// Replace the recent-item window.
    pub fn set_recent(&self, recent: Vec<NewsItem>) {
        self.context.write().recent = recent;
    }

    /// Append items to the recent window. Returns the new window size.
    pub fn record_recent<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = NewsItem>,
    {
        let mut context = self.context.write();
        context.recent.extend(items);
        context.recent.len()
    }

    /// Drop recent items older than the trend horizon as of `now`.
    ///
    /// Scoring already ignores such items; this only bounds memory.
    /// Returns the number of items removed.
    pub fn prune_recent(&self, now: DateTime<Utc>) -> usize {
        let horizon_ms = (self.config.trend_window_hours * 3_600_000.0) as i64;
        let Some(cutoff) = Duration::try_milliseconds(horizon_ms)
            .and_then(|horizon| now.checked_sub_signed(horizon))
        else {
            return 0;
        };
        let mut context = self.context.write();
        let before = context.recent.len();
        context.recent.retain(|item| item.published_at >= cutoff);
        before - context.recent.len()
    }

    /// Append the embedding of a published item to the history.
    ///
    /// No deduplication is performed. The history never shrinks, so a vector
    /// that is empty or whose dimension differs from the vectors already held
    /// is rejected here. Returns the new history length.
    pub fn commit_published(&self, embedding: Vec<f32>) -> Result<usize, HotScoreError> {
        let mut context = self.context.write();
        check_dimension(&embedding, established_dimension(&context, true))?;
        context.published.push(embedding);
        Ok(context.published.len())
    }

    /// Dimension of the vectors currently held, if any.
    pub fn dimension(&self) -> Option<usize> {
        established_dimension(&self.context.read(), true)
    }

    // -- introspection --------------------------------------------------------

    /// Clone of the current context.
    pub fn snapshot(&self) -> ScoringContext {
        self.context.read().clone()
    }

    pub fn topic_count(&self) -> usize {
        self.context.read().topics.len()
    }

    pub fn recent_count(&self) -> usize {
        self.context.read().recent.len()
    }

    pub fn published_count(&self) -> usize {
        self.context.read().published.len()
    }
}

/// Dimension shared by the published history, the topics (optionally) and
/// the embedded recent items.
fn established_dimension(context: &ScoringContext, include_topics: bool) -> Option<usize> {
    context
        .published
        .first()
        .map(Vec::len)
        .or_else(|| {
            include_topics
                .then(|| context.topics.first().map(Vec::len))
                .flatten()
        })
        .or_else(|| {
            context
                .recent
                .iter()
                .find_map(|item| item.embedding_vector())
                .map(<[f32]>::len)
        })
}

/// Reject an empty vector or one whose length differs from `expected`.
pub fn check_dimension(vector: &[f32], expected: Option<usize>) -> Result<(), HotScoreError> {
    if vector.is_empty() {
        return Err(HotScoreError::validation("embedding", "Embedding cannot be empty"));
    }
    match expected {
        Some(dim) if dim != vector.len() => Err(HotScoreError::DimensionMismatch {
            left: vector.len(),
            right: dim,
        }),
        _ => Ok(()),
    }
}
