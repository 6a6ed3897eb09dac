/// Hot-score calculation for news ranking
///
/// The hot score is a weighted sum of five independent signals, each normally in [0, 1]:
///   1. Freshness  — exponential decay from publication time
///   2. Trend      — how many similar items appeared in the recent window
///                   (falls back to per-source engagement virality)
///   3. Relevance  — best cosine match against the topic reference set
///   4. Sentiment  — strength of opinion plus controversy
///   5. Uniqueness — distance from everything already published
///
/// All scoring is pure: no I/O, and the evaluation instant is read once per scorer
/// so a whole batch is scored against the same "now".

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ScoringConfig;
use crate::errors::HotScoreError;
use crate::news::NewsItem;

use super::similarity::{cosine_similarity, max_similarity};
use super::ScoringContext;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Where the trend value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendSource {
    /// Counted similar items in the recent window
    Frequency,
    /// No embedding or no recent window: engagement virality was used instead
    ViralityFallback,
}

/// Per-signal diagnostics for one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub freshness: f64,
    pub trend: f64,
    pub trend_source: TrendSource,
    /// Engagement virality; reported even when the trend signal did not use it
    pub virality: f64,
    pub relevance: f64,
    pub sentiment: f64,
    pub uniqueness: f64,
    /// Weighted sum of the signals above
    pub hot_score: f64,
}

/// An item together with its fused score and breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    pub item: NewsItem,
    pub hot_score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Scores items against one snapshot of topics, recent items and published history.
pub struct HotScorer<'a> {
    config: &'a ScoringConfig,
    context: &'a ScoringContext,
    now: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Pure scoring functions
// ---------------------------------------------------------------------------

/// Exponential freshness decay: exp(-hours / decay_hours).
///
/// 1.0 at zero elapsed time, approaching 0 for old items. Negative elapsed time
/// (a future-dated item) yields a value above 1.0; this is deliberately not clamped.
pub fn freshness_score(hours_elapsed: f64, decay_hours: f64) -> f64 {
    (-hours_elapsed / decay_hours).exp()
}

/// Engagement normalized by a per-source constant, clamped to 1.0.
pub fn virality_score(engagement: u64, norm: f64) -> f64 {
    (engagement as f64 / norm).min(1.0)
}

/// Similar-item count normalized by the saturation count, clamped to 1.0.
pub fn trend_score(similar_count: usize, saturation_count: u32) -> f64 {
    (similar_count as f64 / saturation_count as f64).min(1.0)
}

/// (|sentiment| + controversy) / 2: neutral, uncontroversial content scores low
/// whichever way it leans.
pub fn sentiment_score(sentiment: f64, controversy: f64) -> f64 {
    (sentiment.abs() + controversy) / 2.0
}

/// Fractional hours from `ts` to `now`; negative when `ts` is in the future.
fn hours_since(ts: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    now.signed_duration_since(ts).num_milliseconds() as f64 / 3_600_000.0
}

// ---------------------------------------------------------------------------
// HotScorer
// ---------------------------------------------------------------------------

impl<'a> HotScorer<'a> {
    /// Create a scorer evaluating at the current instant.
    ///
    /// `config` must already have passed `ScoringConfig::validate`.
    pub fn new(config: &'a ScoringConfig, context: &'a ScoringContext) -> Self {
        Self::at(config, context, Utc::now())
    }

    /// Create a scorer with a frozen evaluation instant.
    pub fn at(config: &'a ScoringConfig, context: &'a ScoringContext, now: DateTime<Utc>) -> Self {
        debug_assert!(config.validate().is_ok(), "scoring config must be validated before use");
        HotScorer { config, context, now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn calculate_freshness(&self, published_at: DateTime<Utc>) -> f64 {
        freshness_score(hours_since(published_at, self.now), self.config.freshness_decay_hours)
    }

    pub fn calculate_virality(&self, item: &NewsItem) -> f64 {
        virality_score(item.total_engagement(), self.config.virality_norm(&item.source))
    }

    /// Trend signal using the configured similarity threshold.
    pub fn calculate_trend_frequency(&self, item: &NewsItem) -> Result<f64, HotScoreError> {
        self.calculate_trend_frequency_with_threshold(item, self.config.trend_similarity_threshold)
    }

    pub fn calculate_trend_frequency_with_threshold(
        &self,
        item: &NewsItem,
        similarity_threshold: f64,
    ) -> Result<f64, HotScoreError> {
        self.trend_signal(item, similarity_threshold).map(|(score, _)| score)
    }

    fn trend_signal(
        &self,
        item: &NewsItem,
        similarity_threshold: f64,
    ) -> Result<(f64, TrendSource), HotScoreError> {
        let embedding = match item.embedding_vector() {
            Some(embedding) if !self.context.recent.is_empty() => embedding,
            _ => return Ok((self.calculate_virality(item), TrendSource::ViralityFallback)),
        };

        let mut similar_count = 0usize;
        for recent in &self.context.recent {
            if hours_since(recent.published_at, self.now) > self.config.trend_window_hours {
                continue;
            }
            let Some(recent_embedding) = recent.embedding_vector() else {
                continue;
            };
            if cosine_similarity(embedding, recent_embedding)? >= similarity_threshold {
                similar_count += 1;
            }
        }

        Ok((
            trend_score(similar_count, self.config.trend_saturation_count),
            TrendSource::Frequency,
        ))
    }

    /// Best-matching topic wins; neutral default without an embedding or topics.
    pub fn calculate_relevance(&self, item: &NewsItem) -> Result<f64, HotScoreError> {
        match item.embedding_vector() {
            Some(embedding) if !self.context.topics.is_empty() => {
                max_similarity(embedding, &self.context.topics)
            }
            _ => Ok(self.config.neutral_relevance),
        }
    }

    pub fn calculate_sentiment_score(&self, item: &NewsItem) -> f64 {
        sentiment_score(item.sentiment, item.controversy)
    }

    /// 1 - max similarity to published history; 1.0 without an embedding or history.
    pub fn calculate_uniqueness(&self, item: &NewsItem) -> Result<f64, HotScoreError> {
        match item.embedding_vector() {
            Some(embedding) if !self.context.published.is_empty() => {
                Ok(1.0 - max_similarity(embedding, &self.context.published)?)
            }
            _ => Ok(1.0),
        }
    }

    /// Compute every signal and the weighted hot score for one item.
    pub fn score(&self, item: &NewsItem) -> Result<ScoreBreakdown, HotScoreError> {
        let w = &self.config.weights;

        let hours = hours_since(item.published_at, self.now);
        if hours < 0.0 {
            tracing::debug!(
                title = %item.title,
                hours_ahead = -hours,
                "Future-dated item, freshness exceeds 1.0"
            );
        }

        let freshness = freshness_score(hours, self.config.freshness_decay_hours);
        let (trend, trend_source) =
            self.trend_signal(item, self.config.trend_similarity_threshold)?;
        let virality = self.calculate_virality(item);
        let relevance = self.calculate_relevance(item)?;
        let sentiment = self.calculate_sentiment_score(item);
        let uniqueness = self.calculate_uniqueness(item)?;

        let hot_score = w.freshness * freshness
            + w.trend * trend
            + w.relevance * relevance
            + w.sentiment * sentiment
            + w.uniqueness * uniqueness;

        tracing::debug!(
            title = %item.title,
            source = %item.source,
            freshness,
            trend,
            relevance,
            sentiment,
            uniqueness,
            hot_score,
            "Item scored"
        );

        Ok(ScoreBreakdown {
            freshness,
            trend,
            trend_source,
            virality,
            relevance,
            sentiment,
            uniqueness,
            hot_score,
        })
    }

    /// Fused hot score of one item.
    pub fn calculate(&self, item: &NewsItem) -> Result<f64, HotScoreError> {
        self.score(item).map(|breakdown| breakdown.hot_score)
    }

    /// Score every item and return the `top_n` best, highest first.
    ///
    /// The sort is stable: items with equal scores keep their input order.
    /// A dimension mismatch on any item fails the whole call.
    pub fn rank(&self, items: Vec<NewsItem>, top_n: usize) -> Result<Vec<ScoredItem>, HotScoreError> {
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let mut scored = items
            .into_iter()
            .map(|item| {
                let breakdown = self.score(&item)?;
                Ok(ScoredItem {
                    hot_score: breakdown.hot_score,
                    item,
                    breakdown,
                })
            })
            .collect::<Result<Vec<_>, HotScoreError>>()?;

        scored.sort_by(|a, b| b.hot_score.total_cmp(&a.hot_score));
        scored.truncate(top_n);
        Ok(scored)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
