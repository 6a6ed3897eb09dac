pub mod engine;
pub mod hot_score;
pub mod similarity;

// Re-export key types for convenience
pub use engine::{check_dimension, HotScoreEngine};
pub use hot_score::{HotScorer, ScoreBreakdown, ScoredItem, TrendSource};
pub use similarity::{cosine_similarity, max_similarity};

use crate::news::NewsItem;

/// The mutable inputs a scorer compares items against.
///
/// Scorers only ever read a context; `HotScoreEngine` owns the shared one and
/// serializes writes to it.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    /// Topic reference vectors; duplicates are harmless under max-similarity
    pub topics: Vec<Vec<f32>>,
    /// Previously seen items; only those inside the trend horizon are counted
    pub recent: Vec<NewsItem>,
    /// Embeddings of items already published, append-only
    pub published: Vec<Vec<f32>>,
}
