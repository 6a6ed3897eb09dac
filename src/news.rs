/// News item model shared by the scorer, the request pipeline and the server.
///
/// Timestamps are always held in UTC. Inputs without zone information are
/// interpreted as UTC rather than rejected.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::HotScoreError;

/// A candidate item to be scored.
///
/// `embedding` is `None` when the provider could not (or was not asked to)
/// embed the item; every signal that needs it has a documented fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
    /// Source tag such as "twitter", "rss" or "newsapi"
    pub source: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub retweets: u64,
    #[serde(default)]
    pub upvotes: u64,
    /// Polarity in [-1, 1]; 0 means neutral or unscored
    #[serde(default)]
    pub sentiment: f64,
    /// Provocativeness in [0, 1]
    #[serde(default)]
    pub controversy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl NewsItem {
    pub fn new(
        title: impl Into<String>,
        source: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        NewsItem {
            title: title.into(),
            summary: String::new(),
            url: String::new(),
            source: source.into(),
            published_at,
            shares: 0,
            retweets: 0,
            upvotes: 0,
            sentiment: 0.0,
            controversy: 0.0,
            embedding: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// The embedding, treating an empty vector as absent.
    pub fn embedding_vector(&self) -> Option<&[f32]> {
        self.embedding.as_deref().filter(|e| !e.is_empty())
    }

    /// Shares + reposts + upvotes.
    pub fn total_engagement(&self) -> u64 {
        self.shares
            .saturating_add(self.retweets)
            .saturating_add(self.upvotes)
    }

    /// Text handed to the embedding provider for this item.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }

    /// Reject values the scorer would accept but that make no sense as input.
    pub fn validate(&self) -> Result<(), HotScoreError> {
        if self.title.trim().is_empty() {
            return Err(HotScoreError::validation(
                "title",
                "Field 'title' is required and cannot be empty",
            ));
        }
        if !self.sentiment.is_finite() || !(-1.0..=1.0).contains(&self.sentiment) {
            return Err(HotScoreError::validation(
                "sentiment",
                &format!("Field 'sentiment' must lie in [-1, 1], got {}", self.sentiment),
            ));
        }
        if !self.controversy.is_finite() || !(0.0..=1.0).contains(&self.controversy) {
            return Err(HotScoreError::validation(
                "controversy",
                &format!("Field 'controversy' must lie in [0, 1], got {}", self.controversy),
            ));
        }
        Ok(())
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 timestamp, treating zone-less values as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, HotScoreError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(HotScoreError::validation(
        "published_at",
        &format!(
            "Invalid datetime '{}': expected ISO-8601 (e.g. 2026-02-17T00:00:00Z)",
            s
        ),
    ))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}
