/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: hotscore.toml (in working directory)
/// 3. Environment variables: prefixed HOTSCORE_, nested keys split on `__`
///    (e.g., HOTSCORE_LOG_LEVEL=debug, HOTSCORE_SCORING__WEIGHTS__RELEVANCE=0.3)
///
/// The scoring section is validated as part of loading. A weight table that does
/// not sum to 1.0 is a startup failure, never a scoring-time one.

use std::collections::BTreeMap;

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};
use crate::errors::HotScoreError;

/// Allowed deviation of the weight sum from 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional file path for log output (in addition to stderr)
    #[serde(default)]
    pub log_file: Option<String>,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// Per-signal weights of the fused hot score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub freshness: f64,
    pub trend: f64,
    pub relevance: f64,
    pub sentiment: f64,
    pub uniqueness: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        SignalWeights {
            freshness: 0.25,
            trend: 0.25,
            relevance: 0.30,
            sentiment: 0.10,
            uniqueness: 0.10,
        }
    }
}

impl SignalWeights {
    pub fn sum(&self) -> f64 {
        self.freshness + self.trend + self.relevance + self.sentiment + self.uniqueness
    }

    fn as_named(&self) -> [(&'static str, f64); 5] {
        [
            ("freshness", self.freshness),
            ("trend", self.trend),
            ("relevance", self.relevance),
            ("sentiment", self.sentiment),
            ("uniqueness", self.uniqueness),
        ]
    }
}

/// Immutable scoring parameters held by an engine for its whole lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: SignalWeights,

    /// Engagement needed to saturate virality, keyed by source tag.
    pub virality_norms: BTreeMap<String, f64>,

    /// Norm used for sources missing from `virality_norms`.
    pub default_virality_norm: f64,

    /// Time constant of the freshness decay: exp(-hours / freshness_decay_hours).
    pub freshness_decay_hours: f64,

    /// Only recent items published within this many hours count toward trend.
    pub trend_window_hours: f64,

    /// Minimum cosine similarity for a recent item to count as "the same story".
    pub trend_similarity_threshold: f64,

    /// Number of similar recent items at which the trend signal saturates.
    pub trend_saturation_count: u32,

    /// Relevance returned when there is no embedding or no topic set.
    pub neutral_relevance: f64,

    /// Record every scored batch into the engine's recent window.
    pub track_recent: bool,

    /// top_n used when a request does not specify one.
    pub default_top_n: usize,
}

fn default_virality_norms() -> BTreeMap<String, f64> {
    [
        ("twitter", 1000.0),
        ("reddit", 500.0),
        ("newsapi", 100.0),
        ("rss", 50.0),
    ]
    .into_iter()
    .map(|(source, norm)| (source.to_string(), norm))
    .collect()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            weights: SignalWeights::default(),
            virality_norms: default_virality_norms(),
            default_virality_norm: 100.0,
            freshness_decay_hours: 12.0,
            trend_window_hours: 6.0,
            trend_similarity_threshold: 0.7,
            trend_saturation_count: 10,
            neutral_relevance: 0.5,
            track_recent: true,
            default_top_n: 3,
        }
    }
}

impl ScoringConfig {
    /// Check the invariants every scorer relies on.
    ///
    /// Weights must be finite, non-negative and sum to 1.0. Normalization
    /// constants and time constants must be positive so no signal divides by zero.
    pub fn validate(&self) -> Result<(), HotScoreError> {
        for (name, weight) in self.weights.as_named() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(HotScoreError::Config(format!(
                    "weight '{}' must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }

        let sum = self.weights.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(HotScoreError::InvalidWeights { sum });
        }

        for (source, norm) in &self.virality_norms {
            if !norm.is_finite() || *norm <= 0.0 {
                return Err(HotScoreError::Config(format!(
                    "virality norm for '{}' must be positive, got {}",
                    source, norm
                )));
            }
        }
        if !self.default_virality_norm.is_finite() || self.default_virality_norm <= 0.0 {
            return Err(HotScoreError::Config(format!(
                "default_virality_norm must be positive, got {}",
                self.default_virality_norm
            )));
        }

        if !self.freshness_decay_hours.is_finite() || self.freshness_decay_hours <= 0.0 {
            return Err(HotScoreError::Config(format!(
                "freshness_decay_hours must be positive, got {}",
                self.freshness_decay_hours
            )));
        }
        if !self.trend_window_hours.is_finite() || self.trend_window_hours < 0.0 {
            return Err(HotScoreError::Config(format!(
                "trend_window_hours must be non-negative, got {}",
                self.trend_window_hours
            )));
        }
        if !(-1.0..=1.0).contains(&self.trend_similarity_threshold) {
            return Err(HotScoreError::Config(format!(
                "trend_similarity_threshold must lie in [-1, 1], got {}",
                self.trend_similarity_threshold
            )));
        }
        if self.trend_saturation_count == 0 {
            return Err(HotScoreError::Config(
                "trend_saturation_count must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.neutral_relevance) {
            return Err(HotScoreError::Config(format!(
                "neutral_relevance must lie in [0, 1], got {}",
                self.neutral_relevance
            )));
        }

        Ok(())
    }

    /// Normalization constant for a source tag, falling back to the default norm.
    pub fn virality_norm(&self, source: &str) -> f64 {
        self.virality_norms
            .get(source)
            .copied()
            .unwrap_or(self.default_virality_norm)
    }
}

/// Embedding provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "local" (fastembed), "openai", or "none" (score with fallbacks only)
    pub provider: String,

    pub openai_api_key: Option<String>,

    pub openai_base_url: String,

    pub openai_model: String,

    /// Directory for cached fastembed model weights
    pub cache_dir: String,
}

fn default_cache_dir() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("hotscore").join("fastembed"))
        .and_then(|path| path.to_str().map(str::to_string))
        .unwrap_or_else(|| ".fastembed_cache".to_string())
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            provider: "local".to_string(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "text-embedding-3-small".to_string(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            log_file: None,
            scoring: ScoringConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: HOTSCORE_LOG_LEVEL=debug overrides log_level in hotscore.toml
    pub fn load() -> Result<Config, HotScoreError> {
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::file("hotscore.toml"))
                .merge(Env::prefixed("HOTSCORE_").split("__")),
        )
    }

    fn from_figment(figment: Figment) -> Result<Config, HotScoreError> {
        let config: Config = figment
            .extract()
            .map_err(|e| HotScoreError::Config(format!("Failed to load config: {}", e)))?;
        config.scoring.validate()?;
        Ok(config)
    }
}
