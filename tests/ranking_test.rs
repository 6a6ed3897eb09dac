use chrono::{DateTime, Duration, TimeZone, Utc};
use hotscore::config::ScoringConfig;
use hotscore::news::NewsItem;
use hotscore::scoring::{cosine_similarity, HotScoreEngine, ScoringContext, TrendSource};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
}

fn engine() -> HotScoreEngine {
    HotScoreEngine::new(ScoringConfig::default()).expect("default config is valid")
}

#[test]
fn test_similarity_properties() {
    let v = [0.2_f32, -0.4, 0.9];
    let neg: Vec<f32> = v.iter().map(|x| -x).collect();
    assert!((cosine_similarity(&v, &v).unwrap() - 1.0).abs() < 1e-9);
    assert!((cosine_similarity(&v, &neg).unwrap() + 1.0).abs() < 1e-9);
    assert_eq!(cosine_similarity(&v, &[0.0, 0.0, 0.0]).unwrap(), 0.0);
}

#[test]
fn test_neutral_item_at_now_is_reproducible() {
    let engine = engine();
    let item = NewsItem::new("Quiet news", "newsapi", now());

    let first = engine.calculate_at(&item, now()).unwrap();
    let second = engine.calculate_at(&item, now()).unwrap();
    assert_eq!(first, second);

    // freshness 1, trend 0, relevance 0.5, sentiment 0, uniqueness 1
    assert!((first.hot_score - 0.5).abs() < 1e-12, "hot score was {}", first.hot_score);
}

#[test]
fn test_rank_ten_returns_three_sorted() {
    let engine = engine();
    let items: Vec<NewsItem> = (0..10)
        .map(|i| NewsItem::new(format!("News {}", i), "newsapi", now() - Duration::hours(i)))
        .collect();

    let top = engine.rank_at(items, 3, now()).unwrap();
    assert_eq!(top.len(), 3);
    assert!(top.windows(2).all(|w| w[0].hot_score >= w[1].hot_score));
    assert_eq!(top[0].item.title, "News 0");
}

#[test]
fn test_rank_full_batch_and_empty() {
    let engine = engine();
    let items: Vec<NewsItem> = vec![
        NewsItem::new("b", "rss", now() - Duration::hours(5)),
        NewsItem::new("a", "rss", now()),
        NewsItem::new("c", "rss", now() - Duration::hours(5)),
    ];

    let all = engine.rank_at(items.clone(), 10, now()).unwrap();
    let titles: Vec<&str> = all.iter().map(|s| s.item.title.as_str()).collect();
    assert_eq!(titles, vec!["a", "b", "c"]);

    assert!(engine.rank_at(items, 0, now()).unwrap().is_empty());
}

#[test]
fn test_relevance_neutral_regardless_of_other_signals() {
    let engine = engine();
    let mut item = NewsItem::new("Loud", "twitter", now() - Duration::hours(30));
    item.retweets = 10_000;
    item.sentiment = -0.9;
    item.controversy = 0.8;

    assert_eq!(engine.calculate_at(&item, now()).unwrap().relevance, 0.5);

    engine.set_topics(vec![vec![1.0, 0.0]]).unwrap();
    assert_eq!(engine.calculate_at(&item, now()).unwrap().relevance, 0.5);
}

#[test]
fn test_commit_then_identical_candidate_is_not_unique() {
    let engine = engine();
    let embedding = vec![0.1_f32, 0.7, -0.2, 0.4];
    let candidate = NewsItem::new("Again", "rss", now()).with_embedding(embedding.clone());

    assert_eq!(engine.calculate_at(&candidate, now()).unwrap().uniqueness, 1.0);
    engine.commit_published(embedding).unwrap();
    assert!(engine.calculate_at(&candidate, now()).unwrap().uniqueness.abs() < 1e-9);
}

#[test]
fn test_trend_saturates_and_ignores_stale_items() {
    let mut recent: Vec<NewsItem> = (0..10)
        .map(|i| {
            NewsItem::new(format!("Echo {}", i), "rss", now() - Duration::minutes(20 * i))
                .with_embedding(vec![1.0, 0.1])
        })
        .collect();
    let context = ScoringContext { recent: recent.clone(), ..ScoringContext::default() };
    let engine = HotScoreEngine::with_context(ScoringConfig::default(), context).unwrap();

    let candidate = NewsItem::new("Breaking", "rss", now()).with_embedding(vec![1.0, 0.0]);
    let breakdown = engine.calculate_at(&candidate, now()).unwrap();
    assert_eq!(breakdown.trend_source, TrendSource::Frequency);
    assert_eq!(breakdown.trend, 1.0);

    // Age half of the window past the 6-hour horizon: only 5 remain.
    for item in recent.iter_mut().take(5) {
        item.published_at = now() - Duration::hours(7);
    }
    engine.set_recent(recent);
    let breakdown = engine.calculate_at(&candidate, now()).unwrap();
    assert!((breakdown.trend - 0.5).abs() < 1e-12, "trend was {}", breakdown.trend);
}

#[test]
fn test_future_dated_freshness_is_not_clamped() {
    let engine = engine();
    let item = NewsItem::new("Scheduled", "rss", now() + Duration::hours(3));
    let breakdown = engine.calculate_at(&item, now()).unwrap();
    assert!(breakdown.freshness > 1.0);
}
