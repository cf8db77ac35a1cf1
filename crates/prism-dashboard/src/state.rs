//! Dashboard state and its record types.
//!
//! Everything that enters the reconciler (the REST snapshot or a push event)
//! is deserialized into these types, and that is the only normalization
//! step: missing or `null` fields become empty defaults here, so the merge
//! code never has to check for absent collections. Record fields the client
//! does not model are kept in `extra` and passed through untouched.

use prism_core::InsightId;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A JSON object of named values (metrics, allocations, indicators).
pub type Metrics = Map<String, Value>;

/// In-memory dashboard state, owned by a single [`Reconciler`](crate::Reconciler).
///
/// Each field belongs to exactly one event type; see
/// [`EventKind`](crate::EventKind) for the ownership table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    /// Headline portfolio metrics (total value, day change, ...).
    #[serde(default, alias = "portfolio_summary", deserialize_with = "null_as_default")]
    pub portfolio_summary: Metrics,
    /// Allocation by asset class.
    #[serde(default, alias = "asset_allocation", deserialize_with = "null_as_default")]
    pub asset_allocation: Metrics,
    /// Allocation by strategy.
    #[serde(default, alias = "strategy_allocation", deserialize_with = "null_as_default")]
    pub strategy_allocation: Metrics,
    /// Risk and return analytics (sharpe, beta, var, ...).
    #[serde(default, alias = "portfolio_analytics", deserialize_with = "null_as_default")]
    pub portfolio_analytics: Metrics,
    /// Time-ordered performance samples.
    #[serde(default, alias = "performance_history", deserialize_with = "null_as_default")]
    pub performance_history: Vec<PerformanceSample>,
    /// Market indicators shown next to the performance chart.
    #[serde(default, alias = "market_indicators", deserialize_with = "null_as_default")]
    pub market_indicators: Metrics,
    /// News items, newest first as delivered.
    #[serde(default, alias = "news_feed", deserialize_with = "null_as_default")]
    pub news_feed: Vec<NewsItem>,
    /// AI insights, most recent first.
    #[serde(default, alias = "ai_insights", deserialize_with = "null_as_default")]
    pub ai_insights: Vec<AiInsight>,
}

impl DashboardState {
    /// State shown when the baseline snapshot could not be fetched.
    ///
    /// Empty but well-formed, so the presentation layer renders its empty
    /// placeholders instead of an error screen and push events can still
    /// fill it in.
    pub fn placeholder() -> Self {
        Self::default()
    }

    /// Whether every field is empty.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One point of the performance history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceSample {
    /// Sample time as sent by the server (ISO 8601 date or timestamp).
    #[serde(alias = "date")]
    pub timestamp: String,
    /// Portfolio value at `timestamp`.
    pub value: f64,
    /// Benchmark value at `timestamp`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<f64>,
    /// Fields not modeled above.
    #[serde(flatten)]
    pub extra: Metrics,
}

/// A news feed entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewsItem {
    /// Server id, when the feed provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Headline.
    pub title: String,
    /// Publisher name.
    pub source: String,
    /// Link to the article.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Publication time.
    #[serde(alias = "published_at", skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    /// Sentiment label (`positive`, `neutral`, `negative`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    /// Fields not modeled above.
    #[serde(flatten)]
    pub extra: Metrics,
}

/// An AI-generated insight. Identity is `id`; everything else may change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiInsight {
    /// Stable identity used for upserts.
    pub id: InsightId,
    /// Short title.
    #[serde(default)]
    pub title: String,
    /// Body text.
    #[serde(default, alias = "description")]
    pub content: String,
    /// Category (`risk`, `opportunity`, `rebalance`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Model confidence in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Generation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Fields not modeled above.
    #[serde(flatten)]
    pub extra: Metrics,
}

impl AiInsight {
    /// Minimal insight with just an id and a title.
    pub fn new(id: impl Into<InsightId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: String::new(),
            category: None,
            confidence: None,
            timestamp: None,
            extra: Metrics::new(),
        }
    }
}

/// Deserialize `null` as `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_with_missing_and_null_fields_normalizes() {
        let state: DashboardState = serde_json::from_value(json!({
            "portfolioSummary": {"totalValue": 1_000_000.0},
            "newsFeed": null,
        }))
        .unwrap();
        assert_eq!(state.portfolio_summary["totalValue"], 1_000_000.0);
        assert!(state.news_feed.is_empty());
        assert!(state.ai_insights.is_empty());
        assert!(state.portfolio_analytics.is_empty());
    }

    #[test]
    fn snake_case_snapshot_is_accepted() {
        let state: DashboardState = serde_json::from_value(json!({
            "portfolio_analytics": {"sharpe": 1.4},
            "ai_insights": [{"id": "i1", "title": "Rebalance"}],
        }))
        .unwrap();
        assert_eq!(state.portfolio_analytics["sharpe"], 1.4);
        assert_eq!(state.ai_insights[0].id.as_str(), "i1");
    }

    #[test]
    fn records_keep_unmodeled_fields() {
        let item: NewsItem = serde_json::from_value(json!({
            "title": "Rates hold",
            "source": "Wire",
            "tickers": ["SPY"],
        }))
        .unwrap();
        assert_eq!(item.extra["tickers"], json!(["SPY"]));
        let back = serde_json::to_value(&item).unwrap();
        assert_eq!(back["tickers"], json!(["SPY"]));
    }

    #[test]
    fn performance_sample_accepts_date_alias() {
        let sample: PerformanceSample =
            serde_json::from_value(json!({"date": "2024-01-02", "value": 101.5})).unwrap();
        assert_eq!(sample.timestamp, "2024-01-02");
        assert!(sample.benchmark.is_none());
    }

    #[test]
    fn insight_requires_id() {
        let result: Result<AiInsight, _> = serde_json::from_value(json!({"title": "no id"}));
        assert!(result.is_err());
    }

    #[test]
    fn placeholder_is_empty() {
        assert!(DashboardState::placeholder().is_empty());
        let mut state = DashboardState::placeholder();
        state.ai_insights.push(AiInsight::new("a", "A"));
        assert!(!state.is_empty());
    }
}
