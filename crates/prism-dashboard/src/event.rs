//! Push envelopes and typed dashboard events.
//!
//! The channel delivers `{type, timestamp, data}` JSON frames
//! ([`PushEnvelope`]). [`DashboardEvent::decode`] turns the envelope into one
//! of five typed events. Unknown types decode to `Ok(None)` and are skipped;
//! a known type whose `data` has the wrong shape is an [`EventDecodeError`].
//! Fields missing from `data` are never errors, they decode to `None` and
//! the merge treats them as no-ops.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::state::{AiInsight, Metrics, NewsItem, PerformanceSample};

/// Discriminator value marking an analytics event as a partial update.
pub const INCREMENTAL: &str = "incremental";

/// Key carrying the analytics update discriminator.
pub const UPDATE_TYPE_KEY: &str = "update_type";

// ─────────────────────────────────────────────────────────────────────────────
// Wire envelope
// ─────────────────────────────────────────────────────────────────────────────

/// A raw push message as delivered by the channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushEnvelope {
    /// Event type name (`portfolio_update`, `ai_insight`, ...).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Server send time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// Event payload.
    #[serde(default)]
    pub data: Value,
}

impl PushEnvelope {
    /// Build an envelope with no timestamp.
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: None,
            data,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Event kinds
// ─────────────────────────────────────────────────────────────────────────────

/// The five event types the reconciler understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Owns `portfolioSummary`, `assetAllocation`, `strategyAllocation`.
    PortfolioUpdate,
    /// Owns `portfolioAnalytics`.
    PortfolioAnalytics,
    /// Owns `performanceHistory`, `marketIndicators`.
    PerformanceUpdate,
    /// Owns `newsFeed`.
    NewsUpdate,
    /// Owns `aiInsights`.
    AiInsight,
}

impl EventKind {
    /// Every kind, in wire-table order.
    pub const ALL: [Self; 5] = [
        Self::PortfolioUpdate,
        Self::PortfolioAnalytics,
        Self::PerformanceUpdate,
        Self::NewsUpdate,
        Self::AiInsight,
    ];

    /// Parse a wire type name.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "portfolio_update" => Some(Self::PortfolioUpdate),
            "portfolio_analytics" => Some(Self::PortfolioAnalytics),
            "performance_update" => Some(Self::PerformanceUpdate),
            "news_update" => Some(Self::NewsUpdate),
            "ai_insight" => Some(Self::AiInsight),
            _ => None,
        }
    }

    /// Wire type name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PortfolioUpdate => "portfolio_update",
            Self::PortfolioAnalytics => "portfolio_analytics",
            Self::PerformanceUpdate => "performance_update",
            Self::NewsUpdate => "news_update",
            Self::AiInsight => "ai_insight",
        }
    }

}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Typed payloads
// ─────────────────────────────────────────────────────────────────────────────

/// `portfolio_update` payload. `None` fields keep their prior value.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PortfolioUpdate {
    /// Replacement for `portfolioSummary`.
    #[serde(alias = "portfolioSummary")]
    pub portfolio_summary: Option<Metrics>,
    /// Replacement for `assetAllocation`.
    #[serde(alias = "assetAllocation")]
    pub asset_allocation: Option<Metrics>,
    /// Replacement for `strategyAllocation`.
    #[serde(alias = "strategyAllocation")]
    pub strategy_allocation: Option<Metrics>,
}

/// `portfolio_analytics` payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalyticsUpdate {
    /// Merge `fields` onto the existing object instead of replacing it.
    pub incremental: bool,
    /// Payload fields, without the `update_type` discriminator.
    pub fields: Metrics,
}

/// `performance_update` payload.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PerformanceUpdate {
    /// Replacement for `performanceHistory`.
    #[serde(alias = "performanceHistory")]
    pub performance_history: Option<Vec<PerformanceSample>>,
    /// Replacement for `marketIndicators`.
    #[serde(alias = "marketIndicators")]
    pub market_indicators: Option<Metrics>,
}

/// `news_update` payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewsUpdate {
    /// Replacement for `newsFeed`; `None` when the payload carried no list.
    pub items: Option<Vec<NewsItem>>,
}

/// `ai_insight` payload: the insights that decoded, in delivery order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InsightBatch {
    /// Valid insights.
    pub insights: Vec<AiInsight>,
    /// Entries dropped because they lacked an id or had the wrong shape.
    pub rejected: usize,
}

/// A decoded dashboard event.
#[derive(Clone, Debug, PartialEq)]
pub enum DashboardEvent {
    /// Sparse replace of the portfolio fields.
    PortfolioUpdate(PortfolioUpdate),
    /// Incremental merge or full replace of analytics.
    PortfolioAnalytics(AnalyticsUpdate),
    /// Wholesale replace of history and indicators.
    PerformanceUpdate(PerformanceUpdate),
    /// Wholesale replace of the news feed.
    NewsUpdate(NewsUpdate),
    /// Upsert of AI insights.
    AiInsight(InsightBatch),
}

/// A known event type whose payload could not be decoded.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid {kind} payload: {reason}")]
pub struct EventDecodeError {
    /// The event type that failed.
    pub kind: &'static str,
    /// Decoder message.
    pub reason: String,
}

impl DashboardEvent {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PortfolioUpdate(_) => EventKind::PortfolioUpdate,
            Self::PortfolioAnalytics(_) => EventKind::PortfolioAnalytics,
            Self::PerformanceUpdate(_) => EventKind::PerformanceUpdate,
            Self::NewsUpdate(_) => EventKind::NewsUpdate,
            Self::AiInsight(_) => EventKind::AiInsight,
        }
    }

    /// Decode an envelope. `Ok(None)` means the type is not one we handle.
    pub fn decode(envelope: &PushEnvelope) -> Result<Option<Self>, EventDecodeError> {
        let Some(kind) = EventKind::from_wire(&envelope.event_type) else {
            return Ok(None);
        };
        Self::decode_kind(kind, &envelope.data).map(Some)
    }

    /// Decode `data` as the payload of `kind`.
    pub fn decode_kind(kind: EventKind, data: &Value) -> Result<Self, EventDecodeError> {
        let fail = |reason: String| EventDecodeError {
            kind: kind.as_str(),
            reason,
        };
        if data.is_null() && kind == EventKind::PortfolioAnalytics {
            return Ok(Self::PortfolioAnalytics(AnalyticsUpdate {
                incremental: true,
                fields: Map::new(),
            }));
        }
        let empty = Value::Object(Map::new());
        let data = if data.is_null() { &empty } else { data };

        match kind {
            EventKind::PortfolioUpdate => PortfolioUpdate::deserialize(data)
                .map(Self::PortfolioUpdate)
                .map_err(|e| fail(e.to_string())),
            EventKind::PortfolioAnalytics => decode_analytics(data)
                .map(Self::PortfolioAnalytics)
                .ok_or_else(|| fail("expected an object".into())),
            EventKind::PerformanceUpdate => PerformanceUpdate::deserialize(data)
                .map(Self::PerformanceUpdate)
                .map_err(|e| fail(e.to_string())),
            EventKind::NewsUpdate => decode_news(data)
                .map(Self::NewsUpdate)
                .map_err(|e| fail(e.to_string())),
            EventKind::AiInsight => decode_insights(data)
                .map(Self::AiInsight)
                .ok_or_else(|| fail("expected an insight, a list, or {insights: [...]}".into())),
        }
    }
}

/// Anything but `update_type: "incremental"` is a full replace, including `{}`.
fn decode_analytics(data: &Value) -> Option<AnalyticsUpdate> {
    let mut fields = data.as_object()?.clone();
    let incremental = fields
        .remove(UPDATE_TYPE_KEY)
        .is_some_and(|v| v.as_str() == Some(INCREMENTAL));
    Some(AnalyticsUpdate {
        incremental,
        fields,
    })
}

/// Accepts a bare list or an object wrapping it as `news`, `newsFeed`,
/// `news_feed`, or `items`.
fn decode_news(data: &Value) -> Result<NewsUpdate, serde_json::Error> {
    let list = match data {
        Value::Array(_) => Some(data),
        Value::Object(map) => ["news", "newsFeed", "news_feed", "items"]
            .iter()
            .find_map(|key| map.get(*key).filter(|v| !v.is_null())),
        _ => Some(data),
    };
    let items = list.map(Vec::<NewsItem>::deserialize).transpose()?;
    Ok(NewsUpdate { items })
}

/// Accepts a single insight object, a bare list, or `{insights: [...]}`.
/// Entries are decoded one by one so a bad entry does not sink the batch.
fn decode_insights(data: &Value) -> Option<InsightBatch> {
    let entries: Vec<&Value> = match data {
        Value::Array(list) => list.iter().collect(),
        Value::Object(map) => match map.get("insights") {
            Some(Value::Array(list)) => list.iter().collect(),
            Some(_) => return None,
            None if map.is_empty() => Vec::new(),
            None => vec![data],
        },
        _ => return None,
    };

    let mut batch = InsightBatch::default();
    for entry in entries {
        match AiInsight::deserialize(entry) {
            Ok(insight) => batch.insights.push(insight),
            Err(e) => {
                warn!(error = %e, "dropping malformed ai insight");
                batch.rejected += 1;
            }
        }
    }
    Some(batch)
}
