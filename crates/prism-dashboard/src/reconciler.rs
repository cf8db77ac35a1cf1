//! Folding push events into dashboard state.
//!
//! Each [`EventKind`] has exactly one [`MergePolicy`], and each policy is a
//! plain function over the fields that kind owns. [`apply_event`] is the pure
//! dispatcher; [`Reconciler`] owns the current state, applies events in
//! delivery order, and publishes a [`DashboardSnapshot`] after every change.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prism_settings::DashboardSettings;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::event::{
    AnalyticsUpdate, DashboardEvent, EventDecodeError, EventKind, InsightBatch, NewsUpdate,
    PerformanceUpdate, PortfolioUpdate, PushEnvelope,
};
use crate::state::{AiInsight, DashboardState, Metrics};

/// Default cap on the number of retained AI insights.
pub const DEFAULT_MAX_INSIGHTS: usize = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Policies
// ─────────────────────────────────────────────────────────────────────────────

/// How an event kind changes the fields it owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergePolicy {
    /// Replace each present top-level field; absent fields keep their value.
    SparseReplace,
    /// Shallow merge when flagged incremental, otherwise replace the object.
    IncrementalOrReplace,
    /// Replace every present field wholesale.
    Wholesale,
    /// Upsert by id, new entries at the front, then truncate to the cap.
    UpsertCapped,
}

impl EventKind {
    /// The merge policy for this kind.
    pub fn merge_policy(self) -> MergePolicy {
        match self {
            Self::PortfolioUpdate => MergePolicy::SparseReplace,
            Self::PortfolioAnalytics => MergePolicy::IncrementalOrReplace,
            Self::PerformanceUpdate | Self::NewsUpdate => MergePolicy::Wholesale,
            Self::AiInsight => MergePolicy::UpsertCapped,
        }
    }
}

/// Reconciler tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Maximum number of AI insights kept after each `ai_insight` event.
    pub max_insights: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_insights: DEFAULT_MAX_INSIGHTS,
        }
    }
}

impl From<&DashboardSettings> for ReconcilerConfig {
    fn from(settings: &DashboardSettings) -> Self {
        Self {
            max_insights: settings.max_insights,
        }
    }
}

/// `portfolio_update`: sparse top-level replace.
pub fn merge_portfolio(state: &mut DashboardState, update: &PortfolioUpdate) {
    if let Some(summary) = &update.portfolio_summary {
        state.portfolio_summary.clone_from(summary);
    }
    if let Some(assets) = &update.asset_allocation {
        state.asset_allocation.clone_from(assets);
    }
    if let Some(strategies) = &update.strategy_allocation {
        state.strategy_allocation.clone_from(strategies);
    }
}

/// `portfolio_analytics`: shallow merge or full replace.
pub fn merge_analytics(current: &mut Metrics, update: &AnalyticsUpdate) {
    if update.incremental {
        for (key, value) in &update.fields {
            let _ = current.insert(key.clone(), value.clone());
        }
    } else {
        current.clone_from(&update.fields);
    }
}

/// `performance_update`: wholesale replace of history and indicators.
pub fn merge_performance(state: &mut DashboardState, update: &PerformanceUpdate) {
    if let Some(history) = &update.performance_history {
        state.performance_history.clone_from(history);
    }
    if let Some(indicators) = &update.market_indicators {
        state.market_indicators.clone_from(indicators);
    }
}

/// `news_update`: wholesale replace of the feed.
pub fn merge_news(state: &mut DashboardState, update: &NewsUpdate) {
    if let Some(items) = &update.items {
        state.news_feed.clone_from(items);
    }
}

/// `ai_insight`: upsert each incoming insight, then cap the list.
///
/// An insight whose id is already present is replaced at its current index.
/// A new id is inserted at index 0, so a batch `[x, y]` of new insights ends
/// up as `[y, x, ..]`. Truncation to `cap` happens once, after the whole
/// batch.
pub fn merge_insights(list: &mut Vec<AiInsight>, incoming: &[AiInsight], cap: usize) {
    for insight in incoming {
        match list.iter().position(|existing| existing.id == insight.id) {
            Some(index) => list[index] = insight.clone(),
            None => list.insert(0, insight.clone()),
        }
    }
    list.truncate(cap);
}

/// Apply one event to `state` and return the new state.
///
/// Only the fields owned by `event.kind()` are touched.
pub fn apply_event(
    mut state: DashboardState,
    event: &DashboardEvent,
    config: &ReconcilerConfig,
) -> DashboardState {
    match event {
        DashboardEvent::PortfolioUpdate(update) => merge_portfolio(&mut state, update),
        DashboardEvent::PortfolioAnalytics(update) => {
            merge_analytics(&mut state.portfolio_analytics, update);
        }
        DashboardEvent::PerformanceUpdate(update) => merge_performance(&mut state, update),
        DashboardEvent::NewsUpdate(update) => merge_news(&mut state, update),
        DashboardEvent::AiInsight(InsightBatch { insights, .. }) => {
            merge_insights(&mut state.ai_insights, insights, config.max_insights);
        }
    }
    state
}

// ─────────────────────────────────────────────────────────────────────────────
// Stateful reconciler
// ─────────────────────────────────────────────────────────────────────────────

/// What presentation consumers observe.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DashboardSnapshot {
    /// Current state.
    pub state: Arc<DashboardState>,
    /// Time of the last applied event; `None` until the first one.
    pub last_updated: Option<DateTime<Utc>>,
    /// Number of events applied so far.
    pub applied_events: u64,
}

/// Result of feeding one envelope to the reconciler.
#[derive(Clone, Debug, PartialEq)]
pub enum ApplyOutcome {
    /// The event was decoded and merged.
    Applied(EventKind),
    /// The event type is not handled; state unchanged.
    Ignored {
        /// The unrecognized type name.
        event_type: String,
    },
    /// The payload of a known type was malformed; state unchanged.
    Rejected(EventDecodeError),
}

/// Owns the dashboard state. Single writer; readers subscribe.
pub struct Reconciler {
    config: ReconcilerConfig,
    state: Arc<DashboardState>,
    last_updated: Option<DateTime<Utc>>,
    applied_events: u64,
    tx: watch::Sender<DashboardSnapshot>,
}

impl Reconciler {
    /// Create a reconciler seeded with `baseline`.
    pub fn new(baseline: DashboardState, config: ReconcilerConfig) -> Self {
        let state = Arc::new(baseline);
        let (tx, _rx) = watch::channel(DashboardSnapshot {
            state: Arc::clone(&state),
            last_updated: None,
            applied_events: 0,
        });
        Self {
            config,
            state,
            last_updated: None,
            applied_events: 0,
            tx,
        }
    }

    /// Subscribe to snapshots. The receiver starts at the current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.tx.subscribe()
    }

    /// Current state.
    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Time of the last applied event.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Number of events applied so far.
    pub fn applied_events(&self) -> u64 {
        self.applied_events
    }

    /// The active configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Apply a decoded event and publish the result.
    pub fn apply(&mut self, event: &DashboardEvent) {
        let next = apply_event(self.state.as_ref().clone(), event, &self.config);
        self.state = Arc::new(next);
        self.last_updated = Some(Utc::now());
        self.applied_events += 1;
        debug!(
            event_type = event.kind().as_str(),
            applied = self.applied_events,
            "applied dashboard event"
        );
        self.publish();
    }

    /// Decode and apply a raw envelope. Never fails; bad input is logged and
    /// leaves the state untouched.
    pub fn apply_envelope(&mut self, envelope: &PushEnvelope) -> ApplyOutcome {
        match DashboardEvent::decode(envelope) {
            Ok(Some(event)) => {
                if let DashboardEvent::AiInsight(batch) = &event {
                    if batch.rejected > 0 {
                        info!(
                            accepted = batch.insights.len(),
                            rejected = batch.rejected,
                            "ai insight batch had malformed entries"
                        );
                    }
                }
                self.apply(&event);
                ApplyOutcome::Applied(event.kind())
            }
            Ok(None) => {
                debug!(event_type = %envelope.event_type, "ignoring unknown event type");
                ApplyOutcome::Ignored {
                    event_type: envelope.event_type.clone(),
                }
            }
            Err(err) => {
                warn!(event_type = %envelope.event_type, error = %err, "rejecting malformed event");
                ApplyOutcome::Rejected(err)
            }
        }
    }

    /// The snapshot currently published.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.tx.borrow().clone()
    }

    fn publish(&self) {
        let _ = self.tx.send_replace(DashboardSnapshot {
            state: Arc::clone(&self.state),
            last_updated: self.last_updated,
            applied_events: self.applied_events,
        });
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("applied_events", &self.applied_events)
            .field("last_updated", &self.last_updated)
            .finish_non_exhaustive()
    }
}
