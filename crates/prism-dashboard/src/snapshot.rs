//! Initial REST snapshot of the dashboard.
//!
//! The session seeds its reconciler from [`load_baseline`]. A failed fetch
//! falls back to [`DashboardState::placeholder`] and keeps the error so the
//! presentation layer can show it next to the empty panels.

use std::time::Duration;

use async_trait::async_trait;
use prism_core::{ApiClient, FetchError};
use prism_settings::ApiSettings;
use tracing::{info, warn};

use crate::state::DashboardState;

/// Path of the snapshot endpoint.
pub const DASHBOARD_PATH: &str = "/api/dashboard";

/// Source of the full dashboard state.
#[async_trait]
pub trait DashboardApi: Send + Sync {
    /// Fetch the current dashboard state.
    async fn fetch_snapshot(&self) -> Result<DashboardState, FetchError>;
}

/// [`DashboardApi`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpDashboardApi {
    client: ApiClient,
}

impl HttpDashboardApi {
    /// Wrap an existing client.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Build a client from API settings.
    pub fn from_settings(settings: &ApiSettings) -> Result<Self, FetchError> {
        let client = ApiClient::new(
            settings.base_url.clone(),
            settings.token.clone(),
            Duration::from_millis(settings.timeout_ms),
        )?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn fetch_snapshot(&self) -> Result<DashboardState, FetchError> {
        self.client.get_json(DASHBOARD_PATH).await
    }
}

/// The state a session starts from.
#[derive(Clone, Debug, PartialEq)]
pub struct Baseline {
    /// Fetched state, or the placeholder.
    pub state: DashboardState,
    /// Why the fetch failed, when the placeholder was used.
    pub error: Option<FetchError>,
}

impl Baseline {
    /// Whether this is the placeholder fallback.
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

/// Fetch the baseline snapshot.
///
/// With `fallback` set, a fetch error yields the placeholder state and the
/// error is recorded on the returned [`Baseline`]. Without it, the error is
/// returned.
pub async fn load_baseline(api: &dyn DashboardApi, fallback: bool) -> Result<Baseline, FetchError> {
    match api.fetch_snapshot().await {
        Ok(state) => {
            info!(
                insights = state.ai_insights.len(),
                news = state.news_feed.len(),
                "loaded dashboard snapshot"
            );
            Ok(Baseline { state, error: None })
        }
        Err(err) if fallback => {
            warn!(error = %err, error_kind = err.error_kind(), "snapshot fetch failed, using placeholder");
            Ok(Baseline {
                state: DashboardState::placeholder(),
                error: Some(err),
            })
        }
        Err(err) => Err(err),
    }
}
