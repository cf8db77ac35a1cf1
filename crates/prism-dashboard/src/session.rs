//! One dashboard session: a reconciler pumped by a push channel.
//!
//! The baseline snapshot is loaded before the pump starts, so every push
//! event lands on top of it. The pump is the reconciler's only writer.
//! [`DashboardSession::disconnect`] cancels it; after that no event is
//! applied and the channel is closed. Dropping the session cancels too.

use prism_core::FetchError;
use prism_settings::DashboardSettings;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{ChannelStatus, PushChannel};
use crate::reconciler::{ApplyOutcome, DashboardSnapshot, Reconciler, ReconcilerConfig};
use crate::snapshot::{Baseline, DashboardApi, load_baseline};

/// Counters from a finished pump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// Events merged into the state.
    pub applied: u64,
    /// Envelopes with an unknown type.
    pub ignored: u64,
    /// Envelopes of a known type with a malformed payload.
    pub rejected: u64,
    /// Errors reported by the channel (connect, protocol, decode).
    pub channel_errors: u64,
}

/// A running dashboard.
pub struct DashboardSession {
    snapshots: watch::Receiver<DashboardSnapshot>,
    status: watch::Receiver<ChannelStatus>,
    fetch_error: Option<FetchError>,
    cancel: CancellationToken,
    pump: Option<JoinHandle<PumpReport>>,
}

impl DashboardSession {
    /// Load the baseline from `api`, then start pumping `channel`.
    ///
    /// Fails only when the snapshot fetch fails and
    /// `fallback_on_fetch_error` is off.
    pub async fn start(
        api: &dyn DashboardApi,
        channel: Box<dyn PushChannel>,
        settings: &DashboardSettings,
    ) -> Result<Self, FetchError> {
        let baseline = load_baseline(api, settings.fallback_on_fetch_error).await?;
        Ok(Self::spawn(baseline, channel, ReconcilerConfig::from(settings)))
    }

    /// Start pumping `channel` on top of an already loaded baseline.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(baseline: Baseline, channel: Box<dyn PushChannel>, config: ReconcilerConfig) -> Self {
        let reconciler = Reconciler::new(baseline.state, config);
        let snapshots = reconciler.subscribe();
        let status = channel.status();
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(run_pump(reconciler, channel, cancel.clone()));
        Self {
            snapshots,
            status,
            fetch_error: baseline.error,
            cancel,
            pump: Some(pump),
        }
    }

    /// Subscribe to state snapshots.
    pub fn snapshots(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshots.clone()
    }

    /// The latest snapshot.
    pub fn current(&self) -> DashboardSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Subscribe to channel status.
    pub fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    /// Whether the push channel is currently not connected.
    pub fn is_offline(&self) -> bool {
        !self.status.borrow().is_connected()
    }

    /// The snapshot fetch error, when the session started from the placeholder.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        self.fetch_error.as_ref()
    }

    /// Whether the pump has stopped (channel finished or cancelled).
    pub fn is_finished(&self) -> bool {
        self.pump.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the pump, close the channel, and return the pump's counters.
    pub async fn disconnect(mut self) -> PumpReport {
        self.cancel.cancel();
        self.join_pump().await
    }

    /// Wait for the pump to stop on its own (the channel finished).
    pub async fn wait(mut self) -> PumpReport {
        self.join_pump().await
    }

    async fn join_pump(&mut self) -> PumpReport {
        let Some(pump) = self.pump.take() else {
            return PumpReport::default();
        };
        match pump.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "dashboard pump task failed");
                PumpReport::default()
            }
        }
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for DashboardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardSession")
            .field("status", &*self.status.borrow())
            .field("fetch_error", &self.fetch_error)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

async fn run_pump(
    mut reconciler: Reconciler,
    mut channel: Box<dyn PushChannel>,
    cancel: CancellationToken,
) -> PumpReport {
    let mut report = PumpReport::default();
    info!("dashboard pump started");

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("dashboard pump cancelled");
                break;
            }
            next = channel.next_envelope() => next,
        };

        match next {
            Some(Ok(envelope)) => match reconciler.apply_envelope(&envelope) {
                ApplyOutcome::Applied(_) => report.applied += 1,
                ApplyOutcome::Ignored { .. } => report.ignored += 1,
                ApplyOutcome::Rejected(_) => report.rejected += 1,
            },
            Some(Err(err)) => {
                report.channel_errors += 1;
                debug!(error = %err, error_kind = err.error_kind(), "push channel error");
            }
            None => {
                info!("push channel finished");
                break;
            }
        }
    }

    channel.close().await;
    info!(
        applied = report.applied,
        ignored = report.ignored,
        rejected = report.rejected,
        channel_errors = report.channel_errors,
        "dashboard pump stopped"
    );
    report
}
