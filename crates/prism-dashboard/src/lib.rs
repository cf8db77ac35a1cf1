//! # prism-dashboard
//!
//! Real-time dashboard state for the Prism client.
//!
//! - [`state`]: the [`DashboardState`] shape and its record types, normalized
//!   once on the way in
//! - [`event`]: push envelopes and their typed [`DashboardEvent`] decoding
//! - [`reconciler`]: per-event-type merge policies and the [`Reconciler`]
//!   that owns the state and publishes snapshots
//! - [`channel`]: the injectable [`PushChannel`] seam with a WebSocket
//!   implementation and an in-memory one
//! - [`snapshot`]: the REST baseline fetch with placeholder fallback
//! - [`session`]: one reconciler pumped by one channel, with explicit
//!   disconnect

#![deny(unsafe_code)]

pub mod channel;
pub mod event;
pub mod reconciler;
pub mod session;
pub mod snapshot;
pub mod state;

pub use channel::{ChannelStatus, MemoryChannel, MemoryChannelHandle, PushChannel, WsPushChannel};
pub use event::{DashboardEvent, EventDecodeError, EventKind, PushEnvelope};
pub use reconciler::{
    ApplyOutcome, DashboardSnapshot, MergePolicy, Reconciler, ReconcilerConfig, apply_event,
};
pub use session::{DashboardSession, PumpReport};
pub use snapshot::{Baseline, DashboardApi, HttpDashboardApi, load_baseline};
pub use state::{AiInsight, DashboardState, NewsItem, PerformanceSample};
