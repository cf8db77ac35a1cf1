//! # prism-core
//!
//! Foundation types shared by every Prism crate:
//!
//! - **Branded IDs**: `ConversationId`, `MessageId`, `InsightId` newtypes
//! - **Errors**: [`ChannelError`] and [`FetchError`], the two network-facing
//!   failure kinds that the dashboard and conversation crates both surface
//! - **HTTP**: [`ApiClient`], the JSON-over-HTTP helper both REST APIs use
//! - **Retry**: backoff configuration and delay math for reconnecting clients

#![deny(unsafe_code)]

pub mod errors;
pub mod http;
pub mod ids;
pub mod retry;

pub use errors::{ChannelError, FetchError};
pub use http::ApiClient;
pub use ids::{ConversationId, InsightId, MessageId};
pub use retry::RetryConfig;
