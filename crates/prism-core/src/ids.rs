//! Branded ID newtypes.
//!
//! Conversations, messages, and insights are all identified by opaque
//! server-assigned strings. Wrapping each in its own newtype keeps a message
//! id from being passed where a conversation id is expected.
//!
//! Locally minted IDs (in-memory stores, tests) are UUID v7 so they sort by
//! creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a new time-ordered ID (UUID v7).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            /// Wrap an existing server-assigned value.
            #[must_use]
            pub fn from_raw(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

branded_id!(
    /// Identifies a conversation (a root chat or a branch).
    ConversationId
);
branded_id!(
    /// Identifies a single chat message.
    MessageId
);
branded_id!(
    /// Identifies an AI insight record on the dashboard.
    InsightId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = ConversationId::new();
        let b = ConversationId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn minted_ids_sort_by_creation() {
        let ids: Vec<MessageId> = (0..50).map(|_| MessageId::new()).collect();
        for w in ids.windows(2) {
            assert!(w[0] < w[1], "not monotonic: {} >= {}", w[0], w[1]);
        }
    }

    #[test]
    fn from_raw_preserves_value() {
        let id = InsightId::from_raw("ins-42");
        assert_eq!(id.as_str(), "ins-42");
        assert_eq!(id.to_string(), "ins-42");
    }

    #[test]
    fn serializes_transparently() {
        let id = ConversationId::from_raw("conv-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"conv-1\"");
        let back: ConversationId = serde_json::from_str("\"conv-1\"").unwrap();
        assert_eq!(back, id);
    }
}
