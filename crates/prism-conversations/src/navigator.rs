//! Navigating between conversations.
//!
//! Each [`Navigator::navigate`] call takes a new generation number. When a
//! result arrives after a newer navigation has started, it is dropped and
//! reported as [`NavigationOutcome::Superseded`]. The in-flight fetches are
//! not cancelled; their results are just ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use prism_core::{ConversationId, FetchError, MessageId};
use thiserror::Error;
use tracing::debug;

use crate::api::ConversationApi;
use crate::model::Conversation;
use crate::tree::{BranchTree, Crumb, TreeError};

/// Navigation failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    /// A fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The conversation tree could not be walked.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Everything the conversation screen shows.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationView {
    /// The conversation with its messages.
    pub conversation: Conversation,
    /// Ancestry, root first.
    pub breadcrumb: Vec<Crumb>,
    /// Branch count per message, in message order.
    pub branch_counts: Vec<(MessageId, usize)>,
}

impl ConversationView {
    /// Branch count for one message of this conversation.
    pub fn branch_count(&self, message_id: &MessageId) -> usize {
        self.branch_counts
            .iter()
            .find(|(id, _)| id == message_id)
            .map_or(0, |(_, count)| *count)
    }
}

/// Result of a navigation.
#[derive(Clone, Debug, PartialEq)]
pub enum NavigationOutcome {
    /// The view was loaded and is now current.
    Loaded(ConversationView),
    /// A newer navigation started before this one finished.
    Superseded {
        /// Generation of the discarded navigation.
        generation: u64,
    },
}

/// Loads conversation views, keeping only the latest.
pub struct Navigator {
    api: Arc<dyn ConversationApi>,
    generation: AtomicU64,
    current: Mutex<Option<ConversationView>>,
}

impl Navigator {
    /// Navigator over `api`.
    pub fn new(api: Arc<dyn ConversationApi>) -> Self {
        Self {
            api,
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// Generation of the most recently started navigation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The view of the latest completed navigation.
    pub fn current(&self) -> Option<ConversationView> {
        self.current.lock().clone()
    }

    /// Load `id` and make it current, unless a newer navigation wins.
    pub async fn navigate(&self, id: &ConversationId) -> Result<NavigationOutcome, NavigationError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.load(id).await;

        let mut current = self.current.lock();
        if self.generation() != generation {
            debug!(conversation_id = %id, generation, "discarding stale navigation");
            return Ok(NavigationOutcome::Superseded { generation });
        }
        let view = result?;
        *current = Some(view.clone());
        Ok(NavigationOutcome::Loaded(view))
    }

    async fn load(&self, id: &ConversationId) -> Result<ConversationView, NavigationError> {
        let (conversation, mut summaries) =
            tokio::try_join!(self.api.get_conversation(id), self.api.list_conversations())?;

        if !summaries.iter().any(|s| s.id == conversation.id) {
            summaries.push(conversation.summary());
        }
        let tree = BranchTree::from_summaries(summaries);
        let breadcrumb = tree.breadcrumb(&conversation.id)?;
        let branch_counts = tree.branch_counts(&conversation);

        Ok(ConversationView {
            conversation,
            breadcrumb,
            branch_counts,
        })
    }
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
