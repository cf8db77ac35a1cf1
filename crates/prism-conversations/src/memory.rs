//! In-memory [`ConversationApi`] for tests and offline demos.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use prism_core::{ConversationId, FetchError, MessageId};

use crate::api::{BranchCreated, BranchRequest, ConversationApi};
use crate::model::{ChatMessage, Conversation, ConversationSummary};

#[derive(Default)]
struct Store {
    conversations: Vec<Conversation>,
    branch_requests: usize,
    fail_next: Option<FetchError>,
}

impl Store {
    fn find(&self, id: &ConversationId) -> Result<&Conversation, FetchError> {
        self.conversations
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| FetchError::NotFound {
                resource: "conversation",
                id: id.to_string(),
            })
    }

    fn take_failure(&mut self) -> Result<(), FetchError> {
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Conversations held in memory. Branch creation copies the parent's prefix
/// under fresh message ids, as the server does.
#[derive(Default)]
pub struct InMemoryConversationApi {
    store: Mutex<Store>,
}

impl InMemoryConversationApi {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store seeded with `conversations`.
    pub fn with_conversations(conversations: impl IntoIterator<Item = Conversation>) -> Self {
        let api = Self::new();
        for conversation in conversations {
            api.insert(conversation);
        }
        api
    }

    /// Add or replace a conversation.
    pub fn insert(&self, conversation: Conversation) {
        let mut store = self.store.lock();
        match store.conversations.iter_mut().find(|c| c.id == conversation.id) {
            Some(existing) => *existing = conversation,
            None => store.conversations.push(conversation),
        }
    }

    /// Make the next branch creation fail with `error`.
    pub fn fail_next_branch(&self, error: FetchError) {
        self.store.lock().fail_next = Some(error);
    }

    /// Number of conversations stored.
    pub fn len(&self) -> usize {
        self.store.lock().conversations.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of branch creation requests received, including failed ones.
    pub fn branch_requests(&self) -> usize {
        self.store.lock().branch_requests
    }
}

#[async_trait]
impl ConversationApi for InMemoryConversationApi {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, FetchError> {
        Ok(self
            .store
            .lock()
            .conversations
            .iter()
            .map(Conversation::summary)
            .collect())
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation, FetchError> {
        self.store.lock().find(id).cloned()
    }

    async fn create_branch(
        &self,
        source: &ConversationId,
        request: &BranchRequest,
    ) -> Result<BranchCreated, FetchError> {
        let mut store = self.store.lock();
        store.branch_requests += 1;
        store.take_failure()?;

        let parent = store.find(source)?;
        let prefix = parent
            .prefix_through(&request.parent_message_id)
            .ok_or_else(|| {
                FetchError::from_status(
                    400,
                    format!(
                        "message {} is not in conversation {source}",
                        request.parent_message_id
                    ),
                )
            })?;

        let branch = Conversation {
            id: ConversationId::new(),
            title: request.title.clone(),
            parent_conversation_id: Some(source.clone()),
            parent_message_id: Some(request.parent_message_id.clone()),
            messages: prefix
                .iter()
                .map(|m| ChatMessage {
                    id: MessageId::new(),
                    ..m.clone()
                })
                .collect(),
            created_at: Some(Utc::now()),
        };
        let id = branch.id.clone();
        store.conversations.push(branch);
        Ok(BranchCreated {
            conversation_id: id,
        })
    }

    async fn list_branches(
        &self,
        conversation: &ConversationId,
        message_id: &MessageId,
    ) -> Result<Vec<ConversationSummary>, FetchError> {
        let store = self.store.lock();
        let _ = store.find(conversation)?;
        Ok(store
            .conversations
            .iter()
            .filter(|c| {
                c.parent_conversation_id.as_ref() == Some(conversation)
                    && c.parent_message_id.as_ref() == Some(message_id)
            })
            .map(Conversation::summary)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use assert_matches::assert_matches;

    fn seeded() -> InMemoryConversationApi {
        let mut root = Conversation::new("root", "Root");
        root.messages = vec![
            ChatMessage::new("m1", Role::User, "one"),
            ChatMessage::new("m2", Role::Assistant, "two"),
            ChatMessage::new("m3", Role::User, "three"),
        ];
        InMemoryConversationApi::with_conversations([root])
    }

    fn request(message: &str) -> BranchRequest {
        BranchRequest {
            parent_message_id: MessageId::from_raw(message),
            title: "Branch".into(),
            description: None,
        }
    }

    #[tokio::test]
    async fn branch_copies_prefix_with_fresh_ids() {
        let api = seeded();
        let root = ConversationId::from_raw("root");
        let created = api.create_branch(&root, &request("m2")).await.unwrap();

        let branch = api.get_conversation(&created.conversation_id).await.unwrap();
        assert_eq!(branch.parent_conversation_id, Some(root.clone()));
        let contents: Vec<_> = branch.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two"]);
        assert!(!branch.contains_message(&MessageId::from_raw("m1")));

        let listed = api
            .list_branches(&root, &MessageId::from_raw("m2"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(api.len(), 2);
    }

    #[tokio::test]
    async fn foreign_message_is_rejected() {
        let api = seeded();
        let result = api
            .create_branch(&ConversationId::from_raw("root"), &request("elsewhere"))
            .await;
        assert_matches!(result, Err(FetchError::Status { status: 400, .. }));
        assert_eq!(api.len(), 1);
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let api = seeded();
        api.fail_next_branch(FetchError::Network("reset".into()));
        let root = ConversationId::from_raw("root");
        assert!(api.create_branch(&root, &request("m1")).await.is_err());
        assert!(api.create_branch(&root, &request("m1")).await.is_ok());
        assert_eq!(api.branch_requests(), 2);
    }
}
