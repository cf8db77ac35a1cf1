//! Creating branches.
//!
//! [`BranchService::create_branch`] validates locally (non-empty title, fork
//! message belongs to the source) before any write reaches the server. A
//! failed creation leaves nothing behind on the client. [`BranchDraft`]
//! models the pending branch form: it stays open with the error text until a
//! submit succeeds.

use std::sync::Arc;

use prism_core::{ConversationId, FetchError, MessageId};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{BranchRequest, ConversationApi};

/// Branch creation failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BranchCreationError {
    /// Title was empty or whitespace.
    #[error("branch title must not be empty")]
    EmptyTitle,

    /// The fork message is not part of the source conversation.
    #[error("message {message_id} is not part of conversation {conversation_id}")]
    MessageNotInConversation {
        /// Source conversation.
        conversation_id: ConversationId,
        /// Requested fork message.
        message_id: MessageId,
    },

    /// The source conversation does not exist.
    #[error("conversation {0} not found")]
    SourceNotFound(ConversationId),

    /// The request never got a response.
    #[error("network error: {0}")]
    Network(String),

    /// The server refused the request.
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The server's response could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl BranchCreationError {
    /// Whether submitting the same request again could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Status { .. } | Self::Decode(_)
        )
    }
}

impl From<FetchError> for BranchCreationError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(msg) => Self::Network(msg),
            FetchError::Status { status, body } => Self::Status { status, body },
            FetchError::Decode(msg) => Self::Decode(msg),
            FetchError::NotFound { id, .. } => Self::SourceNotFound(ConversationId::from_raw(id)),
        }
    }
}

/// Creates branches through a [`ConversationApi`].
#[derive(Clone)]
pub struct BranchService {
    api: Arc<dyn ConversationApi>,
}

impl BranchService {
    /// Service over `api`.
    pub fn new(api: Arc<dyn ConversationApi>) -> Self {
        Self { api }
    }

    /// Create a branch of `source` forking at `parent_message_id`.
    ///
    /// The source is fetched first to check that the message belongs to it.
    pub async fn create_branch(
        &self,
        source: &ConversationId,
        parent_message_id: &MessageId,
        title: &str,
        description: Option<&str>,
    ) -> Result<ConversationId, BranchCreationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BranchCreationError::EmptyTitle);
        }

        let conversation = self.api.get_conversation(source).await?;
        if !conversation.contains_message(parent_message_id) {
            warn!(
                conversation_id = %source,
                message_id = %parent_message_id,
                "refusing to branch at a foreign message"
            );
            return Err(BranchCreationError::MessageNotInConversation {
                conversation_id: source.clone(),
                message_id: parent_message_id.clone(),
            });
        }

        let request = BranchRequest {
            parent_message_id: parent_message_id.clone(),
            title: title.to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from),
        };
        let created = self.api.create_branch(source, &request).await?;
        info!(
            conversation_id = %source,
            message_id = %parent_message_id,
            branch_id = %created.conversation_id,
            "created branch"
        );
        Ok(created.conversation_id)
    }
}

impl std::fmt::Debug for BranchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchService").finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum DraftState {
    Editing,
    Failed(String),
    Created(ConversationId),
}

/// A pending branch form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchDraft {
    source: ConversationId,
    parent_message_id: MessageId,
    /// Title being edited.
    pub title: String,
    /// Description being edited.
    pub description: Option<String>,
    state: DraftState,
}

impl BranchDraft {
    /// Open a draft for branching `source` at `parent_message_id`.
    pub fn new(source: ConversationId, parent_message_id: MessageId) -> Self {
        Self {
            source,
            parent_message_id,
            title: String::new(),
            description: None,
            state: DraftState::Editing,
        }
    }

    /// The conversation being branched.
    pub fn source(&self) -> &ConversationId {
        &self.source
    }

    /// The fork message.
    pub fn parent_message_id(&self) -> &MessageId {
        &self.parent_message_id
    }

    /// Whether the form is still shown.
    pub fn is_open(&self) -> bool {
        !matches!(self.state, DraftState::Created(_))
    }

    /// Error text from the last failed submit.
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            DraftState::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    /// The created branch, once a submit succeeded.
    pub fn created(&self) -> Option<&ConversationId> {
        match &self.state {
            DraftState::Created(id) => Some(id),
            _ => None,
        }
    }

    /// Submit the draft. On failure the draft stays open with the error;
    /// on success it closes. Submitting a closed draft returns the branch
    /// already created.
    pub async fn submit(
        &mut self,
        service: &BranchService,
    ) -> Result<ConversationId, BranchCreationError> {
        if let DraftState::Created(id) = &self.state {
            return Ok(id.clone());
        }
        let result = service
            .create_branch(
                &self.source,
                &self.parent_message_id,
                &self.title,
                self.description.as_deref(),
            )
            .await;
        self.state = match &result {
            Ok(id) => DraftState::Created(id.clone()),
            Err(err) => DraftState::Failed(err.to_string()),
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryConversationApi;
    use crate::model::{ChatMessage, Conversation, Role};
    use assert_matches::assert_matches;

    fn setup() -> (Arc<InMemoryConversationApi>, BranchService) {
        let mut root = Conversation::new("root", "Root");
        root.messages = vec![
            ChatMessage::new("m1", Role::User, "hi"),
            ChatMessage::new("m2", Role::Assistant, "hello"),
        ];
        let mut other = Conversation::new("other", "Other");
        other.messages = vec![ChatMessage::new("x1", Role::User, "elsewhere")];
        let api = Arc::new(InMemoryConversationApi::with_conversations([root, other]));
        let service = BranchService::new(api.clone());
        (api, service)
    }

    fn cid(s: &str) -> ConversationId {
        ConversationId::from_raw(s)
    }

    fn mid(s: &str) -> MessageId {
        MessageId::from_raw(s)
    }

    #[test]
    fn retryability() {
        assert!(BranchCreationError::Network("x".into()).is_retryable());
        assert!(BranchCreationError::Status { status: 500, body: String::new() }.is_retryable());
        assert!(!BranchCreationError::EmptyTitle.is_retryable());
        assert!(
            !BranchCreationError::MessageNotInConversation {
                conversation_id: cid("c"),
                message_id: mid("m"),
            }
            .is_retryable()
        );
    }

    #[tokio::test]
    async fn foreign_message_fails_and_creates_nothing() {
        let (api, service) = setup();
        let result = service.create_branch(&cid("root"), &mid("x1"), "Alt", None).await;
        assert_matches!(result, Err(BranchCreationError::MessageNotInConversation { .. }));
        assert_eq!(api.len(), 2);
        assert_eq!(api.branch_requests(), 0);
    }

    #[tokio::test]
    async fn empty_title_fails_before_any_request() {
        let (api, service) = setup();
        let result = service.create_branch(&cid("root"), &mid("m1"), "   ", None).await;
        assert_eq!(result, Err(BranchCreationError::EmptyTitle));
        assert_eq!(api.branch_requests(), 0);
    }

    #[tokio::test]
    async fn unknown_source_maps_to_source_not_found() {
        let (_api, service) = setup();
        let result = service.create_branch(&cid("ghost"), &mid("m1"), "Alt", None).await;
        assert_eq!(result, Err(BranchCreationError::SourceNotFound(cid("ghost"))));
    }

    #[tokio::test]
    async fn draft_stays_open_on_failure_and_closes_on_retry() {
        let (api, service) = setup();
        api.fail_next_branch(FetchError::Network("connection reset".into()));

        let mut draft = BranchDraft::new(cid("root"), mid("m2"));
        draft.title = "What if bonds".into();

        let first = draft.submit(&service).await;
        assert_matches!(first, Err(ref e) if e.is_retryable());
        assert!(draft.is_open());
        assert!(draft.error().unwrap().contains("connection reset"));
        assert_eq!(api.len(), 2);

        let id = draft.submit(&service).await.unwrap();
        assert!(!draft.is_open());
        assert!(draft.error().is_none());
        assert_eq!(draft.created(), Some(&id));
        assert_eq!(api.len(), 3);

        // already created: no second request
        assert_eq!(draft.submit(&service).await.unwrap(), id);
        assert_eq!(api.branch_requests(), 2);
    }
}
