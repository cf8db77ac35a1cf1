//! Conversation REST API.
//!
//! | Method | Path                                                     | Returns                        |
//! |--------|----------------------------------------------------------|--------------------------------|
//! | GET    | `/api/conversations`                                     | `[ConversationSummary]`        |
//! | GET    | `/api/conversations/{id}`                                | `Conversation`                 |
//! | POST   | `/api/conversations/{id}/branch`                         | `{conversation_id}`            |
//! | GET    | `/api/conversations/{id}/messages/{message_id}/branches` | `{branches: [ConversationSummary]}` |

use std::time::Duration;

use async_trait::async_trait;
use prism_core::{ApiClient, ConversationId, FetchError, MessageId};
use serde::{Deserialize, Serialize};

use crate::model::{Conversation, ConversationSummary};

/// Body of a branch creation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRequest {
    /// Message in the source conversation to fork at.
    pub parent_message_id: MessageId,
    /// Title of the new conversation.
    pub title: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Response of a branch creation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCreated {
    /// Id of the new branch conversation.
    #[serde(alias = "conversationId")]
    pub conversation_id: ConversationId,
}

#[derive(Deserialize)]
struct BranchList {
    #[serde(default)]
    branches: Vec<ConversationSummary>,
}

/// Access to conversations.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// All conversations, without messages.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, FetchError>;

    /// One conversation with its messages.
    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation, FetchError>;

    /// Create a branch of `source`.
    async fn create_branch(
        &self,
        source: &ConversationId,
        request: &BranchRequest,
    ) -> Result<BranchCreated, FetchError>;

    /// Branches forked at `message_id` of `conversation`.
    async fn list_branches(
        &self,
        conversation: &ConversationId,
        message_id: &MessageId,
    ) -> Result<Vec<ConversationSummary>, FetchError>;
}

/// [`ConversationApi`] over HTTP.
#[derive(Clone, Debug)]
pub struct HttpConversationApi {
    client: ApiClient,
}

impl HttpConversationApi {
    /// Wrap an existing client.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Build a client for `base_url`.
    pub fn connect(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        ApiClient::new(base_url, token, timeout).map(Self::new)
    }
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, FetchError> {
        self.client.get_json("/api/conversations").await
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Conversation, FetchError> {
        self.client
            .get_json(&format!("/api/conversations/{id}"))
            .await
            .map_err(|e| match e {
                FetchError::Status { status: 404, .. } => FetchError::NotFound {
                    resource: "conversation",
                    id: id.to_string(),
                },
                other => other,
            })
    }

    async fn create_branch(
        &self,
        source: &ConversationId,
        request: &BranchRequest,
    ) -> Result<BranchCreated, FetchError> {
        self.client
            .post_json(&format!("/api/conversations/{source}/branch"), request)
            .await
    }

    async fn list_branches(
        &self,
        conversation: &ConversationId,
        message_id: &MessageId,
    ) -> Result<Vec<ConversationSummary>, FetchError> {
        let list: BranchList = self
            .client
            .get_json(&format!(
                "/api/conversations/{conversation}/messages/{message_id}/branches"
            ))
            .await?;
        Ok(list.branches)
    }
}
