//! Conversation records as the conversation API serves them.

use chrono::{DateTime, Utc};
use prism_core::{ConversationId, MessageId};
use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The dashboard user.
    User,
    /// The assistant.
    Assistant,
    /// System prompt or notice.
    System,
}

impl Role {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// A single message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message id, unique across conversations.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Message text.
    #[serde(default)]
    pub content: String,
    /// Send time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    /// A message stamped with the current time.
    pub fn new(id: impl Into<MessageId>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

/// A full conversation.
///
/// A branch is a conversation with `parent_message_id` set: it starts with a
/// copy of its parent's messages up to and including that message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation id.
    pub id: ConversationId,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// The conversation this one was branched from.
    #[serde(
        default,
        alias = "parent_conversation_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_conversation_id: Option<ConversationId>,
    /// The message in the parent this branch forks at.
    #[serde(default, alias = "parent_message_id", skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<MessageId>,
    /// Messages in order.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Creation time.
    #[serde(default, alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// A root conversation with no messages.
    pub fn new(id: impl Into<ConversationId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            parent_conversation_id: None,
            parent_message_id: None,
            messages: Vec::new(),
            created_at: Some(Utc::now()),
        }
    }

    /// Whether this conversation was branched from another.
    pub fn is_branch(&self) -> bool {
        self.parent_message_id.is_some()
    }

    /// Whether `message_id` is one of this conversation's messages.
    pub fn contains_message(&self, message_id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == message_id)
    }

    /// Messages up to and including `message_id`.
    pub fn prefix_through(&self, message_id: &MessageId) -> Option<&[ChatMessage]> {
        let index = self.messages.iter().position(|m| &m.id == message_id)?;
        Some(&self.messages[..=index])
    }

    /// Summary carrying this conversation's message ids.
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            parent_conversation_id: self.parent_conversation_id.clone(),
            parent_message_id: self.parent_message_id.clone(),
            created_at: self.created_at,
            message_ids: self.messages.iter().map(|m| m.id.clone()).collect(),
        }
    }
}

/// A conversation without its messages, as listed by the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Conversation id.
    pub id: ConversationId,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// The conversation this one was branched from.
    #[serde(
        default,
        alias = "parent_conversation_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_conversation_id: Option<ConversationId>,
    /// The message in the parent this branch forks at.
    #[serde(default, alias = "parent_message_id", skip_serializing_if = "Option::is_none")]
    pub parent_message_id: Option<MessageId>,
    /// Creation time.
    #[serde(default, alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Ids of the messages this conversation holds, when the API includes
    /// them. Used to find a branch's parent when only the message is known.
    #[serde(default, alias = "message_ids", skip_serializing_if = "Vec::is_empty")]
    pub message_ids: Vec<MessageId>,
}

impl ConversationSummary {
    /// A root summary.
    pub fn root(id: impl Into<ConversationId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            parent_conversation_id: None,
            parent_message_id: None,
            created_at: None,
            message_ids: Vec::new(),
        }
    }

    /// A branch summary forking `parent` at `message`.
    pub fn branch(
        id: impl Into<ConversationId>,
        title: impl Into<String>,
        parent: impl Into<ConversationId>,
        message: impl Into<MessageId>,
    ) -> Self {
        Self {
            parent_conversation_id: Some(parent.into()),
            parent_message_id: Some(message.into()),
            ..Self::root(id, title)
        }
    }

    /// Whether this conversation was branched from another.
    pub fn is_branch(&self) -> bool {
        self.parent_message_id.is_some()
    }
}
