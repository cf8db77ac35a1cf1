//! Conversation branch tree.
//!
//! Built once from a list of [`ConversationSummary`]s into three maps:
//! id to summary, parent to children, and fork message to branches. All
//! queries run against those maps; nothing walks the raw list.
//!
//! A conversation's parent is its `parent_conversation_id`. When only
//! `parent_message_id` is given, the parent is the conversation that owns
//! that message according to `message_ids`.

use std::collections::{HashMap, HashSet};

use prism_core::{ConversationId, MessageId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::model::{Conversation, ConversationSummary};

/// Tree query failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    /// Following parent links revisited a conversation.
    #[error("conversation {conversation_id} has a cyclic ancestry: {}", format_path(.path))]
    MalformedTree {
        /// Where the walk started.
        conversation_id: ConversationId,
        /// Conversations visited before the cycle closed, starting point first.
        path: Vec<ConversationId>,
    },

    /// The requested conversation is not in the tree.
    #[error("unknown conversation {0}")]
    UnknownConversation(ConversationId),
}

fn format_path(path: &[ConversationId]) -> String {
    path.iter()
        .map(ConversationId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// One breadcrumb entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crumb {
    /// Conversation id.
    pub conversation_id: ConversationId,
    /// Conversation title.
    pub title: String,
}

impl From<&ConversationSummary> for Crumb {
    fn from(summary: &ConversationSummary) -> Self {
        Self {
            conversation_id: summary.id.clone(),
            title: summary.title.clone(),
        }
    }
}

/// Resolved parent link of a conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParentLink {
    /// No parent.
    Root,
    /// Parent present in the tree.
    Known(ConversationId),
    /// A parent is referenced but not present in the tree.
    Dangling(String),
}

/// Adjacency view over a set of conversations.
#[derive(Clone, Debug, Default)]
pub struct BranchTree {
    nodes: HashMap<ConversationId, ConversationSummary>,
    order: Vec<ConversationId>,
    children: HashMap<ConversationId, Vec<ConversationId>>,
    branches_by_message: HashMap<MessageId, Vec<ConversationId>>,
    message_owner: HashMap<MessageId, ConversationId>,
}

impl BranchTree {
    /// Build the tree. Later duplicates of an id are ignored.
    pub fn from_summaries(summaries: impl IntoIterator<Item = ConversationSummary>) -> Self {
        let mut tree = Self::default();

        for summary in summaries {
            if tree.nodes.contains_key(&summary.id) {
                warn!(conversation_id = %summary.id, "duplicate conversation in listing");
                continue;
            }
            tree.order.push(summary.id.clone());
            let _ = tree.nodes.insert(summary.id.clone(), summary);
        }

        // Messages up to and including a branch's fork point are copies of
        // its parent's prefix and never make the branch their owner. Among
        // the remaining holders the earliest created wins, then listing order.
        for id in &tree.order {
            let summary = &tree.nodes[id];
            for message_id in own_messages(summary) {
                let claim = tree
                    .message_owner
                    .get(message_id)
                    .is_none_or(|owner| created_before(summary, &tree.nodes[owner]));
                if claim {
                    let _ = tree.message_owner.insert(message_id.clone(), id.clone());
                }
            }
        }

        for id in &tree.order {
            let summary = &tree.nodes[id];
            if let Some(message_id) = &summary.parent_message_id {
                tree.branches_by_message
                    .entry(message_id.clone())
                    .or_default()
                    .push(id.clone());
            }
            if let ParentLink::Known(parent) = tree.parent_link(summary) {
                tree.children.entry(parent).or_default().push(id.clone());
            }
        }

        tree
    }

    /// Number of conversations.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the tree has no conversations.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up a conversation.
    pub fn get(&self, id: &ConversationId) -> Option<&ConversationSummary> {
        self.nodes.get(id)
    }

    /// Resolve the parent of `summary`.
    pub fn parent_link(&self, summary: &ConversationSummary) -> ParentLink {
        if let Some(parent) = &summary.parent_conversation_id {
            return if self.nodes.contains_key(parent) {
                ParentLink::Known(parent.clone())
            } else {
                ParentLink::Dangling(parent.to_string())
            };
        }
        match &summary.parent_message_id {
            None => ParentLink::Root,
            Some(message_id) => match self.message_owner.get(message_id) {
                Some(owner) if owner != &summary.id => ParentLink::Known(owner.clone()),
                _ => ParentLink::Dangling(format!("owner of message {message_id}")),
            },
        }
    }

    /// Ancestry of `conversation_id`, root first and the conversation last.
    ///
    /// A parent missing from the tree ends the walk there. A cycle is an
    /// error.
    pub fn breadcrumb(&self, conversation_id: &ConversationId) -> Result<Vec<Crumb>, TreeError> {
        let mut current = self
            .nodes
            .get(conversation_id)
            .ok_or_else(|| TreeError::UnknownConversation(conversation_id.clone()))?;
        let mut visited = HashSet::new();
        let mut path: Vec<&ConversationSummary> = Vec::new();

        loop {
            if !visited.insert(&current.id) {
                return Err(TreeError::MalformedTree {
                    conversation_id: conversation_id.clone(),
                    path: path.iter().map(|s| s.id.clone()).collect(),
                });
            }
            path.push(current);

            match self.parent_link(current) {
                ParentLink::Root => break,
                ParentLink::Known(parent) => match self.nodes.get(&parent) {
                    Some(summary) => current = summary,
                    None => break,
                },
                ParentLink::Dangling(reference) => {
                    warn!(
                        conversation_id = %current.id,
                        parent = %reference,
                        "parent conversation not loaded, breadcrumb truncated"
                    );
                    break;
                }
            }
        }

        Ok(path.into_iter().rev().map(Crumb::from).collect())
    }

    /// Number of branches forked at `message_id`.
    pub fn branch_count_for(&self, message_id: &MessageId) -> usize {
        self.branches_by_message.get(message_id).map_or(0, Vec::len)
    }

    /// Branches forked at `message_id`, in listing order.
    pub fn branches_for(&self, message_id: &MessageId) -> Vec<&ConversationSummary> {
        self.branches_by_message
            .get(message_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// Direct children of `conversation_id`, in listing order.
    pub fn children_of(&self, conversation_id: &ConversationId) -> Vec<&ConversationSummary> {
        self.children
            .get(conversation_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// Conversations with no resolvable parent, in listing order.
    pub fn roots(&self) -> Vec<&ConversationSummary> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|s| !matches!(self.parent_link(s), ParentLink::Known(_)))
            .collect()
    }

    /// Branch count for every message of `conversation`, in message order.
    pub fn branch_counts(&self, conversation: &Conversation) -> Vec<(MessageId, usize)> {
        conversation
            .messages
            .iter()
            .map(|m| (m.id.clone(), self.branch_count_for(&m.id)))
            .collect()
    }
}

/// Messages `summary` holds that are not copied from its parent.
fn own_messages(summary: &ConversationSummary) -> &[MessageId] {
    let ids = summary.message_ids.as_slice();
    let fork = summary
        .parent_message_id
        .as_ref()
        .and_then(|fork| ids.iter().position(|id| id == fork));
    match fork {
        Some(index) => &ids[index + 1..],
        None => ids,
    }
}

fn created_before(a: &ConversationSummary, b: &ConversationSummary) -> bool {
    match (a.created_at, b.created_at) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}

/// Breadcrumb of `conversation_id` within `all`.
pub fn compute_breadcrumb(
    conversation_id: &ConversationId,
    all: &[ConversationSummary],
) -> Result<Vec<Crumb>, TreeError> {
    BranchTree::from_summaries(all.iter().cloned()).breadcrumb(conversation_id)
}

/// Number of conversations in `all` forked at `message_id`.
pub fn branch_count_for(message_id: &MessageId, all: &[ConversationSummary]) -> usize {
    all.iter()
        .filter(|s| s.parent_message_id.as_ref() == Some(message_id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn cid(s: &str) -> ConversationId {
        ConversationId::from_raw(s)
    }

    fn mid(s: &str) -> MessageId {
        MessageId::from_raw(s)
    }

    fn titles(crumbs: &[Crumb]) -> Vec<&str> {
        crumbs.iter().map(|c| c.title.as_str()).collect()
    }

    fn three_levels() -> Vec<ConversationSummary> {
        vec![
            ConversationSummary::root("root", "Root"),
            ConversationSummary::branch("mid", "Mid", "root", "m1"),
            ConversationSummary::branch("leaf", "Leaf", "mid", "m5"),
        ]
    }

    #[test]
    fn breadcrumb_is_root_first() {
        let crumbs = compute_breadcrumb(&cid("leaf"), &three_levels()).unwrap();
        assert_eq!(titles(&crumbs), ["Root", "Mid", "Leaf"]);
        assert_eq!(crumbs[2].conversation_id, cid("leaf"));
    }

    #[test]
    fn breadcrumb_of_root_is_itself() {
        let crumbs = compute_breadcrumb(&cid("root"), &three_levels()).unwrap();
        assert_eq!(titles(&crumbs), ["Root"]);
    }

    #[test]
    fn unknown_start_is_an_error() {
        assert_matches!(
            compute_breadcrumb(&cid("nope"), &three_levels()),
            Err(TreeError::UnknownConversation(id)) if id == cid("nope")
        );
    }

    #[test]
    fn cycle_is_detected() {
        let all = vec![
            ConversationSummary::branch("a", "A", "b", "m1"),
            ConversationSummary::branch("b", "B", "a", "m2"),
        ];
        let err = compute_breadcrumb(&cid("a"), &all).unwrap_err();
        assert_matches!(
            err,
            TreeError::MalformedTree { ref conversation_id, ref path }
                if *conversation_id == cid("a") && path == &[cid("a"), cid("b")]
        );
        assert!(err.to_string().contains("a -> b"));
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let all = vec![ConversationSummary::branch("a", "A", "a", "m1")];
        assert_matches!(
            compute_breadcrumb(&cid("a"), &all),
            Err(TreeError::MalformedTree { .. })
        );
    }

    #[test]
    fn dangling_parent_truncates_and_warns() {
        let (logs, _guard) = prism_logging::capture_logs();
        let all = vec![ConversationSummary::branch("b", "B", "gone", "m1")];
        let crumbs = compute_breadcrumb(&cid("b"), &all).unwrap();
        assert_eq!(titles(&crumbs), ["B"]);
        assert!(logs.has_event(tracing::Level::WARN, "breadcrumb truncated"));
    }

    #[test]
    fn parent_resolved_through_message_owner() {
        let mut root = ConversationSummary::root("root", "Root");
        root.message_ids = vec![mid("m1"), mid("m2")];
        let mut branch = ConversationSummary::root("b1", "B1");
        branch.parent_message_id = Some(mid("m1"));
        // the branch's copy of m1 must not make it its own parent
        branch.message_ids = vec![mid("m1"), mid("b1-m2")];

        let tree = BranchTree::from_summaries(vec![branch, root]);
        let crumbs = tree.breadcrumb(&cid("b1")).unwrap();
        assert_eq!(titles(&crumbs), ["Root", "B1"]);
        assert_eq!(tree.children_of(&cid("root")).len(), 1);
    }

    #[test]
    fn copied_prefix_does_not_claim_ownership() {
        let mut root = ConversationSummary::root("root", "Root");
        root.message_ids = vec![mid("m1"), mid("m2")];
        let mut b1 = ConversationSummary::root("b1", "B1");
        b1.parent_message_id = Some(mid("m2"));
        b1.message_ids = vec![mid("m1"), mid("m2"), mid("b1-m3")];
        let mut b2 = ConversationSummary::root("b2", "B2");
        b2.parent_message_id = Some(mid("m1"));
        b2.message_ids = vec![mid("m1"), mid("b2-m2")];

        // newest first
        let tree = BranchTree::from_summaries(vec![b2, b1, root]);
        assert_eq!(titles(&tree.breadcrumb(&cid("b2")).unwrap()), ["Root", "B2"]);
        assert_eq!(titles(&tree.breadcrumb(&cid("b1")).unwrap()), ["Root", "B1"]);
        assert_eq!(tree.children_of(&cid("root")).len(), 2);
        assert!(tree.children_of(&cid("b1")).is_empty());
    }

    #[test]
    fn earliest_created_holder_owns_a_message() {
        use chrono::{TimeZone, Utc};

        let mut root = ConversationSummary::root("root", "Root");
        root.message_ids = vec![mid("m1")];
        root.created_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        // lists m1 without marking it as its fork point
        let mut copy = ConversationSummary::root("copy", "Copy");
        copy.message_ids = vec![mid("m1")];
        copy.created_at = Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        let mut branch = ConversationSummary::root("b", "B");
        branch.parent_message_id = Some(mid("m1"));

        let tree = BranchTree::from_summaries(vec![copy, branch, root]);
        assert_eq!(titles(&tree.breadcrumb(&cid("b")).unwrap()), ["Root", "B"]);
    }

    #[test]
    fn branch_count_increments_per_branch() {
        let mut all = vec![ConversationSummary::root("root", "Root")];
        assert_eq!(branch_count_for(&mid("m1"), &all), 0);

        all.push(ConversationSummary::branch("b1", "B1", "root", "m1"));
        assert_eq!(branch_count_for(&mid("m1"), &all), 1);

        all.push(ConversationSummary::branch("b2", "B2", "root", "m1"));
        assert_eq!(branch_count_for(&mid("m1"), &all), 2);
        assert_eq!(branch_count_for(&mid("m2"), &all), 0);
    }

    #[test]
    fn two_branches_from_same_message() {
        let all = vec![
            ConversationSummary::root("root", "Root"),
            ConversationSummary::branch("b1", "B1", "root", "m1"),
            ConversationSummary::branch("b2", "B2", "root", "m1"),
        ];
        let tree = BranchTree::from_summaries(all.clone());
        assert_eq!(tree.branch_count_for(&mid("m1")), 2);
        assert_eq!(titles(&tree.breadcrumb(&cid("b1")).unwrap()), ["Root", "B1"]);

        let branch_ids: Vec<_> = tree
            .branches_for(&mid("m1"))
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(branch_ids, ["b1", "b2"]);
        assert_eq!(tree.children_of(&cid("root")).len(), 2);
        assert_eq!(tree.roots().len(), 1);
    }

    #[test]
    fn branch_counts_follow_message_order() {
        let mut conversation = Conversation::new("root", "Root");
        conversation.messages = vec![
            crate::model::ChatMessage::new("m1", crate::model::Role::User, "a"),
            crate::model::ChatMessage::new("m2", crate::model::Role::Assistant, "b"),
        ];
        let tree = BranchTree::from_summaries(vec![
            conversation.summary(),
            ConversationSummary::branch("b1", "B1", "root", "m2"),
        ]);
        assert_eq!(tree.branch_counts(&conversation), [(mid("m1"), 0), (mid("m2"), 1)]);
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let tree = BranchTree::from_summaries(vec![
            ConversationSummary::root("a", "First"),
            ConversationSummary::root("a", "Second"),
        ]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&cid("a")).unwrap().title, "First");
    }

    /// Chain `c0 <- c1 <- ... <- cN`, listed in shuffled order.
    fn chain(len: usize) -> impl Strategy<Value = Vec<ConversationSummary>> {
        let summaries: Vec<_> = (0..len)
            .map(|n| {
                if n == 0 {
                    ConversationSummary::root("c0", "C0")
                } else {
                    ConversationSummary::branch(
                        format!("c{n}"),
                        format!("C{n}"),
                        format!("c{}", n - 1),
                        format!("m{n}"),
                    )
                }
            })
            .collect();
        Just(summaries).prop_shuffle()
    }

    proptest! {
        #[test]
        fn breadcrumb_of_chain_tail_lists_every_level(
            (len, all) in (1usize..12).prop_flat_map(|len| (Just(len), chain(len)))
        ) {
            let tail = cid(&format!("c{}", len - 1));
            let crumbs = compute_breadcrumb(&tail, &all).unwrap();
            prop_assert_eq!(crumbs.len(), len);
            for (n, crumb) in crumbs.iter().enumerate() {
                prop_assert_eq!(crumb.conversation_id.as_str(), format!("c{n}"));
            }
        }
    }
}
