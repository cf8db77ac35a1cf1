//! # prism-conversations
//!
//! The dashboard assistant's conversations and their branch tree.
//!
//! - [`model`]: conversations, messages, and summaries
//! - [`tree`]: [`BranchTree`] adjacency maps, breadcrumbs, branch counts
//! - [`api`]: the [`ConversationApi`] seam and its HTTP implementation
//! - [`memory`]: an in-memory [`ConversationApi`]
//! - [`branching`]: validated branch creation and the pending-branch draft
//! - [`navigator`]: loading conversation views, dropping stale results

#![deny(unsafe_code)]

pub mod api;
pub mod branching;
pub mod memory;
pub mod model;
pub mod navigator;
pub mod tree;

pub use api::{BranchCreated, BranchRequest, ConversationApi, HttpConversationApi};
pub use branching::{BranchCreationError, BranchDraft, BranchService};
pub use memory::InMemoryConversationApi;
pub use model::{ChatMessage, Conversation, ConversationSummary, Role};
pub use navigator::{ConversationView, NavigationError, NavigationOutcome, Navigator};
pub use tree::{BranchTree, Crumb, ParentLink, TreeError, branch_count_for, compute_breadcrumb};
