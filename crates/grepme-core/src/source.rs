//! Paging contracts between the search engine and whatever serves history.
//!
//! [`GroupMeClient`](crate::groupme::GroupMeClient) implements both traits
//! against the HTTP API; tests implement them over in-memory pages.

use std::future::Future;

use crate::Result;
use crate::groupme::models::{Conversation, ConversationKind, Message, MessageId};

/// Default number of messages requested per page.
pub const DEFAULT_MESSAGE_LIMIT: usize = 100;

/// Fixed page size used when listing conversations.
pub const CONVERSATION_PAGE_SIZE: usize = 100;

/// Serves one conversation's history newest-first, one page per call.
pub trait MessageSource {
    /// Fetch up to `limit` messages older than `before` (newest when `None`),
    /// in descending id order. An empty page means the history is exhausted;
    /// "not modified" answers must also be reported as an empty page.
    fn fetch_messages(
        &self,
        conversation: &Conversation,
        before: Option<&MessageId>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send;
}

/// Lists conversations by 1-based page number.
pub trait ConversationSource {
    /// Fetch page `page` of conversations of `kind`. An empty page ends the
    /// listing.
    fn list_conversations(
        &self,
        kind: ConversationKind,
        page: u32,
        per_page: usize,
    ) -> impl Future<Output = Result<Vec<Conversation>>> + Send;
}
