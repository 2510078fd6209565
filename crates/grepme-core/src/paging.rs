//! Page and cursor management.
//!
//! Message history is paged backward by cursor: each request asks for messages
//! older than the oldest one already seen. Conversation lists are paged
//! forward by page number. Both pagers fetch exactly one page per call and
//! never fetch again once an empty page has been seen.

use std::sync::Arc;

use crate::Result;
use crate::groupme::models::{Conversation, ConversationKind, Message, MessageId};
use crate::source::{
    CONVERSATION_PAGE_SIZE, ConversationSource, DEFAULT_MESSAGE_LIMIT, MessageSource,
};

/// One fetch's worth of messages, newest first.
pub type Page = Vec<Message>;

/// Position in a backward scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageCursor {
    before: Option<MessageId>,
    fetches: usize,
    exhausted: bool,
}

impl PageCursor {
    /// A cursor positioned at the newest message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive upper bound for the next fetch; `None` means newest.
    #[must_use]
    pub const fn before(&self) -> Option<&MessageId> {
        self.before.as_ref()
    }

    /// Number of pages requested so far, empty ones included.
    #[must_use]
    pub const fn fetches(&self) -> usize {
        self.fetches
    }

    /// Whether an empty page has ended the scan.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Record a fetched page: an empty page exhausts the cursor, otherwise the
    /// page's last (oldest) message becomes the next bound.
    pub fn advance(&mut self, page: &[Message]) {
        self.fetches += 1;
        match page.last() {
            Some(oldest) => self.before = Some(oldest.id.clone()),
            None => self.exhausted = true,
        }
    }
}

/// Pulls a conversation's history one page at a time.
#[derive(Debug)]
pub struct MessagePager<'a, S> {
    source: &'a S,
    conversation: &'a Conversation,
    limit: usize,
    cursor: PageCursor,
}

impl<'a, S: MessageSource> MessagePager<'a, S> {
    /// Create a pager starting at the newest message, requesting
    /// [`DEFAULT_MESSAGE_LIMIT`] messages per page.
    #[must_use]
    pub fn new(source: &'a S, conversation: &'a Conversation) -> Self {
        Self {
            source,
            conversation,
            limit: DEFAULT_MESSAGE_LIMIT,
            cursor: PageCursor::new(),
        }
    }

    /// Request `limit` messages per page instead of the default.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Current cursor state.
    #[must_use]
    pub const fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    /// Fetch the next older page, or `None` once history is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates the source's fetch error. The pager is left exhausted so
    /// that no further requests are made.
    pub async fn next_page(&mut self) -> Result<Option<Arc<Page>>> {
        if self.cursor.is_exhausted() {
            return Ok(None);
        }

        let fetched = self
            .source
            .fetch_messages(self.conversation, self.cursor.before(), self.limit)
            .await;
        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                self.cursor.exhausted = true;
                return Err(e);
            }
        };

        log::debug!(
            "{} {}: fetched {} messages before {}",
            self.conversation.kind,
            self.conversation.name,
            page.len(),
            self.cursor
                .before()
                .map_or_else(|| "newest".to_string(), ToString::to_string)
        );

        self.cursor.advance(&page);
        if page.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Arc::new(page)))
        }
    }
}

/// Pulls a conversation listing one numbered page at a time.
#[derive(Debug)]
pub struct ConversationPager<'a, S> {
    source: &'a S,
    kind: ConversationKind,
    next_page: u32,
    per_page: usize,
    exhausted: bool,
}

impl<'a, S: ConversationSource> ConversationPager<'a, S> {
    /// Create a pager starting at page 1 with the standard page size.
    #[must_use]
    pub const fn new(source: &'a S, kind: ConversationKind) -> Self {
        Self {
            source,
            kind,
            next_page: 1,
            per_page: CONVERSATION_PAGE_SIZE,
            exhausted: false,
        }
    }

    /// Number of the page the next call will request.
    #[must_use]
    pub const fn next_page_number(&self) -> u32 {
        self.next_page
    }

    /// Fetch the next page, or `None` after the first empty page.
    ///
    /// # Errors
    ///
    /// Propagates the source's fetch error; the pager is then exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Conversation>>> {
        if self.exhausted {
            return Ok(None);
        }

        let fetched = self
            .source
            .list_conversations(self.kind, self.next_page, self.per_page)
            .await;
        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            }
        };

        log::debug!(
            "{} list page {}: {} conversations",
            self.kind,
            self.next_page,
            page.len()
        );

        self.next_page += 1;
        if page.is_empty() {
            self.exhausted = true;
            Ok(None)
        } else {
            Ok(Some(page))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::CoreError;

    /// Serves fixed pages, splitting history at whatever cursor it receives.
    struct StubHistory {
        messages: Vec<Message>,
        page_size: usize,
        requests: Mutex<Vec<Option<MessageId>>>,
    }

    impl StubHistory {
        fn new(count: usize, page_size: usize) -> Self {
            let messages = (1..=count)
                .rev()
                .map(|id| Message::new(id.to_string(), Some("hi"), "a", 0))
                .collect();
            Self {
                messages,
                page_size,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Option<MessageId>> {
            self.requests.lock().expect("lock").clone()
        }
    }

    impl MessageSource for StubHistory {
        async fn fetch_messages(
            &self,
            _conversation: &Conversation,
            before: Option<&MessageId>,
            _limit: usize,
        ) -> Result<Vec<Message>> {
            self.requests.lock().expect("lock").push(before.cloned());
            let start = before.map_or(0, |b| {
                self.messages
                    .iter()
                    .position(|m| &m.id == b)
                    .map_or(self.messages.len(), |i| i + 1)
            });
            Ok(self.messages[start..]
                .iter()
                .take(self.page_size)
                .cloned()
                .collect())
        }
    }

    #[test]
    fn cursor_tracks_oldest_message() {
        let mut cursor = PageCursor::new();
        assert!(cursor.before().is_none());

        let page = vec![
            Message::new("9", Some("a"), "x", 0),
            Message::new("8", Some("b"), "x", 0),
        ];
        cursor.advance(&page);
        assert_eq!(cursor.before(), Some(&MessageId::new("8")));
        assert_eq!(cursor.fetches(), 1);
        assert!(!cursor.is_exhausted());

        cursor.advance(&[]);
        assert!(cursor.is_exhausted());
        assert_eq!(cursor.before(), Some(&MessageId::new("8")));
        assert_eq!(cursor.fetches(), 2);
    }

    #[tokio::test]
    async fn pager_walks_backward_until_empty() {
        let source = StubHistory::new(5, 2);
        let conv = Conversation::group("g", "group");
        let mut pager = MessagePager::new(&source, &conv).with_limit(2);

        let mut ids = Vec::new();
        while let Some(page) = pager.next_page().await.expect("page") {
            ids.extend(page.iter().map(|m| m.id.to_string()));
        }

        assert_eq!(ids, ["5", "4", "3", "2", "1"]);
        assert_eq!(
            source.requests(),
            vec![
                None,
                Some(MessageId::new("4")),
                Some(MessageId::new("2")),
                Some(MessageId::new("1")),
            ]
        );

        assert!(pager.next_page().await.expect("page").is_none());
        assert_eq!(source.requests().len(), 4);
    }

    struct FailingSource;

    impl MessageSource for FailingSource {
        async fn fetch_messages(
            &self,
            _conversation: &Conversation,
            _before: Option<&MessageId>,
            _limit: usize,
        ) -> Result<Vec<Message>> {
            Err(CoreError::Fetch {
                status: 500,
                context: "boom".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn pager_stops_after_error() {
        let conv = Conversation::direct("u", "user");
        let mut pager = MessagePager::new(&FailingSource, &conv);
        assert!(pager.next_page().await.is_err());
        assert!(pager.next_page().await.expect("after error").is_none());
    }

    struct NumberedPages {
        sizes: Vec<usize>,
        calls: Mutex<Vec<(u32, usize)>>,
    }

    impl ConversationSource for NumberedPages {
        async fn list_conversations(
            &self,
            kind: ConversationKind,
            page: u32,
            per_page: usize,
        ) -> Result<Vec<Conversation>> {
            self.calls.lock().expect("lock").push((page, per_page));
            let size = self.sizes.get(page as usize - 1).copied().unwrap_or(0);
            Ok((0..size)
                .map(|i| Conversation {
                    id: format!("{page}-{i}"),
                    name: format!("conv {i}"),
                    kind,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn conversation_pager_counts_from_one() {
        let source = NumberedPages {
            sizes: vec![3, 1],
            calls: Mutex::new(Vec::new()),
        };
        let mut pager = ConversationPager::new(&source, ConversationKind::Group);
        assert_eq!(pager.next_page_number(), 1);

        assert_eq!(pager.next_page().await.expect("p1").map(|p| p.len()), Some(3));
        assert_eq!(pager.next_page().await.expect("p2").map(|p| p.len()), Some(1));
        assert!(pager.next_page().await.expect("p3").is_none());
        assert!(pager.next_page().await.expect("done").is_none());

        let calls = source.calls.lock().expect("lock").clone();
        assert_eq!(calls, vec![(1, 100), (2, 100), (3, 100)]);
    }
}
