//! Streaming search over backward-paginated history.
//!
//! [`MessageSearch`] pulls one page at a time from a [`MessageSource`], scans it
//! newest to oldest, and yields a [`MatchWindow`] for every message whose text
//! matches the pattern. Nothing is fetched until the caller asks for the next
//! match and the current page has no more candidates.
//!
//! Context is named from the reader's point of view. A page is newest-first,
//! so *before* context (older messages) sits at higher indices and *after*
//! context (newer messages) at lower indices. Windows are clamped to the page
//! they were found in: context near a page edge is cut short rather than
//! continued into the neighbouring page.

use std::ops::RangeInclusive;
use std::sync::Arc;

use regex::Regex;

use crate::Result;
use crate::groupme::models::{Conversation, Message};
use crate::paging::{MessagePager, Page};
use crate::source::MessageSource;

/// Number of messages to show around a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Context {
    /// Older messages shown before the match.
    pub before: usize,
    /// Newer messages shown after the match.
    pub after: usize,
}

impl Context {
    /// Context with separate before/after counts.
    #[must_use]
    pub const fn new(before: usize, after: usize) -> Self {
        Self { before, after }
    }

    /// The same count on both sides.
    #[must_use]
    pub const fn symmetric(n: usize) -> Self {
        Self::new(n, n)
    }
}

/// A match plus its surrounding context, as a view into a single page.
#[derive(Debug, Clone)]
pub struct MatchWindow {
    page: Arc<Page>,
    start: usize,
    end: usize,
    index: usize,
}

impl MatchWindow {
    /// Window around `page[index]`, covering
    /// `[index - context.after, index + context.before]` clamped to the page.
    ///
    /// Returns `None` if `index` is outside the page.
    #[must_use]
    pub fn around(page: Arc<Page>, index: usize, context: Context) -> Option<Self> {
        (index < page.len()).then(|| Self::within(page, index, context))
    }

    /// Same as [`around`](Self::around) for an index already known to be on
    /// the page.
    fn within(page: Arc<Page>, index: usize, context: Context) -> Self {
        debug_assert!(index < page.len(), "match index {index} outside page");
        let last = page.len().saturating_sub(1);
        let start = index.saturating_sub(context.after);
        let end = index.saturating_add(context.before).min(last);
        Self {
            page,
            start,
            end,
            index,
        }
    }

    /// Window bounds as page indices, inclusive.
    #[must_use]
    pub const fn range(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }

    /// Index of the matched message within the page.
    #[must_use]
    pub const fn page_index(&self) -> usize {
        self.index
    }

    /// Index of the matched message within [`messages`](Self::messages).
    #[must_use]
    pub const fn match_index(&self) -> usize {
        self.index - self.start
    }

    /// The window's messages, newest first, as stored in the page.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.page[self.start..=self.end]
    }

    /// The matched message.
    #[must_use]
    pub fn matched(&self) -> &Message {
        &self.page[self.index]
    }

    /// The window's messages oldest first, the order they are read in.
    pub fn chronological(&self) -> impl DoubleEndedIterator<Item = &Message> {
        self.messages().iter().rev()
    }

    /// Length of the page this window points into.
    #[must_use]
    pub fn page_len(&self) -> usize {
        self.page.len()
    }
}

impl PartialEq for MatchWindow {
    fn eq(&self, other: &Self) -> bool {
        self.range() == other.range()
            && self.index == other.index
            && self.messages() == other.messages()
    }
}

/// Lazy search of one conversation's history.
#[derive(Debug)]
pub struct MessageSearch<'a, S> {
    pager: MessagePager<'a, S>,
    pattern: &'a Regex,
    context: Context,
    page: Option<Arc<Page>>,
    position: usize,
    finished: bool,
}

impl<'a, S: MessageSource> MessageSearch<'a, S> {
    /// Prepare a search. No request is made until the first
    /// [`next_match`](Self::next_match).
    #[must_use]
    pub fn new(
        source: &'a S,
        conversation: &'a Conversation,
        pattern: &'a Regex,
        context: Context,
    ) -> Self {
        Self {
            pager: MessagePager::new(source, conversation),
            pattern,
            context,
            page: None,
            position: 0,
            finished: false,
        }
    }

    /// Request `limit` messages per page instead of the default.
    #[must_use]
    pub fn with_page_size(mut self, limit: usize) -> Self {
        self.pager = self.pager.with_limit(limit);
        self
    }

    /// Number of pages requested so far.
    #[must_use]
    pub const fn fetches(&self) -> usize {
        self.pager.cursor().fetches()
    }

    /// Yield the next match, fetching older pages only as needed.
    ///
    /// Returns `Ok(None)` once history is exhausted. Messages without text are
    /// never matched.
    ///
    /// # Errors
    ///
    /// Returns the source's fetch error. The search is finished afterwards and
    /// later calls return `Ok(None)` without touching the source.
    pub async fn next_match(&mut self) -> Result<Option<MatchWindow>> {
        loop {
            if self.finished {
                return Ok(None);
            }

            if let Some(page) = &self.page {
                while self.position < page.len() {
                    let index = self.position;
                    self.position += 1;

                    let Some(text) = page[index].text.as_deref() else {
                        continue;
                    };
                    if self.pattern.is_match(text) {
                        return Ok(Some(MatchWindow::within(Arc::clone(page), index, self.context)));
                    }
                }
            }

            match self.pager.next_page().await {
                Ok(Some(page)) => {
                    self.page = Some(page);
                    self.position = 0;
                }
                Ok(None) => {
                    self.page = None;
                    self.finished = true;
                }
                Err(e) => {
                    self.page = None;
                    self.finished = true;
                    return Err(e);
                }
            }
        }
    }

    /// Drain the search into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error; matches found before it are dropped.
    pub async fn collect_all(mut self) -> Result<Vec<MatchWindow>> {
        let mut windows = Vec::new();
        while let Some(window) = self.next_match().await? {
            windows.push(window);
        }
        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::CoreError;
    use crate::groupme::models::MessageId;

    /// Serves a fixed list of pages in order, then empty pages.
    struct StubPages {
        pages: Vec<Vec<Message>>,
        fail_at: Option<usize>,
        calls: Mutex<Vec<Option<MessageId>>>,
    }

    impl StubPages {
        fn new(pages: Vec<Vec<Message>>) -> Self {
            Self {
                pages,
                fail_at: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing_at(mut self, call: usize) -> Self {
            self.fail_at = Some(call);
            self
        }

        fn calls(&self) -> Vec<Option<MessageId>> {
            self.calls.lock().expect("lock").clone()
        }
    }

    impl MessageSource for StubPages {
        async fn fetch_messages(
            &self,
            _conversation: &Conversation,
            before: Option<&MessageId>,
            _limit: usize,
        ) -> Result<Vec<Message>> {
            let call = {
                let mut calls = self.calls.lock().expect("lock");
                calls.push(before.cloned());
                calls.len() - 1
            };
            if self.fail_at == Some(call) {
                return Err(CoreError::Fetch {
                    status: 503,
                    context: "stub outage".to_string(),
                });
            }
            Ok(self.pages.get(call).cloned().unwrap_or_default())
        }
    }

    fn msg(id: u32, text: Option<&str>) -> Message {
        Message::new(id.to_string(), text, "someone", i64::from(id))
    }

    /// Newest-first page with ids `from` down to `to`.
    fn page(from: u32, to: u32, text: &str) -> Vec<Message> {
        (to..=from).rev().map(|id| msg(id, Some(text))).collect()
    }

    fn conv() -> Conversation {
        Conversation::group("1", "ACM")
    }

    fn regex(p: &str) -> Regex {
        Regex::new(p).expect("regex")
    }

    #[tokio::test]
    async fn before_context_reaches_older_messages() {
        let source = StubPages::new(vec![vec![
            msg(5, Some("foo")),
            msg(4, Some("bar")),
            msg(3, Some("foo baz")),
        ]]);
        let conv = conv();
        let pattern = regex("foo");

        let windows = MessageSearch::new(&source, &conv, &pattern, Context::new(1, 0))
            .collect_all()
            .await
            .expect("search");

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].page_index(), 0);
        assert_eq!(windows[0].range(), 0..=1);
        assert_eq!(windows[0].match_index(), 0);
        assert_eq!(windows[1].page_index(), 2);
        assert_eq!(windows[1].range(), 2..=2);
        assert_eq!(windows[1].match_index(), 0);
    }

    #[tokio::test]
    async fn after_context_reaches_newer_messages() {
        let source = StubPages::new(vec![vec![
            msg(5, Some("a")),
            msg(4, Some("b")),
            msg(3, Some("hit")),
            msg(2, Some("c")),
        ]]);
        let conv = conv();
        let pattern = regex("hit");

        let windows = MessageSearch::new(&source, &conv, &pattern, Context::new(0, 2))
            .collect_all()
            .await
            .expect("search");

        assert_eq!(windows.len(), 1);
        let window = &windows[0];
        assert_eq!(window.range(), 0..=2);
        assert_eq!(window.match_index(), 2);
        assert_eq!(window.matched().id.as_str(), "3");
        let read_order: Vec<&str> = window.chronological().map(|m| m.id.as_str()).collect();
        assert_eq!(read_order, ["3", "4", "5"]);
    }

    #[test]
    fn window_bounds_are_clamped_for_every_position() {
        let page = Arc::new(page(10, 1, "x"));
        let len = page.len();
        for index in 0..len {
            for before in 0..12 {
                for after in 0..12 {
                    let window =
                        MatchWindow::around(Arc::clone(&page), index, Context::new(before, after))
                            .expect("window");
                    let expected_start = index.saturating_sub(after);
                    let expected_end = (index + before).min(len - 1);
                    assert_eq!(window.range(), expected_start..=expected_end);
                    assert_eq!(window.messages().len(), expected_end - expected_start + 1);
                    assert_eq!(window.matched().id, page[index].id);
                    assert_eq!(window.messages()[window.match_index()].id, page[index].id);
                }
            }
        }
    }

    #[test]
    fn window_outside_page_is_rejected() {
        let page = Arc::new(page(3, 1, "x"));
        assert!(MatchWindow::around(Arc::clone(&page), 3, Context::default()).is_none());
        assert!(MatchWindow::around(Arc::new(Vec::new()), 0, Context::default()).is_none());
    }

    #[test]
    fn in_page_windows_agree_with_around() {
        let page = Arc::new(page(4, 1, "x"));
        for index in 0..page.len() {
            let context = Context::new(index, 3 - index);
            assert_eq!(
                Some(MatchWindow::within(Arc::clone(&page), index, context)),
                MatchWindow::around(Arc::clone(&page), index, context)
            );
        }
    }

    #[tokio::test]
    async fn match_on_oldest_message_does_not_end_the_scan() {
        let source = StubPages::new(vec![
            vec![msg(5, Some("a")), msg(4, Some("needle"))],
            vec![msg(3, Some("needle"))],
        ]);
        let conv = conv();
        let pattern = regex("needle");

        let windows = MessageSearch::new(&source, &conv, &pattern, Context::symmetric(3))
            .collect_all()
            .await
            .expect("search");

        let matched: Vec<&str> = windows.iter().map(|w| w.matched().id.as_str()).collect();
        assert_eq!(matched, ["4", "3"]);
        assert_eq!(windows[0].range(), 0..=1);
        assert_eq!(windows[1].range(), 0..=0);
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test]
    async fn context_stops_at_page_boundary() {
        let source = StubPages::new(vec![
            vec![msg(6, Some("a")), msg(5, Some("b")), msg(4, Some("needle"))],
            vec![msg(3, Some("c")), msg(2, Some("d"))],
        ]);
        let conv = conv();
        let pattern = regex("needle");

        let windows = MessageSearch::new(&source, &conv, &pattern, Context::symmetric(5))
            .collect_all()
            .await
            .expect("search");

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].range(), 0..=2);
        assert_eq!(windows[0].page_len(), 3);
        assert!(windows[0].messages().iter().all(|m| m.id.as_str() >= "4"));
    }

    #[tokio::test]
    async fn messages_without_text_never_match() {
        let source = StubPages::new(vec![vec![
            msg(3, None),
            msg(2, Some("match me")),
            msg(1, None),
        ]]);
        let conv = conv();
        let pattern = regex(".*");

        let windows = MessageSearch::new(&source, &conv, &pattern, Context::symmetric(1))
            .collect_all()
            .await
            .expect("search");

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].matched().id.as_str(), "2");
        // Textless neighbours may still appear as context.
        assert_eq!(windows[0].messages().len(), 3);
    }

    #[tokio::test]
    async fn empty_history_yields_nothing() {
        let source = StubPages::new(Vec::new());
        let conv = conv();
        let pattern = regex("anything");

        let mut search = MessageSearch::new(&source, &conv, &pattern, Context::default());
        assert!(search.next_match().await.expect("search").is_none());
        assert!(search.next_match().await.expect("search").is_none());
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn each_fetch_uses_previous_oldest_id() {
        let source = StubPages::new(vec![page(9, 7, "x"), page(6, 4, "x"), page(3, 1, "x")]);
        let conv = conv();
        let pattern = regex("x");

        let windows = MessageSearch::new(&source, &conv, &pattern, Context::default())
            .collect_all()
            .await
            .expect("search");

        assert_eq!(windows.len(), 9);
        assert_eq!(
            source.calls(),
            vec![
                None,
                Some(MessageId::new("7")),
                Some(MessageId::new("4")),
                Some(MessageId::new("1")),
            ]
        );
    }

    #[tokio::test]
    async fn stopping_early_fetches_nothing_more() {
        let source = StubPages::new(vec![page(9, 7, "x"), page(6, 4, "x")]);
        let conv = conv();
        let pattern = regex("x");

        let mut search = MessageSearch::new(&source, &conv, &pattern, Context::default());
        let first = search.next_match().await.expect("search").expect("match");
        assert_eq!(first.matched().id.as_str(), "9");
        assert_eq!(search.fetches(), 1);

        // The last match of page one still needs no second fetch.
        search.next_match().await.expect("search");
        search.next_match().await.expect("search");
        assert_eq!(search.fetches(), 1);
        drop(search);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn repeated_searches_are_identical() {
        let pages = vec![
            vec![msg(8, Some("foo")), msg(7, None), msg(6, Some("bar foo"))],
            vec![msg(5, Some("nope")), msg(4, Some("FOO")), msg(3, Some("food"))],
        ];
        let conv = conv();
        let pattern = regex("foo");

        let first_source = StubPages::new(pages.clone());
        let first = MessageSearch::new(&first_source, &conv, &pattern, Context::symmetric(1))
            .collect_all()
            .await
            .expect("search");
        let second_source = StubPages::new(pages);
        let second = MessageSearch::new(&second_source, &conv, &pattern, Context::symmetric(1))
            .collect_all()
            .await
            .expect("search");

        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        assert_eq!(first_source.calls(), second_source.calls());
    }

    #[tokio::test]
    async fn fetch_error_ends_the_search_after_page_one() {
        let source = StubPages::new(vec![page(6, 4, "x"), page(3, 1, "x"), page(0, 0, "x")])
            .failing_at(1);
        let conv = conv();
        let pattern = regex("x");

        let mut search = MessageSearch::new(&source, &conv, &pattern, Context::default());
        let mut seen = Vec::new();
        let err = loop {
            match search.next_match().await {
                Ok(Some(window)) => seen.push(window.matched().id.to_string()),
                Ok(None) => panic!("expected an error"),
                Err(e) => break e,
            }
        };

        assert_eq!(seen, ["6", "5", "4"]);
        assert_eq!(err.status(), Some(503));
        assert!(search.next_match().await.expect("finished").is_none());
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn page_size_is_forwarded() {
        struct LimitRecorder(Mutex<Vec<usize>>);

        impl MessageSource for LimitRecorder {
            async fn fetch_messages(
                &self,
                _conversation: &Conversation,
                _before: Option<&MessageId>,
                limit: usize,
            ) -> Result<Vec<Message>> {
                self.0.lock().expect("lock").push(limit);
                Ok(Vec::new())
            }
        }

        let recorder = LimitRecorder(Mutex::new(Vec::new()));
        let conv = conv();
        let pattern = regex("x");
        MessageSearch::new(&recorder, &conv, &pattern, Context::default())
            .with_page_size(20)
            .collect_all()
            .await
            .expect("search");
        assert_eq!(*recorder.0.lock().expect("lock"), vec![20]);
    }
}
