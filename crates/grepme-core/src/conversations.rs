//! Enumeration of the conversations the caller can search.

use regex::Regex;

use crate::Result;
use crate::groupme::models::{Conversation, ConversationKind};
use crate::paging::ConversationPager;
use crate::source::ConversationSource;

/// Lazily lists conversations of one kind, optionally filtered by name.
#[derive(Debug)]
pub struct ConversationEnumerator<'a, S> {
    pager: ConversationPager<'a, S>,
    name_pattern: Option<&'a Regex>,
    buffered: std::vec::IntoIter<Conversation>,
}

impl<'a, S: ConversationSource> ConversationEnumerator<'a, S> {
    /// Enumerate conversations of `kind`. With a `name_pattern`, only
    /// conversations whose name contains a match are yielded.
    #[must_use]
    pub fn new(source: &'a S, kind: ConversationKind, name_pattern: Option<&'a Regex>) -> Self {
        Self {
            pager: ConversationPager::new(source, kind),
            name_pattern,
            buffered: Vec::new().into_iter(),
        }
    }

    /// Yield the next conversation, fetching the next page when the current
    /// one is used up. Ends at the first empty page.
    ///
    /// # Errors
    ///
    /// Returns the source's fetch error; enumeration ends with it.
    pub async fn next_conversation(&mut self) -> Result<Option<Conversation>> {
        loop {
            for conversation in self.buffered.by_ref() {
                if self
                    .name_pattern
                    .is_none_or(|pattern| pattern.is_match(&conversation.name))
                {
                    return Ok(Some(conversation));
                }
            }

            match self.pager.next_page().await? {
                Some(page) => self.buffered = page.into_iter(),
                None => return Ok(None),
            }
        }
    }

    /// Drain the enumeration into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error.
    pub async fn collect_all(mut self) -> Result<Vec<Conversation>> {
        let mut conversations = Vec::new();
        while let Some(conversation) = self.next_conversation().await? {
            conversations.push(conversation);
        }
        Ok(conversations)
    }
}
