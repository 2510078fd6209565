//! Rendering of match windows for the terminal.

use std::fmt::Write as _;
use std::io::{self, Write};

use chrono::DateTime;
use regex::Regex;
use serde_json::json;

use crate::groupme::models::{Conversation, Message};
use crate::search::MatchWindow;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const PURPLE: &str = "\x1b[35m";
const RESET: &str = "\x1b[0m";

/// Default `strftime` format for message dates (locale date and time).
pub const DEFAULT_DATE_FORMAT: &str = "%c";

/// What to show for each message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentOptions {
    /// Prefix each line with the sender's name.
    pub show_author: bool,
    /// Prefix each line with the send time.
    pub show_date: bool,
    /// Emit ANSI colors and highlight matches.
    pub color: bool,
}

impl Default for PresentOptions {
    fn default() -> Self {
        Self {
            show_author: true,
            show_date: false,
            color: false,
        }
    }
}

/// Writes match windows as `[date: ][author: ]text` lines, oldest first.
#[derive(Debug, Clone)]
pub struct Presenter {
    options: PresentOptions,
    date_format: String,
}

impl Presenter {
    /// Create a presenter using `date_format` (chrono `strftime` syntax).
    #[must_use]
    pub fn new(options: PresentOptions, date_format: impl Into<String>) -> Self {
        Self {
            options,
            date_format: date_format.into(),
        }
    }

    /// Display options in effect.
    #[must_use]
    pub const fn options(&self) -> PresentOptions {
        self.options
    }

    /// Write every message of `window` in reading order.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn write_window<W: Write>(
        &self,
        out: &mut W,
        window: &MatchWindow,
        pattern: &Regex,
    ) -> io::Result<()> {
        for message in window.chronological() {
            self.write_message(out, message, pattern)?;
        }
        Ok(())
    }

    /// Write one message line.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer.
    pub fn write_message<W: Write>(
        &self,
        out: &mut W,
        message: &Message,
        pattern: &Regex,
    ) -> io::Result<()> {
        let color = self.options.color;
        let mut line = String::new();

        if self.options.show_date {
            if color {
                line.push_str(GREEN);
            }
            line.push_str(&self.format_date(message.created_at));
            line.push_str(": ");
        }
        if self.options.show_author {
            if color {
                line.push_str(PURPLE);
            }
            line.push_str(&message.author_name);
            line.push_str(": ");
        }
        if color {
            line.push_str(RESET);
        }

        let text = message.text.as_deref().unwrap_or_default();
        if color {
            line.push_str(&highlight(text, pattern));
        } else {
            line.push_str(text);
        }

        writeln!(out, "{line}")
    }

    /// Write `window` as a single JSON line.
    ///
    /// # Errors
    ///
    /// Returns any error from the underlying writer or serializer.
    pub fn write_json<W: Write>(
        &self,
        out: &mut W,
        conversation: &Conversation,
        window: &MatchWindow,
    ) -> io::Result<()> {
        let matched_id = &window.matched().id;
        let messages: Vec<_> = window
            .chronological()
            .map(|m| {
                json!({
                    "id": m.id,
                    "name": m.author_name,
                    "created_at": m.created_at,
                    "date": self.format_date(m.created_at),
                    "text": m.text,
                    "matched": &m.id == matched_id,
                })
            })
            .collect();

        let record = json!({
            "conversation": conversation,
            "messages": messages,
        });
        serde_json::to_writer(&mut *out, &record)?;
        writeln!(out)
    }

    /// Format a unix timestamp in UTC. Falls back to the raw number when the
    /// timestamp is out of range or the format string is invalid.
    #[must_use]
    pub fn format_date(&self, timestamp: i64) -> String {
        let Some(date) = DateTime::from_timestamp(timestamp, 0) else {
            return timestamp.to_string();
        };
        let mut formatted = String::new();
        if write!(formatted, "{}", date.format(&self.date_format)).is_err() {
            log::warn!("invalid date format {:?}", self.date_format);
            return timestamp.to_string();
        }
        formatted
    }
}

/// Wrap every non-empty match of `pattern` in red.
#[must_use]
pub fn highlight(text: &str, pattern: &Regex) -> String {
    let mut result = String::with_capacity(text.len() + 16);
    let mut pos = 0;
    for found in pattern.find_iter(text) {
        if found.is_empty() {
            continue;
        }
        result.push_str(&text[pos..found.start()]);
        result.push_str(RED);
        result.push_str(found.as_str());
        result.push_str(RESET);
        pos = found.end();
    }
    result.push_str(&text[pos..]);
    result
}
