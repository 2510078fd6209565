//! Core library for grepme - grep for GroupMe.
//!
//! This crate provides:
//! - Configuration loading and management
//! - XDG-compliant path resolution
//! - Config schema generation
//! - GroupMe API client and access token handling
//! - Lazy, paginated history search with context windows
//! - Conversation enumeration and terminal presentation
//! - Common types and error handling

pub mod config;
pub mod conversations;
pub mod error;
pub mod groupme;
pub mod paging;
pub mod paths;
pub mod pattern;
pub mod present;
pub mod schema;
pub mod search;
pub mod source;

pub use config::{AppConfig, LogLevel, LoggingConfig, PathsConfig};
pub use conversations::ConversationEnumerator;
pub use error::{CoreError, Result};
pub use groupme::{
    AccessToken, AuthManager, Conversation, ConversationKind, GroupMeClient, Message, MessageId,
};
pub use paths::{AppPaths, default_data_dir};
pub use pattern::build_alternation;
pub use present::{PresentOptions, Presenter};
pub use schema::generate_schema;
pub use search::{Context, MatchWindow, MessageSearch};
pub use source::{ConversationSource, MessageSource};

/// Application name used for config directories and environment prefix.
pub const APP_NAME: &str = "grepme";

/// Returns the environment variable prefix for this application.
#[must_use]
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
