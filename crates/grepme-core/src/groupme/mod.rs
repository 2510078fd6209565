//! GroupMe API client and authentication module.
//!
//! This module provides:
//! - Access token resolution and storage
//! - A REST client for message history and conversation listings
//! - Wire models for messages and conversations

pub mod auth;
pub mod client;
pub mod models;
pub mod storage;

pub use auth::{AccessToken, AuthManager};
pub use client::GroupMeClient;
pub use models::{Conversation, ConversationKind, Message, MessageId};
pub use storage::TokenStorage;
