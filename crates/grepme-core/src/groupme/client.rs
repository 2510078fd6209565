//! GroupMe API client.
//!
//! Every call is a `GET` against the v3 REST API with the access token passed
//! as the `token` query parameter. Responses are wrapped in
//! `{"response": ..., "meta": {...}}`; a `304 Not Modified` means there is
//! nothing (more) to return and is reported as an empty page.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::CoreError;
use crate::groupme::auth::AccessToken;
use crate::groupme::models::{
    ChatRecord, Conversation, ConversationKind, DirectMessages, Envelope, GroupMessages,
    GroupRecord, Message, MessageId,
};
use crate::source::{ConversationSource, MessageSource};

/// Longest body excerpt kept in fetch errors.
const ERROR_BODY_LIMIT: usize = 200;

/// GroupMe API client.
#[derive(Debug)]
pub struct GroupMeClient {
    http_client: Client,
    base_url: String,
    token: AccessToken,
}

impl GroupMeClient {
    /// Public GroupMe API endpoint.
    pub const DEFAULT_BASE_URL: &str = "https://api.groupme.com/v3";

    /// Create a client for `base_url` authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(base_url: &str, token: AccessToken, timeout: Duration) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("grepme/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoreError::Http(format!("creating HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Get messages from a group, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API answers with an error status.
    pub async fn group_messages(
        &self,
        group_id: &str,
        before: Option<&MessageId>,
        limit: usize,
    ) -> Result<Vec<Message>, CoreError> {
        let path = format!("/groups/{}/messages", urlencoding::encode(group_id));
        let mut params = vec![("limit", limit.to_string())];
        if let Some(before) = before {
            params.push(("before_id", before.to_string()));
        }

        let page: Option<GroupMessages> = self
            .get(&path, &params, &format!("messages of group {group_id}"))
            .await?;
        Ok(page.map(|p| p.messages).unwrap_or_default())
    }

    /// Get direct messages exchanged with another user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API answers with an error status.
    pub async fn direct_messages(
        &self,
        other_user_id: &str,
        before: Option<&MessageId>,
        limit: usize,
    ) -> Result<Vec<Message>, CoreError> {
        let mut params = vec![
            ("other_user_id", other_user_id.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(before) = before {
            params.push(("before_id", before.to_string()));
        }

        let page: Option<DirectMessages> = self
            .get(
                "/direct_messages",
                &params,
                &format!("direct messages with user {other_user_id}"),
            )
            .await?;
        Ok(page.map(|p| p.direct_messages).unwrap_or_default())
    }

    /// List one page of the user's groups.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API answers with an error status.
    pub async fn list_groups(&self, page: u32, per_page: usize) -> Result<Vec<Conversation>, CoreError> {
        let params = [
            ("omit", "memberships".to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        let groups: Option<Vec<GroupRecord>> = self
            .get("/groups", &params, &format!("group list page {page}"))
            .await?;
        Ok(groups
            .unwrap_or_default()
            .into_iter()
            .map(Conversation::from)
            .collect())
    }

    /// List one page of the user's direct chats.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API answers with an error status.
    pub async fn list_direct_chats(
        &self,
        page: u32,
        per_page: usize,
    ) -> Result<Vec<Conversation>, CoreError> {
        let params = [
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        let chats: Option<Vec<ChatRecord>> = self
            .get("/chats", &params, &format!("chat list page {page}"))
            .await?;
        Ok(chats
            .unwrap_or_default()
            .into_iter()
            .map(Conversation::from)
            .collect())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        context: &str,
    ) -> Result<Option<T>, CoreError> {
        let url = format!("{}{path}", self.base_url);
        log::debug!("GET {url} {params:?}");

        let response = self
            .http_client
            .get(&url)
            .query(params)
            .query(&[("token", self.token.secret())])
            .send()
            .await
            .map_err(|e| CoreError::Http(format!("request for {context} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::Http(format!("reading {context}: {e}")))?;

        decode_response(status, &body, context)
    }
}

/// Map a status and body to the `response` payload.
///
/// `Ok(None)` covers both 304 and a 2xx whose `response` is null or missing.
fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    context: &str,
) -> Result<Option<T>, CoreError> {
    if status == StatusCode::NOT_MODIFIED {
        log::debug!("{context}: not modified");
        return Ok(None);
    }

    if !status.is_success() {
        return Err(CoreError::Fetch {
            status: status.as_u16(),
            context: format!("{context} - {}", excerpt(body)),
        });
    }

    if body.trim().is_empty() {
        return Ok(None);
    }

    let envelope: Envelope<T> = serde_json::from_str(body)
        .map_err(|e| CoreError::Serialization(format!("parsing {context}: {e}")))?;
    Ok(envelope.response)
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_BODY_LIMIT {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(ERROR_BODY_LIMIT).collect();
        format!("{cut}...")
    }
}

impl MessageSource for GroupMeClient {
    async fn fetch_messages(
        &self,
        conversation: &Conversation,
        before: Option<&MessageId>,
        limit: usize,
    ) -> Result<Vec<Message>, CoreError> {
        match conversation.kind {
            ConversationKind::Group => self.group_messages(&conversation.id, before, limit).await,
            ConversationKind::Direct => self.direct_messages(&conversation.id, before, limit).await,
        }
    }
}

impl ConversationSource for GroupMeClient {
    async fn list_conversations(
        &self,
        kind: ConversationKind,
        page: u32,
        per_page: usize,
    ) -> Result<Vec<Conversation>, CoreError> {
        match kind {
            ConversationKind::Group => self.list_groups(page, per_page).await,
            ConversationKind::Direct => self.list_direct_chats(page, per_page).await,
        }
    }
}
