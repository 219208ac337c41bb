//! Backend surface consumed by the inbox.
//!
//! Every call resolves to an [`ApiEnvelope`]; transport failures never escape
//! as panics or raw errors, they become `{success: false, status: 500}`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value;

use kudos_shared::types::api::{ApiEnvelope, InnerEnvelope};
use kudos_shared::ClientError;

use crate::config::InboxConfig;
use crate::models::{ConversationPreview, Notification};

pub const NOTIFICATIONS_PATH: &str = "/notifications/";
pub const MARK_MESSAGES_READ_PATH: &str = "/notifications/mark-messages-read";

/// Body of `PATCH /notifications/`. Omitted flags are left alone server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPatch {
    #[serde(serialize_with = "wire_id")]
    pub notification_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_is_read: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_is_seen: Option<bool>,
}

impl NotificationPatch {
    pub fn read(id: impl Into<String>) -> Self {
        Self {
            notification_id: id.into(),
            notification_is_read: Some(true),
            notification_is_seen: None,
        }
    }

    pub fn seen(id: impl Into<String>) -> Self {
        Self {
            notification_id: id.into(),
            notification_is_read: None,
            notification_is_seen: Some(true),
        }
    }
}

/// Numeric ids go back out as JSON numbers, anything else as a string.
fn wire_id<S: Serializer>(id: &str, serializer: S) -> Result<S::Ok, S::Error> {
    match id.parse::<i64>() {
        Ok(n) => serializer.serialize_i64(n),
        Err(_) => serializer.serialize_str(id),
    }
}

#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// `GET /notifications/`
    async fn fetch_notifications(&self) -> ApiEnvelope<Vec<Notification>>;

    /// `PATCH /notifications/`
    async fn update_notification(&self, patch: &NotificationPatch) -> ApiEnvelope<Value>;

    /// `PUT /notifications/mark-messages-read`
    async fn mark_messages_read(&self) -> ApiEnvelope<Value>;

    /// Conversation previews, with the nested envelope already collapsed.
    async fn fetch_conversation_previews(&self) -> ApiEnvelope<Vec<ConversationPreview>>;
}

#[derive(Clone)]
pub struct HttpNotificationApi {
    client: Client,
    base_url: String,
    previews_path: String,
}

impl HttpNotificationApi {
    pub fn new(config: &InboxConfig) -> Result<Self, ClientError> {
        // credentials ride along in the session cookie
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::Transport {
                status: kudos_shared::types::api::TRANSPORT_FAILURE_STATUS,
                message: format!("failed to build http client: {e}"),
            })?;

        Ok(Self::with_client(client, &config.api_base_url, &config.previews_path))
    }

    pub fn with_client(client: Client, base_url: &str, previews_path: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            previews_path: previews_path.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiEnvelope<T> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "request failed before a response arrived");
                return ApiEnvelope::transport_failure(e.to_string());
            }
        };

        let status = response.status();
        match response.json::<ApiEnvelope<T>>().await {
            Ok(envelope) if status.is_success() => envelope.with_status(status.as_u16()),
            Ok(envelope) => {
                let message = envelope
                    .error
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
                ApiEnvelope::failure(status.as_u16(), message)
            }
            Err(e) if status.is_success() => {
                tracing::warn!(status = status.as_u16(), error = %e, "undecodable response body");
                ApiEnvelope::failure(status.as_u16(), format!("malformed response: {e}"))
            }
            Err(_) => ApiEnvelope::failure(status.as_u16(), format!("HTTP {}", status.as_u16())),
        }
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn fetch_notifications(&self) -> ApiEnvelope<Vec<Notification>> {
        let request = self.client.get(self.url(NOTIFICATIONS_PATH));
        self.send(request).await
    }

    async fn update_notification(&self, patch: &NotificationPatch) -> ApiEnvelope<Value> {
        tracing::debug!(notification_id = %patch.notification_id, "updating notification state");
        let request = self.client.patch(self.url(NOTIFICATIONS_PATH)).json(patch);
        self.send(request).await
    }

    async fn mark_messages_read(&self) -> ApiEnvelope<Value> {
        let request = self.client.put(self.url(MARK_MESSAGES_READ_PATH));
        self.send(request).await
    }

    async fn fetch_conversation_previews(&self) -> ApiEnvelope<Vec<ConversationPreview>> {
        let request = self.client.get(self.url(&self.previews_path));
        self.send::<InnerEnvelope<Vec<ConversationPreview>>>(request)
            .await
            .flatten()
    }
}
