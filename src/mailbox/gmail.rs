//! Gmail REST v1 adapter for `MailboxGateway`.
//!
//! Owns the only place where provider failures are mapped onto
//! `MailboxError::ExpiredCredential` (see `classify_api_failure`).

use std::sync::Arc;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use futures::future::try_join_all;
use lettre::message::{Mailbox, header::ContentType};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use crate::auth::GoogleOAuth;
use crate::config::GoogleConfig;
use crate::error::{AuthError, MailboxError};
use crate::mailbox::{MailboxGateway, MessageEnvelope};
use crate::store::CredentialBundle;

/// Page size asked of the list endpoint; results are cut to the caller's cap.
const LIST_PAGE_SIZE: &str = "50";
const UNREAD_QUERY: &str = "is:unread";

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GmailMessage {
    id: String,
    #[serde(default)]
    payload: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<MessageHeader>,
}

#[derive(Debug, Deserialize)]
struct MessageHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct ListLabelsResponse {
    #[serde(default)]
    labels: Vec<GmailLabel>,
}

#[derive(Debug, Clone, Deserialize)]
struct GmailLabel {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLabelRequest<'a> {
    name: &'a str,
    label_list_visibility: &'a str,
    message_list_visibility: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    add_label_ids: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct SendRequest {
    raw: String,
}

#[derive(Debug, Deserialize)]
struct Ignored {}

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a non-success Gmail response onto a mailbox error.
///
/// HTTP 401, or a body mentioning `invalid_grant` / `reconnect`, means the
/// user has to authorize again.
pub fn classify_api_failure(status: u16, body: &str) -> MailboxError {
    let lower = body.to_lowercase();
    if status == 401 || lower.contains("invalid_grant") || lower.contains("reconnect") {
        MailboxError::ExpiredCredential(format!("Gmail returned {status}"))
    } else {
        MailboxError::Api {
            status,
            body: body.to_string(),
        }
    }
}

fn header_value(headers: &[MessageHeader], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

fn to_envelope(message: GmailMessage) -> MessageEnvelope {
    let headers = message
        .payload
        .map(|p| p.headers)
        .unwrap_or_default();
    MessageEnvelope {
        id: message.id,
        from: header_value(&headers, "From").unwrap_or_else(|| "Unknown".to_string()),
        subject: header_value(&headers, "Subject").unwrap_or_else(|| "(No Subject)".to_string()),
        date: header_value(&headers, "Date").unwrap_or_default(),
    }
}

/// RFC 5322 plain-text message, base64url-encoded for `messages.send`.
fn build_raw_message(from: &str, to: &str, subject: &str, body: &str) -> Result<String, MailboxError> {
    let from: Mailbox = from
        .parse()
        .map_err(|e| MailboxError::Send(format!("invalid sender address '{from}': {e}")))?;
    let to: Mailbox = to
        .parse()
        .map_err(|e| MailboxError::Send(format!("invalid recipient address '{to}': {e}")))?;

    let message = lettre::Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| MailboxError::Send(e.to_string()))?;

    Ok(URL_SAFE_NO_PAD.encode(message.formatted()))
}

// ── Gateway ─────────────────────────────────────────────────────────

/// Gmail-backed mailbox gateway.
pub struct GmailGateway {
    http: reqwest::Client,
    base_url: String,
    oauth: Arc<GoogleOAuth>,
}

impl GmailGateway {
    pub fn new(config: &GoogleConfig, oauth: Arc<GoogleOAuth>) -> Result<Self, MailboxError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| MailboxError::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.gmail_endpoint.trim_end_matches('/').to_string(),
            oauth,
        })
    }

    /// Access token to use now, refreshing first if it has expired.
    async fn access_token(
        &self,
        credential: &CredentialBundle,
    ) -> Result<SecretString, MailboxError> {
        if !credential.is_expired(Utc::now()) {
            return Ok(credential.access_token.clone());
        }

        debug!("Access token expired, refreshing");
        match self.oauth.refresh(credential).await {
            Ok(fresh) => Ok(fresh.access_token),
            Err(AuthError::InvalidGrant(reason)) => {
                warn!(%reason, "Refresh token rejected");
                Err(MailboxError::ExpiredCredential(reason))
            }
            Err(e) => Err(MailboxError::Http(e.to_string())),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/users/me/{}", self.base_url, path)
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, MailboxError> {
        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| MailboxError::Http(format!("invalid Gmail response: {e}")))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(classify_api_failure(status.as_u16(), &body))
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &SecretString,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MailboxError> {
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| MailboxError::Http(e.to_string()))?;
        Self::handle_response(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        token: &SecretString,
        path: &str,
        body: &B,
    ) -> Result<T, MailboxError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| MailboxError::Http(e.to_string()))?;
        Self::handle_response(response).await
    }

    async fn post_empty(&self, token: &SecretString, path: &str) -> Result<(), MailboxError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token.expose_secret())
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await
            .map_err(|e| MailboxError::Http(e.to_string()))?;
        let _: Ignored = Self::handle_response(response).await?;
        Ok(())
    }

    async fn fetch_envelope(
        &self,
        token: &SecretString,
        id: &str,
    ) -> Result<MessageEnvelope, MailboxError> {
        let message: GmailMessage = self
            .get_json(
                token,
                &format!("messages/{id}"),
                &[
                    ("format", "metadata"),
                    ("metadataHeaders", "From"),
                    ("metadataHeaders", "Subject"),
                    ("metadataHeaders", "Date"),
                ],
            )
            .await?;
        Ok(to_envelope(message))
    }

    async fn find_or_create_label(
        &self,
        token: &SecretString,
        label_name: &str,
    ) -> Result<GmailLabel, MailboxError> {
        let listed: ListLabelsResponse = self.get_json(token, "labels", &[]).await?;
        if let Some(label) = listed
            .labels
            .into_iter()
            .find(|l| l.name.to_lowercase() == label_name.to_lowercase())
        {
            return Ok(label);
        }

        info!(label = label_name, "Creating Gmail label");
        self.post_json(
            token,
            "labels",
            &CreateLabelRequest {
                name: label_name,
                label_list_visibility: "labelShow",
                message_list_visibility: "show",
            },
        )
        .await
    }
}

/// Keep the expiry signal; wrap anything else in the operation's error.
fn op_error(err: MailboxError, wrap: fn(String) -> MailboxError) -> MailboxError {
    match err {
        MailboxError::ExpiredCredential(_) => err,
        other => wrap(other.to_string()),
    }
}

#[async_trait]
impl MailboxGateway for GmailGateway {
    async fn list_unread(
        &self,
        credential: &CredentialBundle,
        cap: usize,
    ) -> Result<Vec<MessageEnvelope>, MailboxError> {
        let token = self.access_token(credential).await?;
        let listed: ListMessagesResponse = self
            .get_json(
                &token,
                "messages",
                &[("q", UNREAD_QUERY), ("maxResults", LIST_PAGE_SIZE)],
            )
            .await
            .map_err(|e| op_error(e, MailboxError::Read))?;

        let envelopes = try_join_all(
            listed
                .messages
                .iter()
                .take(cap)
                .map(|m| self.fetch_envelope(&token, &m.id)),
        )
        .await
        .map_err(|e| op_error(e, MailboxError::Read))?;

        debug!(count = envelopes.len(), "Listed unread messages");
        Ok(envelopes)
    }

    async fn send(
        &self,
        credential: &CredentialBundle,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailboxError> {
        let token = self.access_token(credential).await?;
        let profile: Profile = self
            .get_json(&token, "profile", &[])
            .await
            .map_err(|e| op_error(e, MailboxError::Send))?;

        let raw = build_raw_message(&profile.email_address, to, subject, body)?;
        let _: Ignored = self
            .post_json(&token, "messages/send", &SendRequest { raw })
            .await
            .map_err(|e| op_error(e, MailboxError::Send))?;

        info!(to, "Email sent");
        Ok(())
    }

    async fn trash(
        &self,
        credential: &CredentialBundle,
        ids: &[String],
    ) -> Result<usize, MailboxError> {
        let token = self.access_token(credential).await?;
        let token = &token;
        try_join_all(
            ids.iter()
                .map(|id| async move { self.post_empty(token, &format!("messages/{id}/trash")).await }),
        )
        .await
        .map_err(|e| op_error(e, MailboxError::Trash))?;

        info!(count = ids.len(), "Messages trashed");
        Ok(ids.len())
    }

    async fn ensure_label_and_apply(
        &self,
        credential: &CredentialBundle,
        id: &str,
        label_name: &str,
    ) -> Result<(), MailboxError> {
        let token = self.access_token(credential).await?;
        let label = self
            .find_or_create_label(&token, label_name)
            .await
            .map_err(|e| op_error(e, MailboxError::Label))?;

        let _: Ignored = self
            .post_json(
                &token,
                &format!("messages/{id}/modify"),
                &ModifyRequest {
                    add_label_ids: [label.id.as_str()],
                },
            )
            .await
            .map_err(|e| op_error(e, MailboxError::Label))?;

        debug!(message_id = id, label = %label.name, "Label applied");
        Ok(())
    }
}
