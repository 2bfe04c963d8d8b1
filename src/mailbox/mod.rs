//! Mailbox gateway: the narrow contract the router uses to touch mail.

pub mod gmail;

pub use gmail::GmailGateway;

use async_trait::async_trait;

use crate::error::MailboxError;
use crate::store::CredentialBundle;

/// Header metadata of one unread message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub id: String,
    /// Raw `From` header.
    pub from: String,
    pub subject: String,
    pub date: String,
}

/// Remote mailbox operations.
///
/// Any call may fail with `MailboxError::ExpiredCredential`; adapters are
/// responsible for recognising that case.
#[async_trait]
pub trait MailboxGateway: Send + Sync {
    /// Up to `cap` unread messages, in provider order.
    async fn list_unread(
        &self,
        credential: &CredentialBundle,
        cap: usize,
    ) -> Result<Vec<MessageEnvelope>, MailboxError>;

    async fn send(
        &self,
        credential: &CredentialBundle,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailboxError>;

    /// Move messages to trash; returns how many were removed.
    async fn trash(
        &self,
        credential: &CredentialBundle,
        ids: &[String],
    ) -> Result<usize, MailboxError>;

    /// Find or create the label (case-insensitive) and attach it to `id`.
    async fn ensure_label_and_apply(
        &self,
        credential: &CredentialBundle,
        id: &str,
        label_name: &str,
    ) -> Result<(), MailboxError>;
}

/// Address inside `<...>`, or the whole string when there are no brackets.
pub fn extract_address(from: &str) -> &str {
    from.find('<')
        .and_then(|start| {
            let rest = &from[start + 1..];
            rest.find('>').map(|end| &rest[..end])
        })
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .unwrap_or_else(|| from.trim())
}

/// Sender as shown to the user: the part before `<...>`, unquoted.
pub fn display_name(from: &str) -> &str {
    let name = match from.find('<') {
        Some(start) => from[..start].trim(),
        None => from.trim(),
    };
    let name = name.trim_matches('"').trim();
    if name.is_empty() {
        extract_address(from)
    } else {
        name
    }
}
