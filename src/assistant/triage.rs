//! Triage classifier: subject line → category.
//!
//! Rules are plain case-insensitive substring checks evaluated in a fixed
//! order. Spam is checked before promotions.

use serde::{Deserialize, Serialize};

use crate::mailbox::MessageEnvelope;

/// Triage category for an unread email.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Needs a human answer.
    #[default]
    Reply,
    Spam,
    Promotions,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Spam => "spam",
            Self::Promotions => "promotions",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const SPAM_MARKERS: &[&str] = &["spam", "unsubscribe"];
const PROMOTION_MARKERS: &[&str] = &["promo", "offer", "deal", "sale"];

/// Classify a message by its subject.
pub fn classify(subject: &str) -> Category {
    let lower = subject.to_lowercase();
    if SPAM_MARKERS.iter().any(|m| lower.contains(m)) {
        Category::Spam
    } else if PROMOTION_MARKERS.iter().any(|m| lower.contains(m)) {
        Category::Promotions
    } else {
        Category::Reply
    }
}

/// A triaged unread email, as shown to (and addressed by) the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSummary {
    /// Provider message id.
    pub id: String,
    /// Raw `From` header, e.g. `Alice <alice@example.com>`.
    pub from: String,
    pub subject: String,
    pub date: String,
    #[serde(default)]
    pub category: Category,
}

impl EmailSummary {
    /// Triage one envelope returned by the mailbox.
    pub fn from_envelope(envelope: MessageEnvelope) -> Self {
        let category = classify(&envelope.subject);
        Self {
            id: envelope.id,
            from: envelope.from,
            subject: envelope.subject,
            date: envelope.date,
            category,
        }
    }
}

/// Triage a whole listing, keeping provider order.
pub fn triage_all(envelopes: Vec<MessageEnvelope>) -> Vec<EmailSummary> {
    envelopes.into_iter().map(EmailSummary::from_envelope).collect()
}

/// A listing split by category, each bucket in provider order.
#[derive(Debug, Default)]
pub struct TriageBuckets {
    pub reply: Vec<EmailSummary>,
    pub spam: Vec<EmailSummary>,
    pub promotions: Vec<EmailSummary>,
}

impl TriageBuckets {
    pub fn partition(emails: Vec<EmailSummary>) -> Self {
        let mut buckets = Self::default();
        for email in emails {
            match email.category {
                Category::Reply => buckets.reply.push(email),
                Category::Spam => buckets.spam.push(email),
                Category::Promotions => buckets.promotions.push(email),
            }
        }
        buckets
    }

    pub fn total(&self) -> usize {
        self.reply.len() + self.spam.len() + self.promotions.len()
    }
}
