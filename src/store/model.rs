//! User record and the credential bundle stored with it.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::assistant::command::DEFAULT_REMINDER_MINUTES;
use crate::assistant::references::ReferenceList;
use crate::error::DatabaseError;

/// Reply-writing preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub tone: String,
    pub signature: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            tone: "professional".to_string(),
            signature: "Regards".to_string(),
        }
    }
}

/// Mailbox OAuth tokens for one user.
///
/// Tokens are `SecretString` so they never show up in `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct CredentialBundle {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
}

/// Plain mirror of `CredentialBundle` for the JSON column.
#[derive(Serialize, Deserialize)]
struct StoredCredential {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
}

impl CredentialBundle {
    /// Refresh this long before the provider's stated expiry.
    const EXPIRY_SKEW_SECS: i64 = 60;

    /// Bundle with only an access token (no refresh, no expiry).
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: None,
            expires_at: None,
            scope: None,
            token_type: None,
        }
    }

    /// Whether the access token should be refreshed before use.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at - Duration::seconds(Self::EXPIRY_SKEW_SECS) <= now)
    }

    pub fn to_json(&self) -> Result<String, DatabaseError> {
        let stored = StoredCredential {
            access_token: self.access_token.expose_secret().to_string(),
            refresh_token: self
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            expires_at: self.expires_at,
            scope: self.scope.clone(),
            token_type: self.token_type.clone(),
        };
        serde_json::to_string(&stored).map_err(|e| DatabaseError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, DatabaseError> {
        let stored: StoredCredential = serde_json::from_str(json)
            .map_err(|e| DatabaseError::Serialization(format!("credential: {e}")))?;
        Ok(Self {
            access_token: SecretString::from(stored.access_token),
            refresh_token: stored.refresh_token.map(SecretString::from),
            expires_at: stored.expires_at,
            scope: stored.scope,
            token_type: stored.token_type,
        })
    }
}

/// Everything stored about one messaging-channel user.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Channel address, e.g. a phone number without the `whatsapp:` prefix.
    pub identity: String,
    /// `None` until the user completes the mailbox authorization.
    pub credential: Option<CredentialBundle>,
    pub preferences: Preferences,
    /// Minutes between unread-mail reminders.
    pub reminder_interval_minutes: u32,
    pub last_checked: DateTime<Utc>,
    /// Emails from the last summary, addressable by position.
    pub references: ReferenceList,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// A fresh record with defaults.
    pub fn new(identity: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            identity: identity.into(),
            credential: None,
            preferences: Preferences::default(),
            reminder_interval_minutes: DEFAULT_REMINDER_MINUTES,
            last_checked: now,
            references: ReferenceList::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a reminder check is due.
    pub fn reminder_due(&self, now: DateTime<Utc>) -> bool {
        self.last_checked + Duration::minutes(i64::from(self.reminder_interval_minutes)) <= now
    }
}
