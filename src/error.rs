//! Error types for Mail Assist.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Messaging channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Mailbox gateway errors.
///
/// `ExpiredCredential` is the only variant the core treats specially; the
/// adapter decides when a provider failure means the grant is gone.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Mailbox credential expired or revoked: {0}")]
    ExpiredCredential(String),

    #[error("Mailbox request failed ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Mailbox HTTP error: {0}")]
    Http(String),

    #[error("Failed to read inbox: {0}")]
    Read(String),

    #[error("Failed to send email: {0}")]
    Send(String),

    #[error("Failed to delete emails: {0}")]
    Trash(String),

    #[error("Failed to label email: {0}")]
    Label(String),
}

impl MailboxError {
    /// Whether this failure means the user must re-authorize.
    pub fn is_expired_credential(&self) -> bool {
        matches!(self, Self::ExpiredCredential(_))
    }
}

/// OAuth authorization errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid authorization endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Authorization code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("Token refresh rejected: {0}")]
    InvalidGrant(String),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Failure classes of one conversational turn.
///
/// Every variant is rendered into a reply; none escapes `handle_turn`.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("mailbox authorization expired")]
    ExpiredCredential,

    #[error(transparent)]
    NotFound(#[from] crate::assistant::references::ReferenceError),

    #[error("malformed {0} command")]
    Malformed(&'static str),

    #[error("{0}")]
    Mailbox(MailboxError),

    #[error("{0}")]
    Generator(#[from] LlmError),

    #[error("{0}")]
    Store(#[from] DatabaseError),
}

impl From<MailboxError> for TurnError {
    fn from(err: MailboxError) -> Self {
        if err.is_expired_credential() {
            Self::ExpiredCredential
        } else {
            Self::Mailbox(err)
        }
    }
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
