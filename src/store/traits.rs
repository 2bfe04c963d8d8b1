//! `UserStore`: the persistence contract for user records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::store::model::{CredentialBundle, UserRecord};

/// Backend-agnostic storage for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Load the record for `identity`, creating it with defaults if absent.
    async fn find_or_create(&self, identity: &str) -> Result<UserRecord, DatabaseError>;

    /// Persist preferences, reminder settings and the reference list.
    ///
    /// The credential column is owned by `set_credential` and never
    /// written here.
    async fn save(&self, user: &UserRecord) -> Result<(), DatabaseError>;

    /// Attach a mailbox credential, creating the user if needed.
    async fn set_credential(
        &self,
        identity: &str,
        credential: &CredentialBundle,
    ) -> Result<(), DatabaseError>;

    /// Move `last_checked` forward without touching any other column.
    async fn touch_last_checked(
        &self,
        identity: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;

    /// All users that have a credential bundle.
    async fn list_connected(&self) -> Result<Vec<UserRecord>, DatabaseError>;
}
