//! libSQL backend: async `UserStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::assistant::command::DEFAULT_REMINDER_MINUTES;
use crate::assistant::references::ReferenceList;
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::model::{CredentialBundle, Preferences, UserRecord};
use crate::store::traits::UserStore;

const USER_COLUMNS: &str = "identity, credential, tone, signature, reminder_interval, \
                            last_checked, reference_list, created_at, updated_at";

/// libSQL database backend.
///
/// Holds a single connection reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn get_user(&self, identity: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE identity = ?1"),
                params![identity],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_user(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_user(row: &libsql::Row) -> Result<UserRecord, DatabaseError> {
    let column = |e: libsql::Error| DatabaseError::Query(format!("user row parse: {e}"));

    let identity: String = row.get(0).map_err(column)?;
    let credential_json: Option<String> = row.get(1).map_err(column)?;
    let tone: String = row.get(2).map_err(column)?;
    let signature: String = row.get(3).map_err(column)?;
    let interval: i64 = row.get(4).map_err(column)?;
    let last_checked: String = row.get(5).map_err(column)?;
    let references_json: String = row.get(6).map_err(column)?;
    let created_at: String = row.get(7).map_err(column)?;
    let updated_at: String = row.get(8).map_err(column)?;

    let credential = credential_json
        .as_deref()
        .map(CredentialBundle::from_json)
        .transpose()?;
    let references: ReferenceList = serde_json::from_str(&references_json)
        .map_err(|e| DatabaseError::Serialization(format!("reference_list: {e}")))?;

    Ok(UserRecord {
        identity,
        credential,
        preferences: Preferences { tone, signature },
        reminder_interval_minutes: u32::try_from(interval)
            .ok()
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_REMINDER_MINUTES),
        last_checked: parse_datetime(&last_checked),
        references,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

#[async_trait]
impl UserStore for LibSqlBackend {
    async fn find_or_create(&self, identity: &str) -> Result<UserRecord, DatabaseError> {
        if let Some(user) = self.get_user(identity).await? {
            return Ok(user);
        }

        let user = UserRecord::new(identity);
        let now = user.created_at.to_rfc3339();
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO users (identity, last_checked, created_at, updated_at) \
                 VALUES (?1, ?2, ?2, ?2)",
                params![identity, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_or_create: {e}")))?;
        info!(identity, "Created user record");

        // Re-read so a concurrent insert wins consistently.
        self.get_user(identity)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "user".into(),
                id: identity.to_string(),
            })
    }

    async fn save(&self, user: &UserRecord) -> Result<(), DatabaseError> {
        let references = serde_json::to_string(&user.references)
            .map_err(|e| DatabaseError::Serialization(format!("reference_list: {e}")))?;
        let now = Utc::now().to_rfc3339();

        self.conn()
            .execute(
                "INSERT INTO users (identity, tone, signature, reminder_interval, \
                                    last_checked, reference_list, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(identity) DO UPDATE SET \
                    tone = excluded.tone, \
                    signature = excluded.signature, \
                    reminder_interval = excluded.reminder_interval, \
                    last_checked = excluded.last_checked, \
                    reference_list = excluded.reference_list, \
                    updated_at = excluded.updated_at",
                params![
                    user.identity.as_str(),
                    user.preferences.tone.as_str(),
                    user.preferences.signature.as_str(),
                    i64::from(user.reminder_interval_minutes),
                    user.last_checked.to_rfc3339(),
                    references,
                    user.created_at.to_rfc3339(),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save user: {e}")))?;

        debug!(identity = %user.identity, references = user.references.len(), "User saved");
        Ok(())
    }

    async fn set_credential(
        &self,
        identity: &str,
        credential: &CredentialBundle,
    ) -> Result<(), DatabaseError> {
        let json = credential.to_json()?;
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO users (identity, credential, last_checked, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?3, ?3) \
                 ON CONFLICT(identity) DO UPDATE SET \
                    credential = excluded.credential, \
                    updated_at = excluded.updated_at",
                params![identity, json, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_credential: {e}")))?;

        info!(identity, "Mailbox credential stored");
        Ok(())
    }

    async fn touch_last_checked(
        &self,
        identity: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let at = at.to_rfc3339();
        self.conn()
            .execute(
                "UPDATE users SET last_checked = ?2, updated_at = ?2 WHERE identity = ?1",
                params![identity, at],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("touch_last_checked: {e}")))?;
        Ok(())
    }

    async fn list_connected(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE credential IS NOT NULL \
                     ORDER BY identity"
                ),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_connected: {e}")))?;

        let mut users = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_connected: {e}")))?
        {
            users.push(row_to_user(&row)?);
        }
        Ok(users)
    }
}
