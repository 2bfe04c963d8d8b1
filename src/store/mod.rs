//! Persistence layer: libSQL-backed user records.

pub mod libsql_backend;
pub mod migrations;
pub mod model;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use model::{CredentialBundle, Preferences, UserRecord};
pub use traits::UserStore;
