//! The conversational core: command parsing, triage, reference list and
//! the per-turn session router.

pub mod command;
pub mod guard;
pub mod references;
pub mod replies;
pub mod router;
pub mod state;
pub mod triage;

pub use command::{CommandParser, Intent};
pub use references::{ReferenceError, ReferenceList};
pub use router::{SessionRouter, UNREAD_CAP};
pub use triage::{Category, EmailSummary, classify};
