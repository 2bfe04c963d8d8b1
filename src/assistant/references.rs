//! Reference list: the numbered emails a user was last shown.
//!
//! Positional commands (`reply 2 ...`, `label 3 ...`) resolve against this
//! list. It is only ever replaced wholesale.

use serde::{Deserialize, Serialize};

use crate::assistant::triage::EmailSummary;

/// Lookup failure for a positional command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("no email at position {index} (list has {len})")]
    NotFound { index: usize, len: usize },
}

/// Ordered, 1-indexed list of addressable emails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceList(Vec<EmailSummary>);

impl ReferenceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list.
    pub fn capture(&mut self, emails: Vec<EmailSummary>) {
        self.0 = emails;
    }

    /// Look up by 1-based position.
    pub fn resolve(&self, index: usize) -> Result<&EmailSummary, ReferenceError> {
        index
            .checked_sub(1)
            .and_then(|i| self.0.get(i))
            .ok_or(ReferenceError::NotFound {
                index,
                len: self.0.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmailSummary> {
        self.0.iter()
    }
}

impl From<Vec<EmailSummary>> for ReferenceList {
    fn from(emails: Vec<EmailSummary>) -> Self {
        Self(emails)
    }
}
