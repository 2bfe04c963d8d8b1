//! Authorization guard around mailbox calls.
//!
//! Credential expiry is turned into `TurnError::ExpiredCredential` before it
//! can reach the generic error reply; the router answers it with a fresh
//! consent link.

use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use crate::assistant::replies;
use crate::auth::AuthorizationService;
use crate::error::{MailboxError, TurnError};

pub struct AuthorizationGuard {
    auth: Arc<dyn AuthorizationService>,
}

impl AuthorizationGuard {
    pub fn new(auth: Arc<dyn AuthorizationService>) -> Self {
        Self { auth }
    }

    /// Run a mailbox call, classifying its failure.
    pub async fn call<T, F>(&self, identity: &str, call: F) -> Result<T, TurnError>
    where
        F: Future<Output = Result<T, MailboxError>>,
    {
        call.await.map_err(|err| {
            if err.is_expired_credential() {
                warn!(identity, error = %err, "Mailbox credential expired");
            }
            TurnError::from(err)
        })
    }

    /// First-time "connect your Gmail" message.
    pub fn connect_prompt(&self, identity: &str) -> String {
        replies::connect_prompt(&self.auth.authorization_url(identity))
    }

    /// "Your connection expired" message.
    pub fn reconnect_prompt(&self, identity: &str) -> String {
        replies::reconnect_prompt(&self.auth.authorization_url(identity))
    }
}
