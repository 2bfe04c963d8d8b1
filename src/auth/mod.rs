//! Mailbox authorization: consent links and the OAuth code exchange.

pub mod google;

pub use google::GoogleOAuth;

/// Builds consent links that attribute the granted credential to a user.
pub trait AuthorizationService: Send + Sync {
    /// A fresh authorization URL carrying `identity` as its state.
    fn authorization_url(&self, identity: &str) -> String;
}
