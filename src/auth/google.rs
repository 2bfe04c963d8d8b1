//! Google OAuth 2.0 for Gmail access.

use chrono::{Duration, Utc};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::AuthorizationService;
use crate::config::GoogleConfig;
use crate::error::AuthError;
use crate::store::CredentialBundle;

/// Scopes needed to read, send, trash and label.
pub const GMAIL_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.modify",
];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_bundle(self) -> CredentialBundle {
        CredentialBundle {
            access_token: SecretString::from(self.access_token),
            refresh_token: self.refresh_token.map(SecretString::from),
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            scope: self.scope,
            token_type: self.token_type,
        }
    }
}

/// Google consent URL builder and token endpoint client.
pub struct GoogleOAuth {
    config: GoogleConfig,
    auth_url: Url,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> Result<Self, AuthError> {
        let auth_url = Url::parse(&config.auth_endpoint)
            .map_err(|e| AuthError::InvalidEndpoint(format!("{}: {e}", config.auth_endpoint)))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::Http(e.to_string()))?;
        Ok(Self {
            config,
            auth_url,
            http,
        })
    }

    /// Trade a one-time authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<CredentialBundle, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        let token = self
            .token_request(&form)
            .await
            .map_err(|e| match e {
                AuthError::InvalidGrant(reason) | AuthError::RefreshFailed(reason) => {
                    AuthError::ExchangeFailed(reason)
                }
                other => other,
            })?;
        debug!(has_refresh = token.refresh_token.is_some(), "Authorization code exchanged");
        Ok(token.into_bundle())
    }

    /// Get a new access token. The refresh token is carried over when
    /// Google does not rotate it.
    pub async fn refresh(&self, bundle: &CredentialBundle) -> Result<CredentialBundle, AuthError> {
        let refresh_token = bundle
            .refresh_token
            .as_ref()
            .ok_or_else(|| AuthError::InvalidGrant("no refresh token stored".into()))?;

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
        ];
        let token = self.token_request(&form).await?;

        let mut refreshed = token.into_bundle();
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = bundle.refresh_token.clone();
        }
        if refreshed.scope.is_none() {
            refreshed.scope = bundle.scope.clone();
        }
        debug!("Access token refreshed");
        Ok(refreshed)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::Http(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<TokenResponse>()
                .await
                .map_err(|e| AuthError::Http(format!("invalid token response: {e}")));
        }

        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) if err.error == "invalid_grant" => {
                warn!(status = %status, "Token endpoint rejected grant");
                Err(AuthError::InvalidGrant(
                    err.error_description.unwrap_or(err.error),
                ))
            }
            Ok(err) => Err(AuthError::RefreshFailed(format!(
                "{} ({status})",
                err.error_description.unwrap_or(err.error)
            ))),
            Err(_) => Err(AuthError::RefreshFailed(format!("{status}: {body}"))),
        }
    }
}

impl AuthorizationService for GoogleOAuth {
    fn authorization_url(&self, identity: &str) -> String {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &GMAIL_SCOPES.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", identity);
        url.into()
    }
}
