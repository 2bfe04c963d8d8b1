//! HTTP surface: the WhatsApp webhook, the OAuth callback and a health check.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::assistant::SessionRouter;
use crate::auth::GoogleOAuth;
use crate::channels::Messenger;
use crate::channels::whatsapp::strip_whatsapp_prefix;
use crate::store::UserStore;

pub const HEALTH_TEXT: &str = "🤖 WhatsApp Email Assistant is running!";
pub const CONNECTED_TEXT: &str = "✅ Gmail connected! You can close this window and return to WhatsApp.";
pub const AUTH_FAILED_TEXT: &str = "❌ Authorization failed";
pub const CONNECT_FAILED_TEXT: &str = "❌ Failed to connect Gmail";

/// Hands out one async lock per identity so turns for the same user never
/// interleave. Locks nobody holds are dropped on the next hand-out.
#[derive(Default)]
pub struct TurnLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl TurnLocks {
    pub fn for_identity(&self, identity: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(identity.to_string()).or_default())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<SessionRouter>,
    pub store: Arc<dyn UserStore>,
    pub oauth: Arc<GoogleOAuth>,
    pub messenger: Arc<dyn Messenger>,
    pub turn_locks: Arc<TurnLocks>,
}

impl AppState {
    pub fn new(
        router: Arc<SessionRouter>,
        store: Arc<dyn UserStore>,
        oauth: Arc<GoogleOAuth>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            router,
            store,
            oauth,
            messenger,
            turn_locks: Arc::new(TurnLocks::default()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From", default)]
    pub from: String,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// GET /
async fn health() -> &'static str {
    HEALTH_TEXT
}

/// POST /whatsapp
///
/// Runs one turn for the sender and delivers the reply through the
/// messenger. The HTTP response body is empty.
async fn whatsapp_webhook(
    State(state): State<AppState>,
    Form(msg): Form<InboundMessage>,
) -> impl IntoResponse {
    let identity = strip_whatsapp_prefix(&msg.from).to_string();
    if identity.is_empty() {
        warn!("Inbound message without a sender");
        return StatusCode::BAD_REQUEST;
    }

    let lock = state.turn_locks.for_identity(&identity);
    let _turn = lock.lock().await;

    let reply = state.router.handle_turn(&identity, &msg.body).await;

    match state.messenger.send(&identity, &reply).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!(identity = %identity, channel = state.messenger.name(), error = %e, "Reply delivery failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// GET /oauth2callback
///
/// `state` carries the identity the consent URL was issued for.
async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<OAuthCallback>,
) -> impl IntoResponse {
    let (Some(code), Some(identity)) = (params.code, params.state) else {
        warn!("OAuth callback without code or state");
        return (StatusCode::BAD_REQUEST, AUTH_FAILED_TEXT);
    };
    if code.is_empty() || identity.is_empty() {
        return (StatusCode::BAD_REQUEST, AUTH_FAILED_TEXT);
    }

    let bundle = match state.oauth.exchange_code(&code).await {
        Ok(bundle) => bundle,
        Err(e) => {
            error!(identity = %identity, error = %e, "Code exchange failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, CONNECT_FAILED_TEXT);
        }
    };

    match state.store.set_credential(&identity, &bundle).await {
        Ok(()) => {
            info!(identity = %identity, "Gmail connected");
            (StatusCode::OK, CONNECTED_TEXT)
        }
        Err(e) => {
            error!(identity = %identity, error = %e, "Failed to store credential");
            (StatusCode::INTERNAL_SERVER_ERROR, CONNECT_FAILED_TEXT)
        }
    }
}

/// Build the application routes.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/whatsapp", post(whatsapp_webhook))
        .route("/oauth2callback", get(oauth_callback))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
