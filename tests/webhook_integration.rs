//! Integration tests for the WhatsApp webhook and OAuth callback.
//!
//! Each test spins up the Axum app on a random port with an in-memory
//! store, a Gmail/Google stand-in served by wiremock and a stub text
//! generator, then drives it over HTTP.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::time::timeout;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mail_assist::assistant::SessionRouter;
use mail_assist::auth::GoogleOAuth;
use mail_assist::channels::cli::CLI_IDENTITY;
use mail_assist::channels::{CliChannel, Messenger};
use mail_assist::config::GoogleConfig;
use mail_assist::error::{ChannelError, LlmError};
use mail_assist::llm::{Style, TextGenerator};
use mail_assist::mailbox::GmailGateway;
use mail_assist::server::{
    AUTH_FAILED_TEXT, AppState, CONNECTED_TEXT, CONNECT_FAILED_TEXT, HEALTH_TEXT, app_routes,
};
use mail_assist::store::{LibSqlBackend, UserStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const USER: &str = "+15550001";

/// Stub generator (no real API calls).
struct StubGenerator;

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, style: Style, prompt: &str) -> Result<String, LlmError> {
        Ok(match style {
            Style::Chat => format!("echo: {prompt}"),
            Style::EmailReply => "Sounds good.\n\nRegards".to_string(),
        })
    }
}

/// Records every reply instead of delivering it.
#[derive(Default)]
struct Outbox {
    fail: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl Outbox {
    fn last(&self) -> (String, String) {
        self.sent
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no reply was delivered")
    }
}

#[async_trait]
impl Messenger for Outbox {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn send(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push((to.into(), body.into()));
        if self.fail {
            return Err(ChannelError::SendFailed {
                name: "outbox".into(),
                reason: "offline".into(),
            });
        }
        Ok(())
    }
}

struct TestApp {
    base: String,
    store: Arc<LibSqlBackend>,
    outbox: Arc<Outbox>,
    router: Arc<SessionRouter>,
    http: reqwest::Client,
}

impl TestApp {
    async fn send_whatsapp(&self, from: &str, body: &str) -> reqwest::Response {
        self.http
            .post(format!("{}/whatsapp", self.base))
            .form(&[("From", from), ("Body", body)])
            .send()
            .await
            .unwrap()
    }
}

/// Start the app against a Google stand-in, return handles for assertions.
async fn start_app(google: &MockServer, outbox: Outbox) -> TestApp {
    let mut config = GoogleConfig::new("client-123", "shh", "https://assist.example.com");
    config.gmail_endpoint = format!("{}/gmail/v1", google.uri());
    config.token_endpoint = format!("{}/token", google.uri());

    let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let oauth = Arc::new(GoogleOAuth::new(config.clone()).unwrap());
    let mailbox = Arc::new(GmailGateway::new(&config, Arc::clone(&oauth)).unwrap());
    let outbox = Arc::new(outbox);

    let router = Arc::new(SessionRouter::new(
        store.clone(),
        mailbox,
        Arc::new(StubGenerator),
        oauth.clone(),
    ));
    let app = app_routes(AppState::new(
        Arc::clone(&router),
        store.clone(),
        oauth,
        outbox.clone(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestApp {
        base: format!("http://127.0.0.1:{port}"),
        store,
        outbox,
        router,
        http: reqwest::Client::new(),
    }
}

async fn mount_token_exchange(google: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=consent-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.fresh",
            "refresh_token": "1//refresh",
            "expires_in": 3600,
            "scope": "https://www.googleapis.com/auth/gmail.modify",
            "token_type": "Bearer"
        })))
        .mount(google)
        .await;
}

async fn mount_inbox(google: &MockServer, messages: &[(&str, &str, &str)]) {
    let refs: Vec<_> = messages
        .iter()
        .map(|(id, _, _)| serde_json::json!({ "id": id, "threadId": id }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/gmail/v1/users/me/messages"))
        .and(query_param("q", "is:unread"))
        .and(header("authorization", "Bearer ya29.fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messages": refs
        })))
        .mount(google)
        .await;

    for (id, from, subject) in messages {
        Mock::given(method("GET"))
            .and(path(format!("/gmail/v1/users/me/messages/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": id,
                "payload": { "headers": [
                    { "name": "From", "value": from },
                    { "name": "Subject", "value": subject },
                    { "name": "Date", "value": "Tue, 2 Jan 2024 09:00:00 +0000" }
                ]}
            })))
            .mount(google)
            .await;
    }
}

async fn connect(app: &TestApp) {
    let resp = app
        .http
        .get(format!("{}/oauth2callback", app.base))
        .query(&[("code", "consent-code"), ("state", USER)])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), CONNECTED_TEXT);
}

#[tokio::test]
async fn health_check() {
    timeout(TEST_TIMEOUT, async {
        let google = MockServer::start().await;
        let app = start_app(&google, Outbox::default()).await;

        let resp = app.http.get(&app.base).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), HEALTH_TEXT);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unconnected_user_gets_consent_link() {
    timeout(TEST_TIMEOUT, async {
        let google = MockServer::start().await;
        let app = start_app(&google, Outbox::default()).await;

        let resp = app
            .send_whatsapp(&format!("whatsapp:{USER}"), "email: read inbox")
            .await;
        assert_eq!(resp.status(), 200);

        let (to, body) = app.outbox.last();
        assert_eq!(to, USER);
        assert!(body.contains("Please connect your Gmail first"));
        assert!(body.contains("state=%2B15550001"));
        assert!(body.contains("client_id=client-123"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn oauth_callback_then_summarize_and_reply() {
    timeout(TEST_TIMEOUT, async {
        let google = MockServer::start().await;
        mount_token_exchange(&google).await;
        mount_inbox(
            &google,
            &[
                ("m1", "Bob Smith <bob@example.com>", "Quarterly report"),
                ("m2", "Shop <news@shop.example>", "Big sale today"),
                ("m3", "Unknown <x@spam.example>", "Unsubscribe now"),
            ],
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/profile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "emailAddress": "me@example.com"
            })))
            .mount(&google)
            .await;
        Mock::given(method("POST"))
            .and(path("/gmail/v1/users/me/messages/send"))
            .and(header("authorization", "Bearer ya29.fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "sent-1"
            })))
            .expect(1)
            .mount(&google)
            .await;

        let app = start_app(&google, Outbox::default()).await;
        connect(&app).await;

        let user = app.store.find_or_create(USER).await.unwrap();
        assert!(user.credential.is_some());

        app.send_whatsapp(USER, "email: read inbox").await;
        assert_eq!(app.outbox.last().1, "📧 You have 3 unread emails.");

        app.send_whatsapp(USER, "email: summarize inbox").await;
        let summary = app.outbox.last().1;
        assert!(summary.contains("📧 Total emails: 3"));
        assert!(summary.contains("✅ To reply: 1"));
        assert!(summary.contains("🗑 Spam: 1"));
        assert!(summary.contains("🛒 Promotions: 1"));
        assert!(summary.contains("1. Bob Smith - Quarterly report"));

        let user = app.store.find_or_create(USER).await.unwrap();
        assert_eq!(user.references.len(), 1);

        app.send_whatsapp(USER, "reply 1 sounds good, see you Monday").await;
        assert_eq!(app.outbox.last().1, "✅ Reply sent to Bob Smith!");

        app.send_whatsapp(USER, "reply 2 anything").await;
        assert_eq!(
            app.outbox.last().1,
            "❌ Email not found. Try 'email: summarize inbox' first."
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn oauth_callback_without_code_fails() {
    timeout(TEST_TIMEOUT, async {
        let google = MockServer::start().await;
        let app = start_app(&google, Outbox::default()).await;

        let resp = app
            .http
            .get(format!("{}/oauth2callback", app.base))
            .query(&[("state", USER)])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert_eq!(resp.text().await.unwrap(), AUTH_FAILED_TEXT);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn oauth_callback_with_rejected_code_fails() {
    timeout(TEST_TIMEOUT, async {
        let google = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            })))
            .mount(&google)
            .await;
        let app = start_app(&google, Outbox::default()).await;

        let resp = app
            .http
            .get(format!("{}/oauth2callback", app.base))
            .query(&[("code", "stale"), ("state", USER)])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        assert_eq!(resp.text().await.unwrap(), CONNECT_FAILED_TEXT);

        let user = app.store.find_or_create(USER).await.unwrap();
        assert!(user.credential.is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn free_chat_and_reminder_need_no_mailbox() {
    timeout(TEST_TIMEOUT, async {
        let google = MockServer::start().await;
        let app = start_app(&google, Outbox::default()).await;

        app.send_whatsapp(USER, "what's the weather like?").await;
        assert_eq!(app.outbox.last().1, "echo: what's the weather like?");

        app.send_whatsapp(USER, "set reminder 45 mins").await;
        assert!(app.outbox.last().1.contains("45"));
        let user = app.store.find_or_create(USER).await.unwrap();
        assert_eq!(user.reminder_interval_minutes, 45);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn delivery_failure_answers_500() {
    timeout(TEST_TIMEOUT, async {
        let google = MockServer::start().await;
        let outbox = Outbox {
            fail: true,
            ..Default::default()
        };
        let app = start_app(&google, outbox).await;

        let resp = app.send_whatsapp(USER, "hello").await;
        assert_eq!(resp.status(), 500);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_sender_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let google = MockServer::start().await;
        let app = start_app(&google, Outbox::default()).await;

        let resp = app
            .http
            .post(format!("{}/whatsapp", app.base))
            .form(&[("Body", "hello")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        assert!(app.outbox.sent.lock().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn cli_channel_prints_replies() {
    timeout(TEST_TIMEOUT, async {
        let google = MockServer::start().await;
        let app = start_app(&google, Outbox::default()).await;
        let cli = CliChannel::new(Arc::clone(&app.router));

        let input: &[u8] = b"hello there\n\nset reminder\n";
        let mut output = Vec::new();
        cli.run_with(input, &mut output).await.unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("echo: hello there"));

        let user = app.store.find_or_create(CLI_IDENTITY).await.unwrap();
        assert_eq!(user.reminder_interval_minutes, 30);
    })
    .await
    .expect("test timed out");
}
