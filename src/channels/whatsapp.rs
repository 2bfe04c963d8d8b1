//! WhatsApp delivery through the Twilio Messages API.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::channels::{Messenger, split_message};
use crate::config::TwilioConfig;
use crate::error::ChannelError;

/// Twilio rejects WhatsApp bodies longer than this.
pub const WHATSAPP_MAX_MESSAGE_LENGTH: usize = 1600;

const WHATSAPP_PREFIX: &str = "whatsapp:";

/// Add the `whatsapp:` address prefix if it is missing.
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with(WHATSAPP_PREFIX) {
        number.to_string()
    } else {
        format!("{WHATSAPP_PREFIX}{number}")
    }
}

/// Remove the `whatsapp:` prefix from an inbound `From` value.
pub fn strip_whatsapp_prefix(address: &str) -> &str {
    let address = address.trim();
    address.strip_prefix(WHATSAPP_PREFIX).unwrap_or(address)
}

pub struct TwilioWhatsApp {
    config: TwilioConfig,
    client: reqwest::Client,
}

impl TwilioWhatsApp {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    async fn send_chunk(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        let from = whatsapp_address(&self.config.whatsapp_from);
        let form = [("From", from.as_str()), ("To", to), ("Body", body)];

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&form)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "whatsapp".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "whatsapp".into(),
                reason: format!("Twilio returned {status}: {body}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Messenger for TwilioWhatsApp {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        let to = whatsapp_address(to);
        let chunks = split_message(body, WHATSAPP_MAX_MESSAGE_LENGTH);
        for chunk in &chunks {
            self.send_chunk(&to, chunk).await?;
        }
        debug!(to = %to, chunks = chunks.len(), "WhatsApp message sent");
        Ok(())
    }
}

/// Used when Twilio is not configured: replies only go to the log.
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        info!(to, body, "Reply (delivery disabled)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".into(),
            auth_token: SecretString::from("token".to_string()),
            whatsapp_from: "+14155238886".into(),
            api_base: server.uri(),
        }
    }

    #[test]
    fn address_prefix_helpers() {
        assert_eq!(whatsapp_address("+15550001"), "whatsapp:+15550001");
        assert_eq!(whatsapp_address("whatsapp:+15550001"), "whatsapp:+15550001");
        assert_eq!(strip_whatsapp_prefix("whatsapp:+15550001"), "+15550001");
        assert_eq!(strip_whatsapp_prefix("+15550001"), "+15550001");
    }

    #[tokio::test]
    async fn send_posts_form_to_twilio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts/AC123/Messages.json"))
            .and(body_string_contains("To=whatsapp%3A%2B15550001"))
            .and(body_string_contains("From=whatsapp%3A%2B14155238886"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "sid": "SM1" })))
            .expect(1)
            .mount(&server)
            .await;

        TwilioWhatsApp::new(config_for(&server))
            .send("+15550001", "hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn long_body_is_sent_in_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Accounts/AC123/Messages.json"))
            .respond_with(ResponseTemplate::new(201))
            .expect(2)
            .mount(&server)
            .await;

        let body = format!("{}\n{}", "a".repeat(1000), "b".repeat(1000));
        TwilioWhatsApp::new(config_for(&server))
            .send("+15550001", &body)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn twilio_error_is_send_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad number"))
            .mount(&server)
            .await;

        let err = TwilioWhatsApp::new(config_for(&server))
            .send("nope", "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::SendFailed { .. }));
    }
}
