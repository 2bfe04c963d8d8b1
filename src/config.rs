//! Configuration types, built once from the environment at startup.
//!
//! Every collaborator receives its slice of configuration through its
//! constructor; nothing below `main` reads the environment.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Default public URL used to build the OAuth redirect URI.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

/// Google OAuth + Gmail API configuration.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Where Google sends the user back after consent.
    pub redirect_uri: String,
    pub auth_endpoint: String,
    pub token_endpoint: String,
    pub gmail_endpoint: String,
    /// Per-request timeout for Google API calls.
    pub request_timeout: Duration,
}

impl GoogleConfig {
    pub const AUTH_ENDPOINT: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    pub const TOKEN_ENDPOINT: &'static str = "https://oauth2.googleapis.com/token";
    pub const GMAIL_ENDPOINT: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Build a config against Google's production endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        public_base_url: &str,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            redirect_uri: format!("{}/oauth2callback", public_base_url.trim_end_matches('/')),
            auth_endpoint: Self::AUTH_ENDPOINT.to_string(),
            token_endpoint: Self::TOKEN_ENDPOINT.to_string(),
            gmail_endpoint: Self::GMAIL_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    /// Build config from any key lookup. Endpoint overrides exist so tests
    /// and staging can point at a stand-in server.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let client_id = required("GOOGLE_CLIENT_ID", lookup("GOOGLE_CLIENT_ID"))?;
        let client_secret = required("GOOGLE_CLIENT_SECRET", lookup("GOOGLE_CLIENT_SECRET"))?;
        let public_base_url =
            lookup("PUBLIC_BASE_URL").unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.to_string());

        let mut config = Self::new(client_id, client_secret, &public_base_url);
        if let Some(endpoint) = lookup("GOOGLE_AUTH_ENDPOINT") {
            config.auth_endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("GOOGLE_TOKEN_ENDPOINT") {
            config.token_endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("GMAIL_API_ENDPOINT") {
            config.gmail_endpoint = endpoint;
        }
        Ok(config)
    }
}

/// Twilio WhatsApp delivery configuration.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// Sender number, e.g. `whatsapp:+14155238886`.
    pub whatsapp_from: String,
    pub api_base: String,
}

impl TwilioConfig {
    pub const API_BASE: &'static str = "https://api.twilio.com/2010-04-01";

    /// Build config from environment variables.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    /// `Ok(None)` when `TWILIO_ACCOUNT_SID` is unset (delivery disabled).
    /// A SID without the token or sender number is an error.
    pub fn from_lookup(
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let Some(account_sid) = lookup("TWILIO_ACCOUNT_SID").filter(|v| !v.trim().is_empty())
        else {
            return Ok(None);
        };
        let auth_token = required("TWILIO_AUTH_TOKEN", lookup("TWILIO_AUTH_TOKEN"))?;
        let whatsapp_from = required("TWILIO_WHATSAPP_FROM", lookup("TWILIO_WHATSAPP_FROM"))?;

        Ok(Some(Self {
            account_sid,
            auth_token: SecretString::from(auth_token),
            whatsapp_from,
            api_base: lookup("TWILIO_API_BASE").unwrap_or_else(|| Self::API_BASE.to_string()),
        }))
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: String,
    pub google: GoogleConfig,
    pub twilio: Option<TwilioConfig>,
    pub llm: LlmConfig,
    /// How often the reminder ticker wakes up.
    pub reminder_tick: Duration,
    /// Run the stdin REPL channel alongside the webhook.
    pub cli_enabled: bool,
}

impl AppConfig {
    /// Build the whole configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&env_lookup)
    }

    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = parse_value("PORT", lookup("PORT").as_deref(), 3000u16)?;
        let db_path =
            lookup("MAIL_ASSIST_DB_PATH").unwrap_or_else(|| "./data/mail-assist.db".to_string());
        let reminder_tick_secs = parse_value(
            "MAIL_ASSIST_REMINDER_TICK_SECS",
            lookup("MAIL_ASSIST_REMINDER_TICK_SECS").as_deref(),
            60u64,
        )?;
        let cli_enabled = lookup("MAIL_ASSIST_CLI")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            port,
            db_path,
            google: GoogleConfig::from_lookup(lookup)?,
            twilio: TwilioConfig::from_lookup(lookup)?,
            llm: llm_config_from_lookup(lookup)?,
            reminder_tick: Duration::from_secs(reminder_tick_secs.max(1)),
            cli_enabled,
        })
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn llm_config_from_lookup(
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<LlmConfig, ConfigError> {
    let backend = match lookup("MAIL_ASSIST_LLM_BACKEND")
        .unwrap_or_else(|| "anthropic".to_string())
        .trim()
        .to_lowercase()
        .as_str()
    {
        "anthropic" => LlmBackend::Anthropic,
        "openai" => LlmBackend::OpenAi,
        other => {
            return Err(ConfigError::InvalidValue {
                key: "MAIL_ASSIST_LLM_BACKEND".into(),
                message: format!("unknown backend '{other}' (expected anthropic or openai)"),
            });
        }
    };

    let (key_var, default_model) = match backend {
        LlmBackend::Anthropic => ("ANTHROPIC_API_KEY", "claude-sonnet-4-20250514"),
        LlmBackend::OpenAi => ("OPENAI_API_KEY", "gpt-4o-mini"),
    };

    Ok(LlmConfig {
        backend,
        api_key: SecretString::from(required(key_var, lookup(key_var))?),
        model: lookup("MAIL_ASSIST_MODEL").unwrap_or_else(|| default_model.to_string()),
    })
}

/// A present, non-blank value or `MissingEnvVar`.
fn required(key: &str, value: Option<String>) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse `raw`, falling back to `default` when it is absent.
fn parse_value<T>(key: &str, raw: Option<&str>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
