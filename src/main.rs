use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use mail_assist::assistant::SessionRouter;
use mail_assist::auth::{AuthorizationService, GoogleOAuth};
use mail_assist::channels::{CliChannel, LogMessenger, Messenger, TwilioWhatsApp};
use mail_assist::config::AppConfig;
use mail_assist::llm::{GeneratorConfig, LlmTextGenerator, TextGenerator, create_provider};
use mail_assist::mailbox::MailboxGateway;
use mail_assist::mailbox::gmail::GmailGateway;
use mail_assist::reminders;
use mail_assist::server::{AppState, app_routes};
use mail_assist::store::{LibSqlBackend, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    eprintln!("🤖 Mail Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Webhook: http://0.0.0.0:{}/whatsapp", config.port);
    eprintln!("   OAuth callback: {}", config.google.redirect_uri);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn UserStore> = Arc::new(
        LibSqlBackend::new_local(Path::new(&config.db_path))
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path))?,
    );
    eprintln!("   Database: {}", config.db_path);

    // ── Mailbox + authorization ─────────────────────────────────────────
    let oauth = Arc::new(GoogleOAuth::new(config.google.clone())?);
    let mailbox: Arc<dyn MailboxGateway> =
        Arc::new(GmailGateway::new(&config.google, Arc::clone(&oauth))?);
    let auth: Arc<dyn AuthorizationService> = oauth.clone();

    // ── Text generation ─────────────────────────────────────────────────
    let llm = create_provider(&config.llm)?;
    let generator: Arc<dyn TextGenerator> =
        Arc::new(LlmTextGenerator::new(llm, GeneratorConfig::default()));

    // ── Outbound messaging ──────────────────────────────────────────────
    let messenger: Arc<dyn Messenger> = match config.twilio.clone() {
        Some(twilio) => Arc::new(TwilioWhatsApp::new(twilio)),
        None => {
            eprintln!("   WhatsApp delivery: disabled (TWILIO_* not set, replies are logged)");
            Arc::new(LogMessenger)
        }
    };

    let router = Arc::new(SessionRouter::new(
        Arc::clone(&store),
        Arc::clone(&mailbox),
        generator,
        auth,
    ));

    // ── Reminders ───────────────────────────────────────────────────────
    let _reminder_handle = reminders::spawn_reminder_ticker(
        Arc::clone(&store),
        Arc::clone(&mailbox),
        Arc::clone(&messenger),
        config.reminder_tick,
    );
    eprintln!("   Reminders: every {}s", config.reminder_tick.as_secs());

    if config.cli_enabled {
        let cli = CliChannel::new(Arc::clone(&router));
        eprintln!("   CLI: enabled (identity 'local-user'). Type a message and press Enter.\n");
        tokio::spawn(async move {
            if let Err(e) = cli.run().await {
                tracing::error!(error = %e, "CLI channel stopped");
            }
        });
    }

    // ── HTTP server ─────────────────────────────────────────────────────
    let app = app_routes(AppState::new(router, store, oauth, messenger));
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
