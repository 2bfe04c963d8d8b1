//! Session router: one inbound message in, one reply text out.
//!
//! Each turn loads the user record, parses the message, derives the session
//! state and dispatches to the mailbox flow, reminder settings or chat.
//! Every failure is rendered into the reply; `handle_turn` never errors.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::assistant::command::{CommandParser, Intent};
use crate::assistant::guard::AuthorizationGuard;
use crate::assistant::replies;
use crate::assistant::state::{Connection, SessionState, derive_state};
use crate::assistant::triage::{TriageBuckets, triage_all};
use crate::auth::AuthorizationService;
use crate::error::TurnError;
use crate::llm::{Style, TextGenerator};
use crate::mailbox::{MailboxGateway, display_name, extract_address};
use crate::store::{CredentialBundle, UserRecord, UserStore};

/// Most unread messages fetched per mailbox command.
pub const UNREAD_CAP: usize = 20;

pub struct SessionRouter {
    store: Arc<dyn UserStore>,
    mailbox: Arc<dyn MailboxGateway>,
    generator: Arc<dyn TextGenerator>,
    guard: AuthorizationGuard,
    parser: CommandParser,
}

impl SessionRouter {
    pub fn new(
        store: Arc<dyn UserStore>,
        mailbox: Arc<dyn MailboxGateway>,
        generator: Arc<dyn TextGenerator>,
        auth: Arc<dyn AuthorizationService>,
    ) -> Self {
        Self {
            store,
            mailbox,
            generator,
            guard: AuthorizationGuard::new(auth),
            parser: CommandParser::new(),
        }
    }

    /// Handle one inbound message and produce exactly one reply.
    pub async fn handle_turn(&self, identity: &str, raw_text: &str) -> String {
        let turn_id = Uuid::new_v4();
        let span = info_span!("turn", %turn_id, identity);
        self.run_turn(identity, raw_text).instrument(span).await
    }

    async fn run_turn(&self, identity: &str, raw_text: &str) -> String {
        let mut user = match self.store.find_or_create(identity).await {
            Ok(user) => user,
            Err(e) => {
                error!(error = %e, "Failed to load user record");
                return replies::STORE_FAILURE.to_string();
            }
        };

        let intent = self.parser.parse(raw_text);
        let state = derive_state(&user);
        info!(intent = intent.name(), state = ?state, "Handling turn");

        let result = match intent {
            Intent::SetReminder { minutes } => self.set_reminder(&mut user, minutes).await,
            Intent::FreeChat { text } => Ok(self.chat(&text).await),
            mailbox_intent => self.mailbox_flow(&mut user, state, mailbox_intent).await,
        };

        result.unwrap_or_else(|err| self.render_error(identity, err))
    }

    fn render_error(&self, identity: &str, err: TurnError) -> String {
        match err {
            TurnError::ExpiredCredential => self.guard.reconnect_prompt(identity),
            TurnError::NotFound(e) => {
                debug!(error = %e, "Reference lookup failed");
                replies::NOT_FOUND.to_string()
            }
            TurnError::Malformed("label") => replies::LABEL_USAGE.to_string(),
            TurnError::Malformed(_) => replies::REPLY_USAGE.to_string(),
            TurnError::Mailbox(e) => {
                warn!(error = %e, "Mailbox command failed");
                replies::error(&e.to_string())
            }
            TurnError::Generator(e) => {
                warn!(error = %e, "Text generation failed");
                replies::error(&e.to_string())
            }
            TurnError::Store(e) => {
                error!(error = %e, "Failed to save user record");
                replies::STORE_FAILURE.to_string()
            }
        }
    }

    async fn set_reminder(&self, user: &mut UserRecord, minutes: u32) -> Result<String, TurnError> {
        user.reminder_interval_minutes = minutes;
        self.store.save(user).await?;
        info!(minutes, "Reminder interval updated");
        Ok(replies::reminder_set(minutes))
    }

    async fn chat(&self, text: &str) -> String {
        match self.generator.generate(Style::Chat, text).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "Chat generation failed");
                replies::chat_failure(&e).to_string()
            }
        }
    }

    async fn mailbox_flow(
        &self,
        user: &mut UserRecord,
        state: SessionState,
        intent: Intent,
    ) -> Result<String, TurnError> {
        let credential = match (state.connection, user.credential.clone()) {
            (Connection::Connected, Some(credential)) => credential,
            _ => {
                info!("Mailbox command before authorization");
                return Ok(self.guard.connect_prompt(&user.identity));
            }
        };

        match intent {
            Intent::ReadInbox => {
                let emails = self.fetch_triaged(&user.identity, &credential).await?;
                Ok(replies::unread_count(emails.total()))
            }
            Intent::SummarizeInbox => {
                let buckets = self.fetch_triaged(&user.identity, &credential).await?;
                let report = replies::summary_report(&buckets);
                user.references.capture(buckets.reply);
                self.store.save(user).await?;
                info!(references = user.references.len(), "Reference list captured");
                Ok(report)
            }
            Intent::DeleteSpam => {
                let buckets = self.fetch_triaged(&user.identity, &credential).await?;
                if buckets.spam.is_empty() {
                    return Ok(replies::NO_SPAM.to_string());
                }
                let ids: Vec<String> = buckets.spam.into_iter().map(|e| e.id).collect();
                let deleted = self
                    .guard
                    .call(&user.identity, self.mailbox.trash(&credential, &ids))
                    .await?;
                info!(deleted, "Spam deleted");
                Ok(replies::spam_deleted(deleted))
            }
            Intent::Reply { index, message } => {
                self.reply(user, &credential, index, &message).await
            }
            Intent::Label { index, label_name } => {
                let target = user.references.resolve(index)?;
                self.guard
                    .call(
                        &user.identity,
                        self.mailbox
                            .ensure_label_and_apply(&credential, &target.id, &label_name),
                    )
                    .await?;
                Ok(replies::labeled(&target.subject, &label_name))
            }
            Intent::MalformedReply { .. } => Err(TurnError::Malformed("reply")),
            Intent::MalformedLabel { .. } => Err(TurnError::Malformed("label")),
            Intent::Unknown { raw_text } => {
                debug!(command = %raw_text, "Unknown mailbox command");
                Ok(replies::UNKNOWN_COMMAND.to_string())
            }
            Intent::SetReminder { .. } | Intent::FreeChat { .. } => {
                Ok(replies::UNKNOWN_COMMAND.to_string())
            }
        }
    }

    async fn reply(
        &self,
        user: &UserRecord,
        credential: &CredentialBundle,
        index: usize,
        message: &str,
    ) -> Result<String, TurnError> {
        let target = user.references.resolve(index)?;

        let prompt = replies::reply_prompt(&target.subject, message, &user.preferences);
        let body = self.generator.generate(Style::EmailReply, &prompt).await?;

        let to = extract_address(&target.from);
        let subject = format!("Re: {}", target.subject);
        self.guard
            .call(
                &user.identity,
                self.mailbox.send(credential, to, &subject, &body),
            )
            .await?;

        info!(index, "Reply sent");
        Ok(replies::reply_sent(display_name(&target.from)))
    }

    async fn fetch_triaged(
        &self,
        identity: &str,
        credential: &CredentialBundle,
    ) -> Result<TriageBuckets, TurnError> {
        let envelopes = self
            .guard
            .call(identity, self.mailbox.list_unread(credential, UNREAD_CAP))
            .await?;
        let buckets = TriageBuckets::partition(triage_all(envelopes));
        debug!(
            total = buckets.total(),
            reply = buckets.reply.len(),
            spam = buckets.spam.len(),
            promotions = buckets.promotions.len(),
            "Inbox triaged"
        );
        Ok(buckets)
    }
}
