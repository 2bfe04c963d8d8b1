//! Periodic unread-mail reminders for connected users.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::assistant::UNREAD_CAP;
use crate::assistant::replies;
use crate::channels::Messenger;
use crate::error::DatabaseError;
use crate::mailbox::MailboxGateway;
use crate::store::UserStore;

/// Counts from one reminder sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub nudged: usize,
    pub skipped: usize,
}

/// Check every connected user whose reminder interval has elapsed.
///
/// A user is nudged only when they have unread mail. `last_checked` moves
/// forward after every check, including checks that found nothing; users
/// whose mailbox call fails keep their old timestamp.
pub async fn run_reminders_once(
    store: &dyn UserStore,
    mailbox: &dyn MailboxGateway,
    messenger: &dyn Messenger,
    now: DateTime<Utc>,
) -> Result<SweepReport, DatabaseError> {
    let mut report = SweepReport::default();

    for user in store.list_connected().await? {
        if !user.reminder_due(now) {
            continue;
        }
        let Some(credential) = user.credential.as_ref() else {
            continue;
        };

        let unread = match mailbox.list_unread(credential, UNREAD_CAP).await {
            Ok(unread) => unread.len(),
            Err(e) if e.is_expired_credential() => {
                debug!(identity = %user.identity, "Skipping reminder, credential expired");
                report.skipped += 1;
                continue;
            }
            Err(e) => {
                warn!(identity = %user.identity, error = %e, "Reminder check failed");
                report.skipped += 1;
                continue;
            }
        };
        report.checked += 1;

        if unread > 0 {
            match messenger.send(&user.identity, &replies::reminder_nudge(unread)).await {
                Ok(()) => report.nudged += 1,
                Err(e) => warn!(identity = %user.identity, error = %e, "Reminder delivery failed"),
            }
        }

        // The record read above may be stale by now; only the timestamp is written.
        store.touch_last_checked(&user.identity, now).await?;
    }

    Ok(report)
}

/// Spawn the reminder ticker. The first sweep runs one `interval` after start.
pub fn spawn_reminder_ticker(
    store: Arc<dyn UserStore>,
    mailbox: Arc<dyn MailboxGateway>,
    messenger: Arc<dyn Messenger>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match run_reminders_once(store.as_ref(), mailbox.as_ref(), messenger.as_ref(), Utc::now())
                .await
            {
                Ok(report) if report.checked + report.skipped > 0 => info!(
                    checked = report.checked,
                    nudged = report.nudged,
                    skipped = report.skipped,
                    "Reminder sweep finished"
                ),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Reminder sweep failed"),
            }
        }
    })
}
