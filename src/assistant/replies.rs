//! User-facing reply texts.

use std::fmt::Write as _;

use crate::assistant::triage::TriageBuckets;
use crate::error::LlmError;
use crate::mailbox::display_name;
use crate::store::Preferences;

pub const NO_SPAM: &str = "✅ No spam emails found!";

pub const REPLY_USAGE: &str =
    "❌ Format: reply [number] [your message]\nExample: reply 1 Yes, I will attend";

pub const LABEL_USAGE: &str =
    "❌ Format: label [number] [label name]\nExample: label 3 marketing";

pub const NOT_FOUND: &str = "❌ Email not found. Try 'email: summarize inbox' first.";

pub const UNKNOWN_COMMAND: &str = "❌ Unknown command. Try:\n\
• email: read inbox\n\
• email: summarize inbox\n\
• reply [number] [message]\n\
• delete spam\n\
• label [number] [label]";

pub const CHAT_BUSY: &str = "⏳ AI model is busy. Please wait a moment and try again.";

pub const CHAT_UNAVAILABLE: &str =
    "⚠️ AI temporarily unavailable. Try: 'email: read inbox' for email commands.";

pub const STORE_FAILURE: &str = "⚠️ Sorry, something went wrong on our side. Please try again.";

pub fn connect_prompt(url: &str) -> String {
    format!("🔗 Please connect your Gmail first:\n\n{url}\n\nAfter connecting, try your command again!")
}

pub fn reconnect_prompt(url: &str) -> String {
    format!("🔗 Your Gmail connection expired. Please reconnect:\n\n{url}")
}

pub fn unread_count(count: usize) -> String {
    format!("📧 You have {count} unread emails.")
}

/// Counts per category, then the numbered to-reply list with action hints.
pub fn summary_report(buckets: &TriageBuckets) -> String {
    let mut message = format!(
        "📧 Total emails: {}\n✅ To reply: {}\n🗑 Spam: {}\n🛒 Promotions: {}\n\n",
        buckets.total(),
        buckets.reply.len(),
        buckets.spam.len(),
        buckets.promotions.len(),
    );

    if !buckets.reply.is_empty() {
        message.push_str("🔹 Emails to reply:\n");
        for (i, email) in buckets.reply.iter().enumerate() {
            let _ = writeln!(message, "{}. {} - {}", i + 1, display_name(&email.from), email.subject);
        }
        message.push_str("\n💬 Actions:\n");
        message.push_str("• Reply: \"reply [number] [your message]\"\n");
        message.push_str("• Delete spam: \"delete spam\"\n");
        message.push_str("• Label: \"label [number] [label name]\"");
    }

    message
}

pub fn spam_deleted(count: usize) -> String {
    format!("🗑 {count} spam email(s) deleted successfully!")
}

pub fn reply_sent(recipient: &str) -> String {
    format!("✅ Reply sent to {recipient}!")
}

pub fn labeled(subject: &str, label: &str) -> String {
    format!("🏷 Email \"{subject}\" labeled as \"{label}\"!")
}

pub fn error(description: &str) -> String {
    format!("❌ Error: {description}")
}

pub fn reminder_set(minutes: u32) -> String {
    format!("⏰ Reminder set every {minutes} minutes")
}

pub fn reminder_nudge(unread: usize) -> String {
    format!(
        "📬 Reminder: you have {unread} unread email(s). Reply 'email: summarize inbox' to review them."
    )
}

/// Notice sent in place of a chat answer the model could not produce.
pub fn chat_failure(err: &LlmError) -> &'static str {
    match err {
        LlmError::RateLimited { .. } | LlmError::Timeout { .. } => CHAT_BUSY,
        _ => CHAT_UNAVAILABLE,
    }
}

/// Prompt for the email-reply generator.
pub fn reply_prompt(subject: &str, message: &str, preferences: &Preferences) -> String {
    format!(
        "Write a {tone} email reply to \"{subject}\". The message is: {message}\n\
         End the email with the sign-off \"{signature}\".",
        tone = preferences.tone,
        signature = preferences.signature,
    )
}
