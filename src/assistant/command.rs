//! Command interpreter: raw message text → `Intent`.
//!
//! Keywords are matched case-insensitively; payload text keeps its case.
//! Parsing never fails: anything unrecognised is chat, and a positional
//! command with a bad shape becomes a malformed marker the router answers
//! with a usage example.

use regex::Regex;
use tracing::debug;

/// Reminder interval used when `set reminder` carries no usable number.
pub const DEFAULT_REMINDER_MINUTES: u32 = 30;

/// What the user asked for in one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    ReadInbox,
    SummarizeInbox,
    DeleteSpam,
    Reply {
        /// 1-based position in the reference list.
        index: usize,
        message: String,
    },
    Label {
        /// 1-based position in the reference list.
        index: usize,
        label_name: String,
    },
    SetReminder {
        minutes: u32,
    },
    FreeChat {
        text: String,
    },
    /// `email:` prefix with a sub-command we don't know.
    Unknown {
        raw_text: String,
    },
    /// Starts with `reply` but lacks `<number> <message>`.
    MalformedReply {
        raw_text: String,
    },
    /// Starts with `label` but lacks `<number> <label name>`.
    MalformedLabel {
        raw_text: String,
    },
}

impl Intent {
    /// Whether this intent goes through the mailbox flow.
    pub fn is_mailbox(&self) -> bool {
        !matches!(self, Self::SetReminder { .. } | Self::FreeChat { .. })
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadInbox => "read_inbox",
            Self::SummarizeInbox => "summarize_inbox",
            Self::DeleteSpam => "delete_spam",
            Self::Reply { .. } => "reply",
            Self::Label { .. } => "label",
            Self::SetReminder { .. } => "set_reminder",
            Self::FreeChat { .. } => "free_chat",
            Self::Unknown { .. } => "unknown",
            Self::MalformedReply { .. } => "malformed_reply",
            Self::MalformedLabel { .. } => "malformed_label",
        }
    }
}

/// Parses user messages into intents.
pub struct CommandParser {
    reply: Regex,
    label: Regex,
    number: Regex,
}

impl CommandParser {
    pub fn new() -> Self {
        Self {
            reply: Regex::new(r"(?is)^reply\s+([0-9]+)\s+(.+)$").unwrap(),
            label: Regex::new(r"(?is)^label\s+([0-9]+)\s+(.+)$").unwrap(),
            number: Regex::new(r"[0-9]+").unwrap(),
        }
    }

    /// Parse one inbound message.
    pub fn parse(&self, raw_text: &str) -> Intent {
        let trimmed = raw_text.trim();
        let lower = trimmed.to_lowercase();

        let intent = if let Some(rest) = strip_prefix_ci(trimmed, &lower, "email:") {
            self.parse_mailbox_command(rest.trim())
        } else if lower.starts_with("set reminder") {
            Intent::SetReminder {
                minutes: self.reminder_minutes(trimmed),
            }
        } else if lower.starts_with("reply") {
            self.parse_reply(trimmed)
        } else if lower.starts_with("delete spam") {
            Intent::DeleteSpam
        } else if lower.starts_with("label") {
            self.parse_label(trimmed)
        } else {
            Intent::FreeChat {
                text: trimmed.to_string(),
            }
        };

        debug!(intent = intent.name(), "Parsed command");
        intent
    }

    /// Sub-command after an `email:` prefix.
    fn parse_mailbox_command(&self, command: &str) -> Intent {
        let lower = command.to_lowercase();
        match lower.as_str() {
            "read inbox" => Intent::ReadInbox,
            "summarize inbox" => Intent::SummarizeInbox,
            "delete spam" => Intent::DeleteSpam,
            _ if lower.starts_with("reply") => self.parse_reply(command),
            _ if lower.starts_with("label") => self.parse_label(command),
            _ => Intent::Unknown {
                raw_text: command.to_string(),
            },
        }
    }

    fn parse_reply(&self, text: &str) -> Intent {
        positional(&self.reply, text)
            .map(|(index, message)| Intent::Reply { index, message })
            .unwrap_or_else(|| Intent::MalformedReply {
                raw_text: text.to_string(),
            })
    }

    fn parse_label(&self, text: &str) -> Intent {
        positional(&self.label, text)
            .map(|(index, label_name)| Intent::Label { index, label_name })
            .unwrap_or_else(|| Intent::MalformedLabel {
                raw_text: text.to_string(),
            })
    }

    /// First integer in the text; zero or overflow falls back to the default.
    fn reminder_minutes(&self, text: &str) -> u32 {
        self.number
            .find(text)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .filter(|minutes| *minutes > 0)
            .unwrap_or(DEFAULT_REMINDER_MINUTES)
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new()
    }
}

/// `<keyword> <positive integer> <rest>` → `(index, rest)`.
fn positional(pattern: &Regex, text: &str) -> Option<(usize, String)> {
    let caps = pattern.captures(text)?;
    let index: usize = caps.get(1)?.as_str().parse().ok()?;
    if index == 0 {
        return None;
    }
    let rest = caps.get(2)?.as_str().trim();
    if rest.is_empty() {
        return None;
    }
    Some((index, rest.to_string()))
}

/// Strip an ASCII prefix case-insensitively, returning the original-case rest.
fn strip_prefix_ci<'a>(text: &'a str, lower: &str, prefix: &str) -> Option<&'a str> {
    if lower.starts_with(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Intent {
        CommandParser::new().parse(text)
    }

    #[test]
    fn email_prefix_sub_commands() {
        assert_eq!(parse("email: read inbox"), Intent::ReadInbox);
        assert_eq!(parse("email:summarize inbox"), Intent::SummarizeInbox);
        assert_eq!(parse("EMAIL:  Read Inbox  "), Intent::ReadInbox);
        assert_eq!(parse("email: delete spam"), Intent::DeleteSpam);
    }

    #[test]
    fn email_prefix_unknown_sub_command() {
        assert_eq!(
            parse("email: archive everything"),
            Intent::Unknown {
                raw_text: "archive everything".into()
            }
        );
        assert_eq!(parse("email:"), Intent::Unknown { raw_text: "".into() });
    }

    #[test]
    fn email_prefix_positional_commands() {
        assert_eq!(
            parse("email: reply 1 Thanks!"),
            Intent::Reply {
                index: 1,
                message: "Thanks!".into()
            }
        );
        assert_eq!(
            parse("email: label 2"),
            Intent::MalformedLabel {
                raw_text: "label 2".into()
            }
        );
    }

    #[test]
    fn set_reminder_defaults_to_thirty() {
        assert_eq!(parse("set reminder"), Intent::SetReminder { minutes: 30 });
        assert_eq!(parse("set reminder 0"), Intent::SetReminder { minutes: 30 });
        assert_eq!(
            parse("set reminder 99999999999999999999"),
            Intent::SetReminder { minutes: 30 }
        );
    }

    #[test]
    fn set_reminder_takes_first_number() {
        assert_eq!(
            parse("set reminder 45 mins"),
            Intent::SetReminder { minutes: 45 }
        );
        assert_eq!(
            parse("Set Reminder every 10 or 20"),
            Intent::SetReminder { minutes: 10 }
        );
    }

    #[test]
    fn reply_with_index_and_message() {
        assert_eq!(
            parse("reply 2 sounds good"),
            Intent::Reply {
                index: 2,
                message: "sounds good".into()
            }
        );
        // Payload case and inner newlines are preserved.
        assert_eq!(
            parse("Reply 1 See You\nTomorrow"),
            Intent::Reply {
                index: 1,
                message: "See You\nTomorrow".into()
            }
        );
    }

    #[test]
    fn malformed_replies() {
        for text in ["reply abc", "reply", "reply 3", "reply 0 hello", "replying to you"] {
            assert!(
                matches!(parse(text), Intent::MalformedReply { .. }),
                "{text:?} should be malformed"
            );
        }
    }

    #[test]
    fn label_with_index_and_name() {
        assert_eq!(
            parse("label 3 Marketing Stuff"),
            Intent::Label {
                index: 3,
                label_name: "Marketing Stuff".into()
            }
        );
        assert!(matches!(
            parse("label x work"),
            Intent::MalformedLabel { .. }
        ));
    }

    #[test]
    fn delete_spam_prefix() {
        assert_eq!(parse("delete spam"), Intent::DeleteSpam);
        assert_eq!(parse("Delete spam please"), Intent::DeleteSpam);
    }

    #[test]
    fn everything_else_is_chat() {
        assert_eq!(
            parse("What's the weather?"),
            Intent::FreeChat {
                text: "What's the weather?".into()
            }
        );
        assert_eq!(parse("   "), Intent::FreeChat { text: "".into() });
        assert_eq!(parse(""), Intent::FreeChat { text: "".into() });
    }

    #[test]
    fn mailbox_routing() {
        assert!(parse("reply abc").is_mailbox());
        assert!(parse("email: nope").is_mailbox());
        assert!(!parse("set reminder 5").is_mailbox());
        assert!(!parse("hello").is_mailbox());
    }

    #[test]
    fn unicode_does_not_panic() {
        assert!(matches!(parse("émail: read"), Intent::FreeChat { .. }));
        assert!(matches!(parse("reply ١٢ hi"), Intent::MalformedReply { .. }));
    }
}
