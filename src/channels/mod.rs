//! Outbound messaging channels.
//!
//! Inbound WhatsApp messages arrive through the webhook in `server`; this
//! module owns delivery of the reply text back to the user.

pub mod cli;
pub mod whatsapp;

pub use cli::CliChannel;
pub use whatsapp::{LogMessenger, TwilioWhatsApp};

use async_trait::async_trait;

use crate::error::ChannelError;

/// Delivers a reply to a channel address.
#[async_trait]
pub trait Messenger: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, to: &str, body: &str) -> Result<(), ChannelError>;
}

/// Split text into chunks of at most `max_chars` characters, preferring
/// line breaks, then spaces.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let limit = match remaining.char_indices().nth(max_chars) {
            Some((byte_idx, _)) => byte_idx,
            None => {
                chunks.push(remaining.to_string());
                break;
            }
        };

        let window = &remaining[..limit];
        let split_at = if remaining[limit..].starts_with(['\n', ' ']) {
            limit
        } else {
            window
                .rfind('\n')
                .or_else(|| window.rfind(' '))
                .filter(|&i| i > 0)
                .unwrap_or(limit)
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
