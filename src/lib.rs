//! Mail Assist: a WhatsApp email assistant.

pub mod assistant;
pub mod auth;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod mailbox;
pub mod reminders;
pub mod server;
pub mod store;
