//! tgnotify core library.
//!
//! This crate turns a group of firing/resolved alerts into one Telegram Bot
//! API `sendMessage` call: receiver configuration, bot token resolution,
//! message building, response classification, and the notifier that ties
//! them together under a caller-supplied cancellation context.

pub mod config;
pub mod context;
pub mod credential;
pub mod errors;
pub mod models;
pub mod notify;
pub mod secret;

// Re-exports for convenience.
pub use config::{ReceiversFile, TelegramConfig};
pub use context::DispatchContext;
pub use models::{Alert, AlertGroup};
pub use notify::TelegramNotifier;
