//! Notification subsystem for delivering alert groups to Telegram.
//!
//! A [`TelegramNotifier`] renders the group through a [`Renderer`], wraps the
//! text in an [`OutboundMessage`], sends it, and classifies the response with
//! the [`Retrier`] so the caller's retry loop knows what to do next.

pub mod message;
pub mod retry;
pub mod telegram;
pub mod template;

pub use message::OutboundMessage;
pub use retry::{Classification, Reason, Retrier};
pub use telegram::TelegramNotifier;
pub use template::{DefaultRenderer, Renderer};
