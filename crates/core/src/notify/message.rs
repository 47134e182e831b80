//! `sendMessage` payload construction.

use std::borrow::Cow;

use serde::Serialize;
use tracing::warn;

use crate::config::{ParseMode, TelegramConfig};

/// Longest text `sendMessage` accepts, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Appended to text cut at [`MAX_MESSAGE_CHARS`].
pub const TRUNCATION_MARKER: &str = "…";

/// JSON body of one `sendMessage` call. Built fresh per notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i64>,
    pub text: String,
    #[serde(skip_serializing_if = "ParseMode::is_plain")]
    pub parse_mode: ParseMode,
    pub disable_web_page_preview: bool,
    pub disable_notification: bool,
}

impl OutboundMessage {
    /// Wrap already-rendered text with the receiver's delivery settings.
    ///
    /// Text longer than [`MAX_MESSAGE_CHARS`] is cut and marked rather than
    /// rejected, so one notify call always produces exactly one message.
    pub fn build(config: &TelegramConfig, rendered: String) -> Self {
        let text = match truncate(&rendered, MAX_MESSAGE_CHARS) {
            Cow::Borrowed(_) => rendered,
            Cow::Owned(cut) => {
                warn!(
                    chat_id = config.chat_id,
                    original_chars = rendered.chars().count(),
                    max_chars = MAX_MESSAGE_CHARS,
                    "truncated Telegram message"
                );
                cut
            }
        };

        Self {
            chat_id: config.chat_id,
            message_thread_id: config.message_thread_id,
            text,
            parse_mode: config.parse_mode,
            disable_web_page_preview: config.disable_web_page_preview,
            disable_notification: config.disable_notifications,
        }
    }
}

/// Cut `text` to at most `max_chars` characters including the marker.
///
/// Counts Unicode scalar values, so a multi-byte character is never split.
/// The count runs over the rendered markup, so a cut can land inside an
/// entity such as `&amp;` or leave a `<b>` or `*` unclosed.
pub fn truncate(text: &str, max_chars: usize) -> Cow<'_, str> {
    if text.char_indices().nth(max_chars).is_none() {
        return Cow::Borrowed(text);
    }
    let keep = max_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
    let end = text
        .char_indices()
        .nth(keep)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let mut out = String::with_capacity(end + TRUNCATION_MARKER.len());
    out.push_str(&text[..end]);
    out.push_str(TRUNCATION_MARKER);
    Cow::Owned(out)
}
