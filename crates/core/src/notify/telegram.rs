//! Telegram Bot API notifier.
//!
//! Sends one `sendMessage` call per alert group and reports whether a failed
//! attempt is worth retrying. Retrying itself is left to the caller.

use std::error::Error as _;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::TelegramConfig;
use crate::context::DispatchContext;
use crate::errors::{NotifyError, TemplateError, ValidationError};
use crate::models::{AlertGroup, AlertStatus};
use crate::secret::{Redactor, Secret};

use super::message::OutboundMessage;
use super::retry::{describe_body, Retrier};
use super::template::{DefaultRenderer, Renderer};

/// Most of an error response body kept for diagnostics.
const MAX_DIAGNOSTIC_BODY_BYTES: usize = 4096;

/// Telegram `sendMessage` notifier for one configured chat.
pub struct TelegramNotifier {
    config: TelegramConfig,
    renderer: Arc<dyn Renderer>,
    http: reqwest::Client,
    retrier: Retrier,
}

impl TelegramNotifier {
    /// Create a notifier. The config is validated here so a broken receiver
    /// fails at setup rather than on its first alert.
    ///
    /// `http` carries the transport settings (TLS, proxy, timeouts); the
    /// per-call deadline comes from the [`DispatchContext`] given to
    /// [`notify`](Self::notify).
    pub fn new(
        config: TelegramConfig,
        renderer: Arc<dyn Renderer>,
        http: reqwest::Client,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        if let Some(dialect) = renderer.dialect() {
            if dialect != config.parse_mode {
                return Err(ValidationError::invalid(
                    "parse_mode",
                    format!(
                        "renderer writes {dialect} but the receiver sends {}",
                        config.parse_mode
                    ),
                ));
            }
        }
        info!(
            chat_id = config.chat_id,
            api_url = %config.api_base(),
            credential = config.bot_token.kind(),
            parse_mode = %config.parse_mode,
            "initializing Telegram notifier"
        );
        Ok(Self {
            config,
            renderer,
            http,
            retrier: Retrier,
        })
    }

    /// Create a notifier using the built-in templates, escaped for the
    /// receiver's parse mode.
    pub fn with_default_renderer(
        config: TelegramConfig,
        http: reqwest::Client,
    ) -> Result<Self, ValidationError> {
        let renderer = Arc::new(DefaultRenderer::for_config(&config));
        Self::new(config, renderer, http)
    }

    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }

    pub fn retrier(&self) -> &Retrier {
        &self.retrier
    }

    /// Deliver `group` as a single Telegram message.
    ///
    /// `Ok(())` means delivered (or skipped because resolved notifications are
    /// disabled). On `Err(e)`, [`NotifyError::retriable`] says whether the
    /// caller should try again. No error carries the bot token.
    #[instrument(
        skip_all,
        fields(receiver = %group.receiver, chat_id = self.config.chat_id, alerts = group.alerts.len())
    )]
    pub async fn notify(
        &self,
        ctx: &DispatchContext,
        group: &AlertGroup,
    ) -> Result<(), NotifyError> {
        if !self.config.send_resolved && group.status() == AlertStatus::Resolved {
            debug!("all alerts resolved and send_resolved is off, skipping");
            return Ok(());
        }

        let text = self.renderer.render(&self.config.message, group)?;
        if text.trim().is_empty() {
            return Err(TemplateError::Empty(self.config.message.clone()).into());
        }
        let message = OutboundMessage::build(&self.config, text);

        let token = self.config.bot_token.resolve().await?;
        let redactor = Redactor::new(&token);

        let url = self
            .send_message_url(&token)
            .map_err(|e| NotifyError::Request(redactor.redact(&e.to_string())))?;

        debug!(chars = message.text.chars().count(), "sending Telegram message");

        // Dropping the pending request on cancellation aborts the connection.
        let request = self.http.post(url).json(&message).send();
        let response = tokio::select! {
            biased;
            reason = ctx.done() => {
                warn!(%reason, "Telegram request abandoned");
                return Err(reason.into());
            }
            result = request => match result {
                Ok(response) => response,
                Err(e) => return Err(self.send_error(e, &redactor)),
            },
        };

        let status = response.status().as_u16();
        let body = tokio::select! {
            biased;
            reason = ctx.done() => {
                warn!(status, %reason, "Telegram response body abandoned");
                return Err(reason.into());
            }
            body = read_capped(response, MAX_DIAGNOSTIC_BODY_BYTES) => body,
        };

        let verdict = self.retrier.check(Some(status), body.as_deref());
        if verdict.is_success() {
            info!(status, "Telegram message sent successfully");
            return Ok(());
        }

        let description = body
            .as_deref()
            .and_then(describe_body)
            .map(|d| redactor.redact(&d))
            .unwrap_or_else(|| "no description returned".to_string());
        warn!(
            status,
            reason = %verdict.reason,
            retry = verdict.retry,
            description = %description,
            "Telegram API returned error"
        );
        Err(NotifyError::Remote {
            status,
            reason: verdict.reason,
            description,
            retriable: verdict.retry,
        })
    }

    /// A request that could not be built is permanent; anything that failed
    /// on the way to Telegram goes through the classifier as "no response".
    fn send_error(&self, err: reqwest::Error, redactor: &Redactor) -> NotifyError {
        let builder = err.is_builder();
        let message = redactor.redact(&error_chain(err));
        if builder {
            warn!(error = %message, "Telegram request could not be built");
            return NotifyError::Request(message);
        }
        let verdict = self.retrier.check(None, None);
        warn!(error = %message, retry = verdict.retry, "Telegram request failed");
        NotifyError::Transport {
            message,
            retriable: verdict.retry,
        }
    }

    /// `{api_url}/bot{token}/sendMessage`.
    fn send_message_url(&self, token: &Secret) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "{}/bot{}/sendMessage",
            self.config.api_base(),
            token.expose()
        ))
    }
}

/// Read at most `limit` bytes of the body. `None` if the read fails before
/// anything arrives.
async fn read_capped(mut response: reqwest::Response, limit: usize) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = limit - body.len();
                if chunk.len() >= room {
                    body.extend_from_slice(&chunk[..room]);
                    return Some(body);
                }
                body.extend_from_slice(&chunk);
            }
            Ok(None) => return Some(body),
            Err(e) => {
                debug!(error = %e.without_url(), "failed to read Telegram response body");
                return (!body.is_empty()).then_some(body);
            }
        }
    }
}

/// Flatten a reqwest error and its sources into one line, without the URL.
fn error_chain(err: reqwest::Error) -> String {
    let err = err.without_url();
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
