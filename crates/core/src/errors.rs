//! Error types for the tgnotify core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! None of these types ever carry a resolved bot token. Errors produced while
//! a token is in scope are built from strings that have already passed
//! through [`Redactor`](crate::secret::Redactor).

use thiserror::Error;

use crate::context::ContextError;
use crate::notify::retry::Reason;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// A receiver configuration that cannot be turned into a working notifier.
///
/// Fatal at construction time: a notifier is never built from a config that
/// fails validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither `bot_token` nor `bot_token_file` was given.
    #[error("one of 'bot_token' or 'bot_token_file' must be configured")]
    MissingCredential,

    /// Both `bot_token` and `bot_token_file` were given.
    #[error("at most one of 'bot_token' and 'bot_token_file' must be configured")]
    ConflictingCredential,

    /// A required field is absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A field is present but its value is unusable.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, detail: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            detail: detail.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration file errors
// ---------------------------------------------------------------------------

/// Errors from loading and validating a receivers document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// TOML serialization error.
    #[error("configuration serialization error: {0}")]
    SerializeError(String),

    /// One telegram config inside the document failed validation.
    #[error("{location}: {source}")]
    InvalidReceiver {
        location: String,
        #[source]
        source: ValidationError,
    },

    /// Two receivers share a name, or a receiver has no name.
    #[error("invalid receiver name '{name}': {detail}")]
    InvalidReceiverName {
        name: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Credential errors
// ---------------------------------------------------------------------------

/// Errors from resolving the bot token. Only ever mention the file path.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The token file is missing or unreadable.
    #[error("failed to read bot token file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The token file holds nothing but whitespace.
    #[error("bot token file '{path}' is empty")]
    Empty { path: String },
}

// ---------------------------------------------------------------------------
// Template errors
// ---------------------------------------------------------------------------

/// Errors raised by a [`Renderer`](crate::notify::template::Renderer).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// No template is registered under the requested name.
    #[error("template '{0}' is not defined")]
    UnknownTemplate(String),

    /// The template rendered to an empty string.
    #[error("template '{0}' rendered an empty message")]
    Empty(String),

    /// Any other rendering failure reported by the engine.
    #[error("failed to render template '{name}': {detail}")]
    Render {
        name: String,
        detail: String,
    },
}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

/// Errors from a single Telegram notify attempt.
///
/// [`NotifyError::retriable`] tells the caller's retry loop whether a later
/// attempt with the same inputs might succeed.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Rendering the message failed. Surfaced unmodified.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The bot token could not be resolved.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The request could not be constructed.
    #[error("failed to build Telegram request: {0}")]
    Request(String),

    /// Network-level failure before any HTTP status was received.
    #[error("Telegram request failed: {message}")]
    Transport {
        message: String,
        retriable: bool,
    },

    /// The caller's context ended before Telegram answered.
    #[error("Telegram request aborted: {0}")]
    Context(#[from] ContextError),

    /// Telegram answered with a non-success status.
    #[error("Telegram API returned HTTP {status} ({reason}): {description}")]
    Remote {
        status: u16,
        reason: Reason,
        description: String,
        retriable: bool,
    },
}

impl NotifyError {
    /// Whether the caller should retry the same notification later.
    pub fn retriable(&self) -> bool {
        match self {
            Self::Template(_) | Self::Credential(_) | Self::Request(_) => false,
            Self::Transport { retriable, .. } | Self::Remote { retriable, .. } => *retriable,
            Self::Context(_) => true,
        }
    }
}
