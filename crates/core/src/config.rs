//! TOML-based receiver configuration.
//!
//! A configuration document is first deserialized into [`RawTelegramConfig`],
//! a field-for-field mirror of the document where everything is optional.
//! [`TelegramConfig::parse`] applies defaults and validation and produces the
//! typed config the notifier runs on. [`TelegramConfig::to_raw`] goes the
//! other way for persistence.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::credential::CredentialSource;
use crate::errors::{ConfigError, ValidationError};
use crate::secret::Secret;

/// Default Bot API origin.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Template rendered when `message` is not set.
pub const DEFAULT_MESSAGE_TEMPLATE: &str = "telegram.default.message";

// ---------------------------------------------------------------------------
// Parse mode
// ---------------------------------------------------------------------------

/// Text formatting dialect understood by `sendMessage`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[default]
    #[serde(rename = "HTML")]
    Html,
    Markdown,
    MarkdownV2,
    /// No formatting; `parse_mode` is left off the request.
    Plain,
}

impl ParseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "HTML",
            Self::Markdown => "Markdown",
            Self::MarkdownV2 => "MarkdownV2",
            Self::Plain => "Plain",
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self, Self::Plain)
    }
}

impl std::str::FromStr for ParseMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HTML" => Ok(Self::Html),
            "Markdown" => Ok(Self::Markdown),
            "MarkdownV2" => Ok(Self::MarkdownV2),
            "Plain" => Ok(Self::Plain),
            other => Err(ValidationError::invalid(
                "parse_mode",
                format!("unknown mode '{other}', expected one of HTML, Markdown, MarkdownV2, Plain"),
            )),
        }
    }
}

impl std::fmt::Display for ParseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Raw document shape
// ---------------------------------------------------------------------------

/// One `telegram_configs` entry exactly as written in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTelegramConfig {
    /// Bot API base URL (default `https://api.telegram.org`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Inline bot token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<Secret>,

    /// File holding the bot token, read on every send.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token_file: Option<PathBuf>,

    /// Target chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,

    /// Forum topic inside the chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_thread_id: Option<i64>,

    /// Name of the template rendered into the message text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// One of `HTML`, `Markdown`, `MarkdownV2`, `Plain`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,

    /// Deliver silently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_notifications: Option<bool>,

    /// Suppress link previews in the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_web_page_preview: Option<bool>,

    /// Notify about groups whose alerts are all resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_resolved: Option<bool>,
}

// ---------------------------------------------------------------------------
// Validated config
// ---------------------------------------------------------------------------

/// Validated settings of one Telegram receiver. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TelegramConfig {
    pub api_url: Url,
    pub bot_token: CredentialSource,
    pub chat_id: i64,
    pub message_thread_id: Option<i64>,
    pub message: String,
    pub parse_mode: ParseMode,
    pub disable_notifications: bool,
    pub disable_web_page_preview: bool,
    pub send_resolved: bool,
}

impl TelegramConfig {
    /// Apply defaults and validate a raw entry.
    pub fn parse(raw: RawTelegramConfig) -> Result<Self, ValidationError> {
        let bot_token = match (raw.bot_token, raw.bot_token_file) {
            (None, None) => return Err(ValidationError::MissingCredential),
            (Some(_), Some(_)) => return Err(ValidationError::ConflictingCredential),
            (Some(token), None) => {
                if token.expose().trim().is_empty() {
                    return Err(ValidationError::invalid("bot_token", "must not be empty"));
                }
                CredentialSource::Inline(token)
            }
            (None, Some(path)) => {
                if path.as_os_str().is_empty() {
                    return Err(ValidationError::invalid(
                        "bot_token_file",
                        "must not be empty",
                    ));
                }
                CredentialSource::File(path)
            }
        };

        let chat_id = raw.chat_id.ok_or(ValidationError::MissingField("chat_id"))?;

        let api_url = parse_api_url(raw.api_url.as_deref().unwrap_or(DEFAULT_API_URL))?;

        let parse_mode = match raw.parse_mode.as_deref() {
            Some(mode) => mode.parse()?,
            None => ParseMode::default(),
        };

        let message = raw
            .message
            .unwrap_or_else(|| DEFAULT_MESSAGE_TEMPLATE.to_string());

        let config = Self {
            api_url,
            bot_token,
            chat_id,
            message_thread_id: raw.message_thread_id,
            message,
            parse_mode,
            disable_notifications: raw.disable_notifications.unwrap_or(false),
            disable_web_page_preview: raw.disable_web_page_preview.unwrap_or(false),
            send_resolved: raw.send_resolved.unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a single `telegram_configs` entry from TOML.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let raw: RawTelegramConfig =
            toml::from_str(s).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Self::parse(raw).map_err(|source| ConfigError::InvalidReceiver {
            location: "telegram_config".into(),
            source,
        })
    }

    /// Check the invariants that hold for every usable config.
    ///
    /// [`parse`](Self::parse) calls this; it is public so configs built in
    /// code are held to the same rules.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.chat_id == 0 {
            return Err(ValidationError::invalid("chat_id", "must be non-zero"));
        }
        check_api_url(&self.api_url)?;
        if let Some(thread) = self.message_thread_id {
            if thread <= 0 {
                return Err(ValidationError::invalid(
                    "message_thread_id",
                    "must be a positive topic id",
                ));
            }
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::invalid("message", "must name a template"));
        }
        if let CredentialSource::Inline(token) = &self.bot_token {
            if token.expose().trim().is_empty() {
                return Err(ValidationError::invalid("bot_token", "must not be empty"));
            }
        }
        Ok(())
    }

    /// API base without a trailing slash, e.g. `https://api.telegram.org`.
    pub fn api_base(&self) -> &str {
        self.api_url.as_str().trim_end_matches('/')
    }

    /// Convert back to the document shape. A file-sourced token is written as
    /// its path, never as the file's content.
    pub fn to_raw(&self) -> RawTelegramConfig {
        let (bot_token, bot_token_file) = match &self.bot_token {
            CredentialSource::Inline(token) => (Some(token.clone()), None),
            CredentialSource::File(path) => (None, Some(path.clone())),
        };
        RawTelegramConfig {
            api_url: Some(self.api_url.to_string()),
            bot_token,
            bot_token_file,
            chat_id: Some(self.chat_id),
            message_thread_id: self.message_thread_id,
            message: Some(self.message.clone()),
            parse_mode: Some(self.parse_mode.as_str().to_string()),
            disable_notifications: Some(self.disable_notifications),
            disable_web_page_preview: Some(self.disable_web_page_preview),
            send_resolved: Some(self.send_resolved),
        }
    }

    /// Serialize as a single TOML table.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(&self.to_raw()).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw).map_err(|e| ValidationError::invalid("api_url", e.to_string()))?;
    check_api_url(&url)?;
    Ok(url)
}

fn check_api_url(url: &Url) -> Result<(), ValidationError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::invalid(
            "api_url",
            format!("unsupported scheme '{}', expected http or https", url.scheme()),
        ));
    }
    if !url.has_host() {
        return Err(ValidationError::invalid("api_url", "must include a host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ValidationError::invalid(
            "api_url",
            "must not carry a query or fragment",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Receivers document
// ---------------------------------------------------------------------------

/// A named receiver with its Telegram targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,

    #[serde(default)]
    pub telegram_configs: Vec<RawTelegramConfig>,
}

impl Receiver {
    /// Validate and return every Telegram target of this receiver.
    pub fn telegram_configs(&self) -> Result<Vec<TelegramConfig>, ConfigError> {
        self.telegram_configs
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                TelegramConfig::parse(raw.clone()).map_err(|source| ConfigError::InvalidReceiver {
                    location: format!("receiver '{}' telegram_configs[{}]", self.name, i),
                    source,
                })
            })
            .collect()
    }
}

/// Top-level document: a list of receivers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiversFile {
    #[serde(default)]
    pub receivers: Vec<Receiver>,
}

impl ReceiversFile {
    /// Load a receivers document from a TOML file.
    ///
    /// This does **not** validate the entries -- call
    /// [`validate`](Self::validate) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading receiver configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let file = Self::from_toml_str(&contents)?;

        debug!(receivers = file.receivers.len(), "configuration parsed successfully");
        Ok(file)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Check receiver names and every Telegram entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for receiver in &self.receivers {
            if receiver.name.trim().is_empty() {
                return Err(ConfigError::InvalidReceiverName {
                    name: receiver.name.clone(),
                    detail: "receiver name must not be empty".into(),
                });
            }
            if !seen.insert(receiver.name.as_str()) {
                return Err(ConfigError::InvalidReceiverName {
                    name: receiver.name.clone(),
                    detail: "receiver name is defined more than once".into(),
                });
            }
            receiver.telegram_configs()?;
        }
        Ok(())
    }

    /// Look up a receiver by name.
    pub fn receiver(&self, name: &str) -> Option<&Receiver> {
        self.receivers.iter().find(|r| r.name == name)
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = Self::load_from_file(path)?;
        file.validate()?;
        Ok(file)
    }
}
