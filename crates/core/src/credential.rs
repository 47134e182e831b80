//! Bot token sources.
//!
//! The token is either given inline or read from a file. File-sourced tokens
//! are read again on every [`resolve`](CredentialSource::resolve), so rotating
//! the file takes effect on the next notification without rebuilding the
//! notifier.

use std::path::PathBuf;

use tracing::debug;

use crate::errors::CredentialError;
use crate::secret::Secret;

/// Where the bot token comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Token given directly in the configuration.
    Inline(Secret),
    /// Path to a file whose trimmed content is the token.
    File(PathBuf),
}

impl CredentialSource {
    /// Short label for logs. Never includes the token.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Inline(_) => "inline",
            Self::File(_) => "file",
        }
    }

    /// Produce the current token. Nothing is cached between calls.
    pub async fn resolve(&self) -> Result<Secret, CredentialError> {
        match self {
            Self::Inline(secret) => Ok(secret.clone()),
            Self::File(path) => {
                let path_str = path.display().to_string();
                let contents = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| CredentialError::Io {
                        path: path_str.clone(),
                        source,
                    })?;
                let token = contents.trim();
                if token.is_empty() {
                    return Err(CredentialError::Empty { path: path_str });
                }
                debug!(path = %path_str, "resolved bot token from file");
                Ok(Secret::new(token))
            }
        }
    }
}
