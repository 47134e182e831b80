//! Secret string wrapper and redaction helper.
//!
//! [`Secret`] keeps the bot token out of `Debug`/`Display` output so it cannot
//! slip into tracing fields or error messages by accident. [`Redactor`] masks
//! a resolved token inside strings assembled from foreign errors (transport
//! failures, URL parse errors, remote diagnostics).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Replacement text for a masked secret.
pub const REDACTED: &str = "<redacted>";

/// A string that must never be printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Return the underlying value. Only call this where the value is put on
    /// the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<secret>)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<secret>")
    }
}

// Serialized as the literal value: inline tokens round-trip through the
// configuration document unchanged.
impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret)
    }
}

/// Masks one known secret inside arbitrary text.
pub struct Redactor<'a> {
    secret: &'a str,
    encoded: String,
}

impl<'a> Redactor<'a> {
    pub fn new(secret: &'a Secret) -> Self {
        let encoded = url::form_urlencoded::byte_serialize(secret.expose().as_bytes()).collect();
        Self {
            secret: secret.expose(),
            encoded,
        }
    }

    /// Replace every occurrence of the secret, raw or percent-encoded, with
    /// [`REDACTED`].
    pub fn redact(&self, text: &str) -> String {
        if self.secret.is_empty() {
            return text.to_string();
        }
        let mut out = text.replace(self.secret, REDACTED);
        if self.encoded != self.secret {
            out = out.replace(&self.encoded, REDACTED);
        }
        out
    }
}
