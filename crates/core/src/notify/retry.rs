//! HTTP status classification for the caller's retry loop.
//!
//! [`Retrier::check`] is total over every status code plus "no response",
//! and depends on the numeric status alone. The response body is accepted for
//! diagnostics ([`describe_body`]) but never changes the decision.

use serde::Deserialize;

/// Why a response was classified the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// 2xx.
    Ok,
    /// 429.
    RateLimited,
    /// 5xx.
    ServerError,
    /// 4xx other than 429.
    ClientError,
    /// 1xx or 3xx: a status `sendMessage` never legitimately answers with.
    UnexpectedStatus,
    /// No status at all, or one outside 100-599.
    MalformedResponse,
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::RateLimited => write!(f, "rate limited"),
            Self::ServerError => write!(f, "server error"),
            Self::ClientError => write!(f, "client error"),
            Self::UnexpectedStatus => write!(f, "unexpected status"),
            Self::MalformedResponse => write!(f, "malformed response"),
        }
    }
}

/// Outcome of classifying one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub retry: bool,
    pub reason: Reason,
}

impl Classification {
    const fn new(retry: bool, reason: Reason) -> Self {
        Self { retry, reason }
    }

    pub fn is_success(&self) -> bool {
        self.reason == Reason::Ok
    }
}

/// Stateless status-code classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Retrier;

impl Retrier {
    /// Classify a response. `status` is `None` when no response arrived.
    pub fn check(&self, status: Option<u16>, _body: Option<&[u8]>) -> Classification {
        match status {
            Some(200..=299) => Classification::new(false, Reason::Ok),
            Some(429) => Classification::new(true, Reason::RateLimited),
            Some(500..=599) => Classification::new(true, Reason::ServerError),
            Some(400..=499) => Classification::new(false, Reason::ClientError),
            Some(100..=199) | Some(300..=399) => {
                Classification::new(false, Reason::UnexpectedStatus)
            }
            Some(_) | None => Classification::new(true, Reason::MalformedResponse),
        }
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    description: Option<String>,
    parameters: Option<ApiErrorParameters>,
}

#[derive(Deserialize)]
struct ApiErrorParameters {
    retry_after: Option<u64>,
}

/// Pull the operator-facing diagnostic out of a Bot API error body, e.g.
/// `{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}`.
///
/// Falls back to the raw body (trimmed, capped) when it is not the usual JSON.
pub fn describe_body(body: &[u8]) -> Option<String> {
    const MAX_RAW: usize = 256;

    if let Ok(parsed) = serde_json::from_slice::<ApiErrorBody>(body) {
        let retry_after = parsed.parameters.and_then(|p| p.retry_after);
        return match (parsed.description, retry_after) {
            (Some(desc), Some(secs)) => Some(format!("{desc} (retry after {secs}s)")),
            (Some(desc), None) => Some(desc),
            (None, Some(secs)) => Some(format!("retry after {secs}s")),
            (None, None) => None,
        };
    }

    let raw = String::from_utf8_lossy(body);
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Some(raw.chars().take(MAX_RAW).collect())
}
