//! Typed failures from the catalog backend.
//!
//! `NoActiveSession` is the one outcome the gateway recovers from; every other
//! variant passes through the gateway unchanged.
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Message shapes the catalog and its client libraries use for a dead session.
const SESSION_SIGNATURE: &str =
    r"(?i)(no instance of \w+ has been created|no active session|session (has )?expired)";

const MAX_MESSAGE_CHARS: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no active session: {0}")]
    NoActiveSession(String),

    #[error("cannot reconnect: no stored credentials")]
    MissingCredentials,

    #[error("failed to reconnect: {0}")]
    Reconnect(#[source] Box<BackendError>),

    #[error("{method} {url} failed: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },

    #[error("catalog returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected catalog response: {0}")]
    Decode(String),

    #[error("unknown tag: {0}")]
    UnknownTag(String),
}

impl BackendError {
    /// True only for the session-invalidation signature that triggers a reconnect.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, BackendError::NoActiveSession(_))
    }

    /// Classify a non-2xx response. A 401 is the structured signal; the message
    /// pattern is the fallback for gateways that report it with another status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = summarize_body(body);
        if status == 401 || matches_session_signature(&message) {
            BackendError::NoActiveSession(message)
        } else {
            BackendError::Api { status, message }
        }
    }

    /// Classify a transport-level failure (no HTTP status available).
    pub fn transport(method: &'static str, url: &str, message: String) -> Self {
        if matches_session_signature(&message) {
            return BackendError::NoActiveSession(message);
        }
        BackendError::Transport {
            method,
            url: url.to_string(),
            message,
        }
    }
}

pub fn matches_session_signature(message: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(SESSION_SIGNATURE).expect("session signature pattern is valid"))
        .is_match(message)
}

fn summarize_body(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["errorMessage", "message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    let message = from_json.unwrap_or_else(|| body.trim().to_string());
    crate::util::truncate_chars(&message, MAX_MESSAGE_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_status_is_a_dead_session() {
        let err = BackendError::from_status(401, r#"{"errorMessage":"token rejected"}"#);
        assert!(err.is_session_expired());
        assert_eq!(err.to_string(), "no active session: token rejected");
    }

    #[test]
    fn session_message_is_recognized_regardless_of_status() {
        let err = BackendError::from_status(
            500,
            "No instance of AtlanClient has been created for this session",
        );
        assert!(err.is_session_expired());
        let err = BackendError::transport("GET", "https://x", "No active session".into());
        assert!(err.is_session_expired());
    }

    #[test]
    fn unrelated_failures_keep_their_shape() {
        let err = BackendError::from_status(404, r#"{"message":"not found"}"#);
        assert!(!err.is_session_expired());
        assert!(matches!(err, BackendError::Api { status: 404, .. }));
        let err = BackendError::transport("POST", "https://x", "connection refused".into());
        assert!(matches!(err, BackendError::Transport { .. }));
    }
}
