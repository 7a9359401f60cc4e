//! Helix API error types.
//!
//! Errors are classified so callers can tell a temporary outage from a
//! request that will never succeed:
//!
//! - **Transient**: network failures, HTTP 429, HTTP 5xx
//! - **Permanent**: any other non-success status

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelixErrorKind {
    Transient,
    Permanent,
}

/// A failed Helix API call.
#[derive(Debug, Error)]
pub struct HelixError {
    pub kind: HelixErrorKind,

    /// The HTTP status code, if a response was received.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for HelixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "Helix API error (HTTP {}): {}", code, self.message),
            None => write!(f, "Helix API error: {}", self.message),
        }
    }
}

impl HelixError {
    /// Classifies a non-success response status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            429 => HelixErrorKind::Transient,
            code if (500..600).contains(&code) => HelixErrorKind::Transient,
            _ => HelixErrorKind::Permanent,
        };
        Self {
            kind,
            status_code: Some(status),
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a transport-level failure.
    pub fn transport(message: impl Into<String>, source: reqwest::Error) -> Self {
        Self {
            kind: HelixErrorKind::Transient,
            status_code: source.status().map(|s| s.as_u16()),
            message: message.into(),
            source: Some(source),
        }
    }

    /// A request that could not be formed or whose result is unusable.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: HelixErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == HelixErrorKind::Transient
    }
}
