//! Cross-module error taxonomy.
//!
//! # Responsibility
//! - Name the small set of failure categories every boundary maps onto.
//!
//! # Invariants
//! - Module error enums expose `kind()` instead of leaking transport details
//!   to UI-facing callers.

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Stable failure category shared by repository, resolver and interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No live identity was available for a persistence call.
    AuthenticationRequired,
    /// Referenced habit or month has no match.
    NotFound,
    /// Input failed a domain rule (cap exceeded, blank field, bad date).
    ValidationFailed,
    /// Language or persistence service unreachable or misconfigured.
    UpstreamUnavailable,
    /// Upstream returned a payload that does not fit the action schema.
    MalformedResponse,
}

impl ErrorKind {
    /// Stable snake_case label used in log lines and FFI envelopes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::NotFound => "not_found",
            Self::ValidationFailed => "validation_failed",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
