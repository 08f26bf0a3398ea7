//! Authentication error taxonomy.
//!
//! ERROR HANDLING
//! ==============
//! Nothing in this taxonomy is allowed to escape the admission gate or the
//! session service uncaught. Decode and network failures degrade to safe
//! defaults: a credential that cannot be decoded is treated as expired, a
//! user fetch that fails marks the session unauthenticated.

/// Errors produced by credential decoding, session hydration, and guarding.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credential is not structurally decodable (wrong segment count,
    /// bad base64, invalid JSON). Always recovered locally.
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// The remote authority could not be reached or answered non-2xx.
    /// Recovered by falling back to the local decode, or by marking the
    /// session unauthenticated when no fallback exists for the operation.
    #[error("remote authority unavailable during {op}: {reason}")]
    RemoteAuthorityUnavailable { op: &'static str, reason: String },

    /// The credential's `exp` is in the past, absent, or undecodable.
    /// Fail-closed: forces the logout redirect with a cookie scrub.
    #[error("expired credential")]
    ExpiredCredential,

    /// Authenticated, but the user's role is not in the required set.
    /// Surfaced as the forbidden redirect, never as a login redirect.
    #[error("role mismatch: required one of {required:?}, user has {actual}")]
    RoleMismatch { required: Vec<String>, actual: String },

    /// A credential is present but the user record could not be hydrated.
    /// Surfaced to the guard as a recoverable state, not a redirect loop.
    #[error("hydration inconsistency: {0}")]
    HydrationInconsistency(String),
}

impl AuthError {
    /// Stable machine-readable code, used in logs.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedCredential(_) => "E_MALFORMED_CREDENTIAL",
            Self::RemoteAuthorityUnavailable { .. } => "E_REMOTE_UNAVAILABLE",
            Self::ExpiredCredential => "E_EXPIRED_CREDENTIAL",
            Self::RoleMismatch { .. } => "E_ROLE_MISMATCH",
            Self::HydrationInconsistency(_) => "E_HYDRATION_INCONSISTENCY",
        }
    }
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod tests;
