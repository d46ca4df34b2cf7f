//! Error types for the session layer.

/// Errors returned by the session registry and its actor handle.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given token. Either it was never issued
    /// or the expiry sweep has already removed it.
    #[error("session not found for token {0}")]
    NotFound(String),

    /// The generated token is already in use. The existing session is left
    /// untouched; callers retry with a fresh token.
    #[error("token already in use")]
    Collision,

    /// The session store task has stopped and can no longer take requests.
    #[error("session store is unavailable")]
    Unavailable,
}
