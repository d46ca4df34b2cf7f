//! Unified error type for the Parley service.

use parley_chat::ChatError;
use parley_session::SessionError;
use parley_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The chat broadcaster is gone.
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// A session store error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An I/O error from the HTTP listener.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let parley_err: ParleyError = err.into();
        assert!(matches!(parley_err, ParleyError::Transport(_)));
        assert!(parley_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_chat_error() {
        let parley_err: ParleyError = ChatError::Unavailable.into();
        assert!(matches!(parley_err, ParleyError::Chat(_)));
    }

    #[test]
    fn test_from_session_error() {
        let parley_err: ParleyError = SessionError::NotFound("abc".into()).into();
        assert!(matches!(parley_err, ParleyError::Session(_)));
        assert!(parley_err.to_string().contains("abc"));
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let parley_err: ParleyError = err.into();
        assert!(matches!(parley_err, ParleyError::Io(_)));
    }
}
