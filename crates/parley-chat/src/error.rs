/// Errors returned by [`ChatHandle`](crate::ChatHandle) calls.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The broadcaster task has stopped and can no longer take requests.
    #[error("chat broadcaster is unavailable")]
    Unavailable,
}
