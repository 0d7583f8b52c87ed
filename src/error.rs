use thiserror::Error;

/// The model failed to load. Recoverable: the session manager stays in
/// `Failed` and the caller may retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("model failed to load: {0}")]
pub struct LoadError(pub String);

/// Errors surfaced by the session core. Cancellation is deliberately
/// absent: it is a silent terminal status, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    LoadFailure(#[from] LoadError),
    /// The session was not ready when a conversation was requested.
    /// The caller must load a model first.
    #[error("session not ready, load a model first")]
    ConversationUnavailable,
    /// The stream produced a terminal error. Session state is intact;
    /// the prompt may be re-submitted.
    #[error("generation failed: {0}")]
    GenerationFailure(String),
}
