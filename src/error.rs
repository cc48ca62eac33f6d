//! Error types surfaced by the chat session core.

use thiserror::Error;

use crate::session::SessionState;

/// Result alias used throughout the session core.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;

/// Failures reported by [`crate::Session`] and [`crate::Transcript`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The caller supplied no user text.
    #[error("cannot submit an empty message")]
    EmptyInput,

    /// The operation is not valid in the session's current state.
    #[error("cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// A system turn was appended somewhere other than the head of the transcript.
    #[error("a system turn may only be the first turn of a transcript")]
    InvalidOrder,

    /// `submit` was called outside a tokio runtime, so the request has nowhere to run.
    #[error("no async runtime is available to run the request")]
    NoRuntime,

    /// The completion endpoint failed mid-request.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Failures produced by a [`crate::CompletionClient`].
#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("no API key configured (set it in the config file or via {env})")]
    MissingCredential { env: String },

    #[error("request to completion endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion endpoint reported an error: {message}")]
    Api { message: String },

    #[error("malformed stream payload: {0}")]
    Malformed(String),

    #[error("response stream closed before completion")]
    Interrupted,
}

impl SessionError {
    pub(crate) fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        SessionError::InvalidState { operation, state }
    }

    /// Whether the failure came from the remote endpoint rather than caller misuse.
    pub fn is_endpoint(&self) -> bool {
        matches!(self, SessionError::Endpoint(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_names_operation_and_state() {
        let err = SessionError::invalid_state("submit", SessionState::AwaitingResponse);
        assert_eq!(
            err.to_string(),
            "cannot submit while the session is awaiting a response"
        );
    }

    #[test]
    fn endpoint_errors_convert() {
        let err: SessionError = EndpointError::Status {
            status: 401,
            body: "bad key".to_string(),
        }
        .into();
        assert!(err.is_endpoint());
        assert_eq!(err.to_string(), "completion endpoint returned 401: bad key");
    }
}
