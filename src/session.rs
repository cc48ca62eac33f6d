//! Streaming chat session: one transcript, at most one request in flight.

use std::sync::Arc;

use strum::Display;
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use uuid::Uuid;

use crate::error::{EndpointError, Result, SessionError};
use crate::llm::CompletionClient;
use crate::prompts::SYSTEM_PROMPT;
use crate::streaming::TokenSink;
use crate::transcript::{Transcript, Turn};

/// Lifecycle of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    #[strum(serialize = "idle")]
    Idle,
    #[strum(serialize = "awaiting a response")]
    AwaitingResponse,
}

/// The request currently being streamed.
struct InFlight {
    sink: TokenSink,
    outcome: oneshot::Receiver<std::result::Result<String, EndpointError>>,
}

/// Owns a conversation and drives one completion request at a time.
///
/// `submit` starts a request and returns immediately; fragments land in a
/// [`TokenSink`] readable through [`Session::live_buffer`]. The finished
/// reply is folded into the transcript by whichever of
/// [`Session::poll_response`] or [`Session::wait_response`] observes it.
pub struct Session {
    id: Uuid,
    client: Arc<dyn CompletionClient>,
    system_turn: Turn,
    transcript: Transcript,
    in_flight: Option<InFlight>,
}

impl Session {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        let system_turn = Turn::system(SYSTEM_PROMPT);
        Self {
            id: Uuid::new_v4(),
            client,
            transcript: Transcript::seeded(system_turn.clone()),
            system_turn,
            in_flight: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight.is_some() {
            SessionState::AwaitingResponse
        } else {
            SessionState::Idle
        }
    }

    /// Append a user turn and start streaming the assistant's reply.
    ///
    /// The request runs as a task on the current tokio runtime; without one
    /// the call fails with [`SessionError::NoRuntime`] and nothing changes.
    pub fn submit(&mut self, user_text: impl Into<String>) -> Result<()> {
        if self.in_flight.is_some() {
            return Err(SessionError::invalid_state("submit", self.state()));
        }
        let user_text = user_text.into();
        if user_text.trim().is_empty() {
            return Err(SessionError::EmptyInput);
        }
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        self.transcript.append(Turn::user(user_text))?;

        let sink = TokenSink::new();
        let (tx, rx) = oneshot::channel();
        let turns = self.transcript.to_vec();
        let client = Arc::clone(&self.client);
        let writer = sink.clone();

        tracing::debug!(session = %self.id, turns = turns.len(), "submitting turn");
        runtime.spawn(async move {
            let result = client
                .send(&turns, &mut |fragment: &str| writer.append(fragment))
                .await;
            // The session may have been dropped; nobody is left to tell.
            let _ = tx.send(result);
        });

        self.in_flight = Some(InFlight { sink, outcome: rx });
        Ok(())
    }

    /// Reconcile a finished request without blocking.
    ///
    /// Returns `None` while idle or while the reply is still streaming.
    pub fn poll_response(&mut self) -> Option<Result<Turn>> {
        let in_flight = self.in_flight.as_mut()?;
        let received = match in_flight.outcome.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(EndpointError::Interrupted),
        };
        Some(self.finish(received))
    }

    /// Wait for the in-flight request and reconcile it.
    pub async fn wait_response(&mut self) -> Result<Turn> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return Err(SessionError::invalid_state(
                "wait for a response",
                SessionState::Idle,
            ));
        };
        let received = (&mut in_flight.outcome)
            .await
            .unwrap_or(Err(EndpointError::Interrupted));
        self.finish(received)
    }

    /// Submit and wait for the reply in one step.
    pub async fn ask(&mut self, user_text: impl Into<String>) -> Result<Turn> {
        self.submit(user_text)?;
        self.wait_response().await
    }

    /// Re-seed the transcript with only the system turn.
    pub fn reset(&mut self) -> Result<()> {
        if self.in_flight.is_some() {
            return Err(SessionError::invalid_state("reset", self.state()));
        }
        self.transcript.reset(Some(self.system_turn.clone()));
        tracing::debug!(session = %self.id, "transcript reset");
        Ok(())
    }

    /// Turns to display, in conversation order, without the system turn.
    pub fn transcript(&self) -> impl Iterator<Item = &Turn> + Clone + '_ {
        self.transcript.displayable()
    }

    /// The full context that would be sent with the next request.
    pub fn full_transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Partial reply streamed so far, or `None` while idle.
    pub fn live_buffer(&self) -> Option<String> {
        self.in_flight.as_ref().map(|in_flight| in_flight.sink.current())
    }

    fn finish(&mut self, received: std::result::Result<String, EndpointError>) -> Result<Turn> {
        let Some(in_flight) = self.in_flight.take() else {
            return Err(SessionError::invalid_state(
                "finish a response",
                SessionState::Idle,
            ));
        };

        match received {
            Ok(final_text) => {
                let streamed = in_flight.sink.current();
                if streamed != final_text {
                    tracing::warn!(
                        session = %self.id,
                        streamed_len = streamed.len(),
                        final_len = final_text.len(),
                        "final reply differs from streamed fragments"
                    );
                }
                let turn = Turn::assistant(final_text);
                self.transcript.append(turn.clone())?;
                tracing::debug!(session = %self.id, turns = self.transcript.len(), "reply recorded");
                Ok(turn)
            }
            Err(err) => {
                tracing::warn!(session = %self.id, error = %err, "completion request failed");
                Err(err.into())
            }
        }
    }
}
