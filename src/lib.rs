//! Streaming chat session core for a terminal chat front-end.
//!
//! A [`Session`] keeps an ordered [`Transcript`], sends it to a
//! [`CompletionClient`] on every submitted message and exposes the reply
//! through a [`TokenSink`] while it streams in. [`OpenAiClient`] talks to
//! OpenAI-compatible endpoints; the `ui` module is the terminal front-end.

pub mod config;
pub mod error;
pub mod llm;
pub mod prompts;
pub mod session;
pub mod streaming;
pub mod transcript;
pub mod ui;

pub use config::Config;
pub use error::{EndpointError, SessionError};
pub use llm::{CompletionClient, OnFragment, OpenAiClient};
pub use session::{Session, SessionState};
pub use streaming::TokenSink;
pub use transcript::{Role, Transcript, Turn};
