//! Ordered conversation history.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{Result, SessionError};

/// Speaker of a turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in the conversation, tagged with its speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }
}

/// Append-only log of turns in conversation order.
///
/// At most one system turn exists and, when present, it is the first element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transcript whose first turn is `seed`.
    pub fn seeded(seed: Turn) -> Self {
        Self { turns: vec![seed] }
    }

    /// Add a turn at the end of the conversation.
    ///
    /// A system turn is only accepted by an empty transcript.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        if turn.is_system() && !self.turns.is_empty() {
            return Err(SessionError::InvalidOrder);
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Every turn in insertion order, system turn included.
    pub fn all(&self) -> impl Iterator<Item = &Turn> + Clone + '_ {
        self.turns.iter()
    }

    /// Turns meant for display: everything except the system turn.
    pub fn displayable(&self) -> impl Iterator<Item = &Turn> + Clone + '_ {
        self.turns.iter().filter(|turn| !turn.is_system())
    }

    /// Drop every turn, optionally leaving `seed` as the new first element.
    pub fn reset(&mut self, seed: Option<Turn>) {
        self.turns.clear();
        self.turns.extend(seed);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Owned copy of the full context, used when a request outlives the borrow.
    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.clone()
    }
}
