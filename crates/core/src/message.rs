//! Turn and Transcript domain types.
//!
//! These are the core value objects that flow through the entire system:
//! User types a message → Transcript records it → Provider generates a reply →
//! Transcript records the reply.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};

/// Prefix that marks an assistant turn as a recorded failure.
pub const ERROR_MARKER: &str = "❌ Error:";

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The fire service officer using the consultant
    User,
    /// The AI consultant
    Assistant,
    /// System instructions. Only ever sent to the model, never stored in a transcript.
    System,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Whether turns with this role may be recorded in a transcript.
    pub fn is_conversational(&self) -> bool {
        matches!(self, Self::User | Self::Assistant)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged message. Stored in a [`Transcript`] it is a *turn*.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Set on assistant turns that record a failed model call
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create an error-marked assistant turn describing a failed call.
    pub fn error_reply(description: impl std::fmt::Display) -> Self {
        Self {
            role: Role::Assistant,
            content: format!(
                "{ERROR_MARKER} {description}\n\nPlease check your API key and try again."
            ),
            error: true,
        }
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            error: false,
        }
    }
}

/// The ordered history of turns for one session.
///
/// A transcript always opens with the assistant welcome turn it was created
/// with. It only grows by [`Transcript::append`]; there is no removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Message>,
}

impl Transcript {
    /// Start a transcript seeded with an assistant welcome turn.
    pub fn new(welcome: impl Into<String>) -> Self {
        Self {
            turns: vec![Message::assistant(welcome)],
        }
    }

    /// Add a turn to the end. Only user and assistant turns are accepted.
    pub fn append(&mut self, turn: Message) -> Result<(), SessionError> {
        if !turn.role.is_conversational() {
            return Err(SessionError::InvalidTurn(format!(
                "role '{}' cannot be recorded in a transcript",
                turn.role
            )));
        }
        self.turns.push(turn);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.turns.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.turns
    }

    pub fn first(&self) -> Option<&Message> {
        self.turns.first()
    }

    pub fn last(&self) -> Option<&Message> {
        self.turns.last()
    }

    /// The most recent `size` turns, oldest first.
    pub fn window(&self, size: usize) -> &[Message] {
        let start = self.turns.len().saturating_sub(size);
        &self.turns[start..]
    }

    /// Render every turn as `ROLE: content`, separated by blank lines.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role.as_str().to_uppercase(), t.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}
