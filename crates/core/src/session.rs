//! Session state — identity, transcript, and profile for one consultation.
//!
//! A session is created on first interaction and replaced wholesale by
//! [`Session::reset`]. Nothing is archived: once a session is reset or
//! dropped, its data is gone unless the user exported it.

use crate::error::SessionError;
use crate::message::{Message, Transcript};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

/// The assistant turn every transcript opens with.
pub const WELCOME_MESSAGE: &str = concat!(
    "Hello! I'm your AI consultant for Community Risk Assessment. ",
    "Before we begin, I'd like to understand who I'm working with.\n\n",
    "**Could you tell me your name and your role with the fire department?**\n\n",
    "For example: \"I'm Chief Smith from the Springfield Fire Department\" or ",
    "\"I'm Lt. Johnson, we're a volunteer department in rural Ohio\".",
);

/// Last timestamp handed out and how many ids already used it.
static LAST_STAMP: Mutex<(String, u32)> = Mutex::new((String::new(), 0));

/// Timestamp-derived session identifier (`YYYYMMDD_HHMMSS`).
///
/// Ids created within the same second get a `_N` suffix so they never collide
/// inside one process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate an id from the current local time.
    pub fn generate() -> Self {
        Self::from_stamp(chrono::Local::now().format("%Y%m%d_%H%M%S").to_string())
    }

    fn from_stamp(stamp: String) -> Self {
        let mut last = LAST_STAMP.lock().unwrap_or_else(|e| e.into_inner());
        Self::next_after(&mut last, stamp)
    }

    fn next_after(last: &mut (String, u32), stamp: String) -> Self {
        if last.0 == stamp {
            last.1 = last.1.saturating_add(1);
            Self(format!("{stamp}_{}", last.1))
        } else {
            *last = (stamp.clone(), 0);
            Self(stamp)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The live state of one ongoing consultation.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    transcript: Transcript,
    profile: BTreeMap<String, String>,
}

impl Session {
    /// Start a fresh session: new id, empty profile, welcome turn only.
    pub fn create() -> Self {
        let session = Self {
            id: SessionId::generate(),
            transcript: Transcript::new(WELCOME_MESSAGE),
            profile: BTreeMap::new(),
        };
        debug!(session_id = %session.id, "Session created");
        session
    }

    /// Discard this session and start a new one.
    pub fn reset(self) -> Self {
        debug!(session_id = %self.id, turns = self.transcript.len(), "Session reset");
        Self::create()
    }

    /// Record a turn at the end of the transcript.
    pub fn append(&mut self, turn: Message) -> Result<(), SessionError> {
        self.transcript.append(turn)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn profile(&self) -> &BTreeMap<String, String> {
        &self.profile
    }

    /// Set a free-form profile entry (name, role, department type, ...).
    pub fn set_profile(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.profile.insert(key.into(), value.into());
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::create()
    }
}
