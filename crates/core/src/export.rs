//! Session export — the JSON document a user can save from a consultation.
//!
//! Export-only: nothing in crabot reads these files back.

use crate::message::Message;
use crate::session::Session;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Snapshot of a session in its exported form.
#[derive(Debug, Clone, Serialize)]
pub struct SessionExport {
    pub session_id: String,

    /// ISO-8601 time the export was produced
    pub timestamp: DateTime<Local>,

    /// The session's free-form profile map
    pub user_info: BTreeMap<String, String>,

    pub messages: Vec<Message>,

    pub message_count: usize,
}

impl SessionExport {
    /// Capture the current state of `session`.
    pub fn from_session(session: &Session) -> Self {
        let messages = session.transcript().as_slice().to_vec();
        Self {
            session_id: session.id().to_string(),
            timestamp: Local::now(),
            user_info: session.profile().clone(),
            message_count: messages.len(),
            messages,
        }
    }

    /// File name the export is offered under: `CRA_<session id>.json`.
    pub fn file_name(&self) -> String {
        format!("CRA_{}.json", self.session_id)
    }

    /// Pretty-printed JSON document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the document into `dir`, creating it if needed. Returns the
    /// path written.
    pub fn write_to(&self, dir: &Path) -> crate::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.to_json()?)?;
        Ok(path)
    }
}
