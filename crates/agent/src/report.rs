//! Report synthesis.
//!
//! A report is produced by one non-streamed call that sees the whole
//! transcript and a bounded prefix of the knowledge text. Reports are
//! derived on demand and never stored in the session.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crabot_core::error::{ProviderError, ReportError};
use crabot_core::message::{Message, Transcript};
use crabot_core::provider::{Provider, ProviderRequest};
use crabot_core::session::SessionId;
use tracing::{info, warn};

/// Sections every report is asked to contain, in order.
pub const REPORT_SECTIONS: [&str; 8] = [
    "Executive Summary",
    "Department Information",
    "Community Profile",
    "Identified Risks (categorized and prioritized)",
    "Risk Analysis & Interconnections",
    "Data Sources Used",
    "Key Recommendations",
    "Next Steps",
];

pub const DEFAULT_PREFIX_CHARS: usize = 3000;

/// Transcripts longer than this many turns are ready for a report.
pub const DEFAULT_MIN_TURNS: usize = 10;

const REPORT_INSTRUCTION: &str = "You are an expert in creating Community Risk Assessment reports for fire departments.";

/// Whether a transcript has enough material to offer a report.
pub fn report_ready(transcript: &Transcript, min_turns: usize) -> bool {
    transcript.len() > min_turns
}

/// The first `max_chars` characters of `text`, cut on a char boundary.
pub fn knowledge_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Turns a transcript into a CRA report with a single model call.
pub struct ReportSynthesizer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    prefix_chars: usize,
    timeout: Duration,
}

impl ReportSynthesizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            prefix_chars: DEFAULT_PREFIX_CHARS,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// How much of the knowledge text goes into the report instruction.
    pub fn with_prefix_chars(mut self, chars: usize) -> Self {
        self.prefix_chars = chars;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build_request(&self, transcript: &Transcript, knowledge: &str) -> ProviderRequest {
        let system = format!(
            "{REPORT_INSTRUCTION}\n\nREFERENCE KNOWLEDGE:\n{}",
            knowledge_prefix(knowledge, self.prefix_chars)
        );

        let sections = REPORT_SECTIONS
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{}. {s}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        let user = format!(
            "Based on the following conversation with a fire department officer, \
             create a comprehensive Community Risk Assessment (CRA) report.\n\n\
             {}\n\n\
             Create a professional CRA report in markdown format with these sections:\n\
             {sections}\n\n\
             Make it actionable and professional.",
            transcript.render()
        );

        ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature: self.temperature,
            max_tokens: None,
            stream: false,
        }
    }

    /// Generate the report text. The model's answer is returned verbatim.
    pub async fn synthesize(
        &self,
        transcript: &Transcript,
        knowledge: &str,
    ) -> Result<String, ReportError> {
        if !self.provider.has_credential() {
            return Err(ProviderError::MissingCredential.into());
        }

        let request = self.build_request(transcript, knowledge);
        info!(model = %self.model, turns = transcript.len(), "Generating report");

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| ProviderError::Timeout(self.timeout.as_secs()))?
            .inspect_err(|e| warn!(error = %e, "Report generation failed"))?;

        if let Some(usage) = &response.usage {
            info!(total_tokens = usage.total_tokens, "Report generated");
        }
        Ok(response.message.content)
    }
}

/// A generated report, ready to show or save.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub session_id: SessionId,
    pub markdown: String,
}

impl Report {
    pub fn new(session_id: SessionId, markdown: impl Into<String>) -> Self {
        Self {
            session_id,
            markdown: markdown.into(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("CRA_Report_{}.md", self.session_id)
    }

    /// Write the raw markdown into `dir` and return the file path.
    pub fn write_to(&self, dir: &Path) -> crabot_core::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, &self.markdown)?;
        info!(path = %path.display(), "Report exported");
        Ok(path)
    }
}
