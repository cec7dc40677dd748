//! The application context wiring knowledge, prompt, pipeline and reports.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crabot_config::AppConfig;
use crabot_core::error::ReportError;
use crabot_core::export::SessionExport;
use crabot_core::provider::Provider;
use crabot_core::session::Session;
use tracing::debug;

use crate::knowledge::{KnowledgeLoader, KnowledgeSource};
use crate::pipeline::{Reply, ReplyStream, TurnPipeline};
use crate::prompt::build_system_instruction;
use crate::report::{Report, ReportSynthesizer, report_ready};

/// Sessions longer than this many turns are worth saving.
pub const EXPORT_MIN_TURNS: usize = 2;

/// Everything a front-end needs to run consultations.
///
/// Built once at startup. The knowledge text is loaded here and the system
/// instruction composed from it, so every turn reuses both.
pub struct Consultant {
    knowledge: KnowledgeLoader,
    system_instruction: String,
    pipeline: TurnPipeline,
    reports: ReportSynthesizer,
    min_report_turns: usize,
    export_dir: PathBuf,
}

impl Consultant {
    /// Build from configuration using the configured provider.
    pub fn from_config(config: &AppConfig) -> Self {
        let provider = crabot_providers::build_from_config(config);
        let knowledge = KnowledgeLoader::new(&config.knowledge.path);
        Self::with_provider(config, provider, knowledge)
    }

    /// Build with an explicit provider and knowledge loader.
    pub fn with_provider(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        knowledge: KnowledgeLoader,
    ) -> Self {
        let model = crabot_providers::model_for(config);
        let report_model = crabot_providers::report_model_for(config);
        let timeout = Duration::from_secs(config.request_timeout_secs);

        let system_instruction = build_system_instruction(knowledge.load());
        debug!(
            chars = system_instruction.chars().count(),
            source = ?knowledge.source(),
            "System instruction composed"
        );

        let pipeline = TurnPipeline::new(provider.clone(), model)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_window(config.history_window)
            .with_timeout(timeout);

        let reports = ReportSynthesizer::new(provider, report_model)
            .with_temperature(config.default_temperature)
            .with_prefix_chars(config.knowledge.report_prefix_chars)
            .with_timeout(timeout);

        Self {
            knowledge,
            system_instruction,
            pipeline,
            reports,
            min_report_turns: config.report.min_turns,
            export_dir: config.export.dir.clone(),
        }
    }

    pub fn knowledge(&self) -> &str {
        self.knowledge.load()
    }

    pub fn knowledge_source(&self) -> &KnowledgeSource {
        self.knowledge.source()
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn model(&self) -> &str {
        self.pipeline.model()
    }

    pub fn has_credential(&self) -> bool {
        self.pipeline.has_credential()
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Record `text` as the user's turn and open the streamed reply.
    pub async fn start_turn<'s>(
        &self,
        session: &'s mut Session,
        text: &str,
    ) -> crabot_core::Result<ReplyStream<'s>> {
        self.pipeline
            .start(session, &self.system_instruction, text)
            .await
    }

    /// Run a whole turn and return the committed reply.
    pub async fn respond(&self, session: &mut Session, text: &str) -> crabot_core::Result<Reply> {
        self.pipeline
            .respond(session, &self.system_instruction, text)
            .await
    }

    pub fn report_ready(&self, session: &Session) -> bool {
        report_ready(session.transcript(), self.min_report_turns)
    }

    pub fn export_ready(&self, session: &Session) -> bool {
        session.transcript().len() > EXPORT_MIN_TURNS
    }

    /// Generate a report for `session`. The session is only read.
    pub async fn generate_report(&self, session: &Session) -> Result<Report, ReportError> {
        let markdown = self
            .reports
            .synthesize(session.transcript(), self.knowledge())
            .await?;
        Ok(Report::new(session.id().clone(), markdown))
    }

    /// Write the session export into the export directory.
    pub fn export_session(&self, session: &Session) -> crabot_core::Result<PathBuf> {
        SessionExport::from_session(session).write_to(&self.export_dir)
    }

    /// Write a report into the export directory.
    pub fn export_report(&self, report: &Report) -> crabot_core::Result<PathBuf> {
        report.write_to(&self.export_dir)
    }
}
