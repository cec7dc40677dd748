//! The consultation core of crabot.
//!
//! A consultation runs a simple cycle:
//!
//! 1. **Load** the reference knowledge once at startup
//! 2. **Compose** the system instruction from it
//! 3. **Respond** to each user message through the [`TurnPipeline`],
//!    streaming the reply and committing it to the session
//! 4. **Synthesize** a CRA report from the transcript on request
//!
//! [`Consultant`] owns all of the above and is what front-ends talk to.

pub mod consultant;
pub mod knowledge;
pub mod pipeline;
pub mod prompt;
pub mod report;

#[cfg(test)]
mod test_support;

pub use consultant::Consultant;
pub use knowledge::{KnowledgeLoader, KnowledgeSource};
pub use pipeline::{Reply, ReplyStream, TurnPipeline};
pub use prompt::build_system_instruction;
pub use report::{REPORT_SECTIONS, Report, ReportSynthesizer, report_ready};
