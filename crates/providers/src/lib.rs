//! Chat-completion provider implementations for crabot.
//!
//! All providers implement the `crabot_core::Provider` trait.
//! `router::build_from_config` picks the configured backend.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, model_for, report_model_for};
