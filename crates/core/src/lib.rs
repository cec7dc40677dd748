//! # crabot core
//!
//! Domain types, traits, and error definitions for the crabot Community Risk
//! Assessment consultant. This crate has **zero framework dependencies**; it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The model backend is defined as a trait here. Implementations live in
//! the `providers` crate. This enables:
//! - Swapping backends via configuration
//! - Easy testing with scripted mock providers
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod export;
pub mod message;
pub mod provider;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, ReportError, Result, SessionError};
pub use export::SessionExport;
pub use message::{Message, Role, Transcript};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use session::{Session, SessionId};
