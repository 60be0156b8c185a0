//! # npcmind Core
//!
//! Domain types, collaborator traits, and error definitions for the npcmind
//! dialogue pipeline. This crate has **no transport dependencies** — it
//! defines the model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Both external collaborators of the pipeline are traits here:
//! - [`ModelGateway`] — the generative backend
//! - [`DiagnosticSink`] — best-effort transcript logging
//!
//! Implementations live in their respective crates, so tests swap in scripted
//! mocks and a no-op sink without touching the retry logic.

pub mod error;
pub mod gateway;
pub mod history;
pub mod message;
pub mod response;
pub mod sink;

// Re-export key types at crate root for ergonomics
pub use error::{CompilationError, GatewayError, PipelineError, Result, SinkError};
pub use gateway::{GatewayReply, GatewayRequest, ModelGateway, SamplingConfig};
pub use history::{EntryContent, HistoryEntry, Origin, QueryType, Record};
pub use message::{CompiledMessage, Role};
pub use response::PipelineResult;
pub use sink::{DiagnosticSink, NoopSink, TracingSink};
