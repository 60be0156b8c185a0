//! # npcmind Pipeline
//!
//! Turns a character's structured history into a validated list of actions:
//!
//! ```text
//! history ─▶ compiler (per entry) ─▶ assembler (preamble + dedup + suffix)
//!         ─▶ retry loop ─▶ ModelGateway ─▶ filter ─▶ PipelineResult
//! ```
//!
//! Compilation is pure and happens once per invocation; only the
//! send-and-filter step is retried.

pub mod assembler;
pub mod compiler;
pub mod filter;
pub mod retry;

#[cfg(test)]
mod test_helpers;

pub use assembler::{ACTION_SUFFIX, AssembledPrompt, HistoryAssembler, PERSONA_PREAMBLE};
pub use compiler::{compile_entry, compile_query};
pub use filter::{extract_records, filter_records, normalize_shape};
pub use retry::{DEFAULT_SINK_TIMEOUT, MAX_ATTEMPTS, Pipeline};
