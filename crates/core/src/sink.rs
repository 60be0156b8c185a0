//! DiagnosticSink trait — best-effort transcript logging.
//!
//! The retry controller hands each attempt's transcript to a sink before and
//! after calling the gateway. Sinks may fail; the pipeline logs the failure
//! and carries on.

use crate::error::SinkError;
use crate::message::CompiledMessage;
use async_trait::async_trait;
use tracing::debug;

/// Receives transcripts. Errors are logged by the caller, never propagated.
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    async fn append(
        &self,
        label: &str,
        transcript: &[CompiledMessage],
    ) -> std::result::Result<(), SinkError>;
}

/// A sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl DiagnosticSink for NoopSink {
    async fn append(
        &self,
        _label: &str,
        _transcript: &[CompiledMessage],
    ) -> std::result::Result<(), SinkError> {
        Ok(())
    }
}

/// A sink that writes transcripts to the `tracing` pipeline at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl DiagnosticSink for TracingSink {
    async fn append(
        &self,
        label: &str,
        transcript: &[CompiledMessage],
    ) -> std::result::Result<(), SinkError> {
        let body = serde_json::to_string(transcript)?;
        debug!(
            transcript = %label,
            messages = transcript.len(),
            body = %body,
            "Diagnostic transcript"
        );
        Ok(())
    }
}
