//! The retry controller — compile once, then send and filter up to
//! [`MAX_ATTEMPTS`] times.

use crate::assembler::{AssembledPrompt, HistoryAssembler};
use crate::filter::extract_records;
use npcmind_config::ModelsConfig;
use npcmind_core::error::{GatewayError, PipelineError, Result};
use npcmind_core::gateway::{GatewayReply, GatewayRequest, ModelGateway, SamplingConfig};
use npcmind_core::history::HistoryEntry;
use npcmind_core::message::CompiledMessage;
use npcmind_core::response::PipelineResult;
use npcmind_core::sink::{DiagnosticSink, NoopSink};
use npcmind_telemetry::{Outcome, RequestMetrics};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Attempts per invocation before giving up.
pub const MAX_ATTEMPTS: u32 = 3;

/// Default bound on a single transcript write.
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_millis(200);

/// Turns a character's history into validated actions.
///
/// Cheap to share: every collaborator is behind an `Arc`, and a single
/// pipeline serves any number of concurrent invocations.
pub struct Pipeline {
    /// The generative backend
    gateway: Arc<dyn ModelGateway>,

    /// Where attempt transcripts go
    sink: Arc<dyn DiagnosticSink>,

    /// Optional shared timing collector
    metrics: Option<Arc<RequestMetrics>>,

    /// Model allow-list and default
    models: ModelsConfig,

    assembler: HistoryAssembler,

    /// How long one transcript write may hold up an attempt
    sink_timeout: Duration,
}

impl Pipeline {
    /// Create a pipeline with the default assembler and a no-op sink.
    pub fn new(gateway: Arc<dyn ModelGateway>, models: ModelsConfig) -> Self {
        Self {
            gateway,
            sink: Arc::new(NoopSink),
            metrics: None,
            models,
            assembler: HistoryAssembler::default(),
            sink_timeout: DEFAULT_SINK_TIMEOUT,
        }
    }

    /// Send attempt transcripts to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Bound each transcript write; slower writes are abandoned.
    pub fn with_sink_timeout(mut self, timeout: Duration) -> Self {
        self.sink_timeout = timeout;
        self
    }

    /// Report every invocation to a shared collector.
    pub fn with_metrics(mut self, metrics: Arc<RequestMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Use a custom preamble/suffix.
    pub fn with_assembler(mut self, assembler: HistoryAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// The assembler this pipeline compiles with.
    pub fn assembler(&self) -> &HistoryAssembler {
        &self.assembler
    }

    /// Run the pipeline to completion.
    pub async fn run(&self, history: &[HistoryEntry], model: Option<&str>) -> Result<PipelineResult> {
        self.run_with_cancel(history, model, &CancellationToken::new())
            .await
    }

    /// Run the pipeline, aborting the in-flight gateway call when `cancel`
    /// fires.
    pub async fn run_with_cancel(
        &self,
        history: &[HistoryEntry],
        model: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult> {
        let request_id = Uuid::new_v4();
        let model = self.models.resolve(model);
        let span = info_span!("pipeline", %request_id, %model, entries = history.len());

        async move {
            let started = Instant::now();
            let (result, attempts) = self.attempt_loop(history, model, cancel, request_id).await;
            let elapsed = started.elapsed();

            let outcome = if result.is_ok() {
                Outcome::Success
            } else {
                Outcome::Failure
            };
            if let Some(metrics) = &self.metrics {
                metrics.record(elapsed, attempts, outcome);
            }

            match &result {
                Ok(records) => info!(
                    attempts,
                    records = records.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Pipeline succeeded"
                ),
                Err(e) => warn!(
                    attempts,
                    error = %e,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Pipeline failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Returns the result together with how many gateway attempts it took.
    async fn attempt_loop(
        &self,
        history: &[HistoryEntry],
        model: &str,
        cancel: &CancellationToken,
        request_id: Uuid,
    ) -> (Result<PipelineResult>, u32) {
        let prompt = match self.assembler.assemble(history) {
            Ok(prompt) => prompt,
            Err(e) => return (Err(e.into()), 0),
        };
        debug!(
            compiled = prompt.history.len(),
            messages = prompt.messages.len(),
            "History assembled"
        );

        let request = GatewayRequest {
            model: model.to_string(),
            messages: prompt.messages.clone(),
            sampling: SamplingConfig::FIXED,
        };

        let mut last_error: Option<PipelineError> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self
                .attempt(&prompt, &request, cancel, request_id, attempt)
                .await
            {
                Ok(records) => return (Ok(records), attempt),
                Err(e) if e.is_retryable() => {
                    warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    last_error = Some(e);
                }
                Err(e) => return (Err(e), attempt),
            }
        }

        let last_reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".into());
        (
            Err(PipelineError::RetriesExhausted {
                attempts: MAX_ATTEMPTS,
                last_reason,
            }),
            MAX_ATTEMPTS,
        )
    }

    async fn attempt(
        &self,
        prompt: &AssembledPrompt,
        request: &GatewayRequest,
        cancel: &CancellationToken,
        request_id: Uuid,
        attempt: u32,
    ) -> Result<PipelineResult> {
        self.log_transcript(
            &format!("{request_id}/attempt-{attempt}/request"),
            prompt.without_suffix(),
        )
        .await;

        let reply = self.send(request.clone(), cancel).await?;
        if reply.choice_count == 0 {
            return Err(PipelineError::EmptyChoices);
        }

        let mut transcript = prompt.history.clone();
        transcript.push(CompiledMessage::reply(&reply.text));
        self.log_transcript(&format!("{request_id}/attempt-{attempt}/reply"), &transcript)
            .await;

        let records = extract_records(&reply.text)?;
        Ok(PipelineResult::new(records))
    }

    async fn send(
        &self,
        request: GatewayRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<GatewayReply, GatewayError> {
        debug!(gateway = %self.gateway.name(), "Sending request");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            reply = self.gateway.send(request) => reply,
        }
    }

    async fn log_transcript(&self, label: &str, transcript: &[CompiledMessage]) {
        match tokio::time::timeout(self.sink_timeout, self.sink.append(label, transcript)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(label, error = %e, "Diagnostic sink failed"),
            Err(_) => warn!(
                label,
                timeout_ms = self.sink_timeout.as_millis() as u64,
                "Diagnostic sink timed out, transcript dropped"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::PERSONA_PREAMBLE;
    use crate::test_helpers::*;
    use npcmind_core::error::CompilationError;
    use npcmind_core::message::Role;
    use serde_json::json;
    use std::time::Duration;

    fn pipeline(gateway: Arc<ScriptedGateway>) -> Pipeline {
        Pipeline::new(gateway, ModelsConfig::default())
    }

    #[tokio::test]
    async fn single_object_reply_succeeds_first_try() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(GatewayReply::single(
            r#"{"action":"wave"}"#,
        ))]));
        let result = pipeline(gateway.clone())
            .run(&continue_history(), None)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.records()[0]["action"], json!("wave"));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn object_and_array_replies_are_equivalent() {
        let object = Arc::new(ScriptedGateway::new(vec![Ok(GatewayReply::single(
            r#"{"action":"wave"}"#,
        ))]));
        let array = Arc::new(ScriptedGateway::new(vec![Ok(GatewayReply::single(
            r#"[{"action":"wave"}]"#,
        ))]));

        let a = pipeline(object).run(&continue_history(), None).await.unwrap();
        let b = pipeline(array).run(&continue_history(), None).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn empty_choices_twice_then_success() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(GatewayReply::empty()),
            Ok(GatewayReply::empty()),
            Ok(GatewayReply::single(r#"[{"action":"sit"}]"#)),
        ]));
        let result = pipeline(gateway.clone())
            .run(&continue_history(), None)
            .await
            .unwrap();

        assert_eq!(result.records()[0]["action"], json!("sit"));
        assert_eq!(gateway.calls(), 3);
    }

    #[tokio::test]
    async fn empty_choices_every_time_exhausts_retries() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(GatewayReply::empty()),
            Ok(GatewayReply::empty()),
            Ok(GatewayReply::empty()),
        ]));
        let err = pipeline(gateway.clone())
            .run(&continue_history(), None)
            .await
            .unwrap_err();

        match err {
            PipelineError::RetriesExhausted {
                attempts,
                last_reason,
            } => {
                assert_eq!(attempts, MAX_ATTEMPTS);
                assert!(last_reason.contains("no choices"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(gateway.calls(), 3);
    }

    #[tokio::test]
    async fn prose_and_unrecognized_records_are_retried() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(GatewayReply::single("I think I will wave.")),
            Ok(GatewayReply::single(r#"[{"message":"hello"}]"#)),
            Ok(GatewayReply::single(r#"{"type":"say","message":"hi"}"#)),
        ]));
        let result = pipeline(gateway.clone())
            .run(&continue_history(), None)
            .await
            .unwrap();

        assert_eq!(result.records()[0]["action"], json!("say"));
        assert_eq!(gateway.calls(), 3);
    }

    #[tokio::test]
    async fn compilation_failure_never_reaches_gateway() {
        let gateway = Arc::new(ScriptedGateway::new(vec![]));
        let history = vec![system(json!({"query": "context", "location": "Inn"}))];
        let err = pipeline(gateway.clone())
            .run(&history, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Compilation(CompilationError::MissingField(ref f)) if f == "desc"
        ));
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_not_retried() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(GatewayReply::single(r#"[{"action": "wave",}]"#)),
            Ok(GatewayReply::single(r#"{"action":"wave"}"#)),
        ]));
        let err = pipeline(gateway.clone())
            .run(&continue_history(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::MalformedResponse { .. }));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn gateway_error_is_not_retried() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Err(GatewayError::RateLimited {
                retry_after_secs: 5,
            }),
            Ok(GatewayReply::single(r#"{"action":"wave"}"#)),
        ]));
        let err = pipeline(gateway.clone())
            .run(&continue_history(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Gateway(GatewayError::RateLimited { .. })
        ));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn request_carries_full_sequence_and_fixed_sampling() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(GatewayReply::single(
            r#"{"action":"wave"}"#,
        ))]));
        let history = vec![
            system(json!({"query": "context", "desc": "A quiet inn"})),
            npc(json!({"action": "sit"})),
            system(json!({"query": "continue"})),
        ];
        pipeline(gateway.clone())
            .run(&history, Some("gpt-4o"))
            .await
            .unwrap();

        let request = gateway.last_request().unwrap();
        assert_eq!(request.model, "gpt-4o");
        assert_eq!(request.sampling, SamplingConfig::FIXED);
        assert_eq!(request.messages.len(), PERSONA_PREAMBLE.len() + 3 + 1);
        assert_eq!(request.messages[5].role, Role::Reply);
    }

    #[tokio::test]
    async fn unknown_model_falls_back_to_default() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(GatewayReply::single(
            r#"{"action":"wave"}"#,
        ))]));
        pipeline(gateway.clone())
            .run(&continue_history(), Some("not-a-model"))
            .await
            .unwrap();

        assert_eq!(
            gateway.last_request().unwrap().model,
            ModelsConfig::default().default
        );
    }

    #[tokio::test]
    async fn transcripts_logged_before_and_after_each_attempt() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(GatewayReply::empty()),
            Ok(GatewayReply::single(r#"{"action":"wave"}"#)),
        ]));
        let sink = Arc::new(RecordingSink::default());
        pipeline(gateway)
            .with_sink(sink.clone())
            .run(&continue_history(), None)
            .await
            .unwrap();

        let entries = sink.entries();
        let labels: Vec<&str> = entries
            .iter()
            .map(|(label, _)| label.rsplit('/').next().unwrap_or_default())
            .collect();
        // zero-choice attempt produces no reply transcript
        assert_eq!(labels, vec!["request", "request", "reply"]);

        let (_, request) = &entries[0];
        assert_eq!(request.len(), PERSONA_PREAMBLE.len() + 1);

        let (_, reply) = &entries[2];
        assert_eq!(reply.len(), 2);
        assert_eq!(reply[1], CompiledMessage::reply(r#"{"action":"wave"}"#));
    }

    #[tokio::test]
    async fn sink_failure_does_not_fail_pipeline() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(GatewayReply::single(
            r#"{"action":"wave"}"#,
        ))]));
        let result = pipeline(gateway)
            .with_sink(Arc::new(FailingSink))
            .run(&continue_history(), None)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn cancellation_aborts_pending_call() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let pipeline = Pipeline::new(Arc::new(PendingGateway), ModelsConfig::default());
        let err = pipeline
            .run_with_cancel(&continue_history(), None, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Gateway(GatewayError::Cancelled)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn metrics_record_attempts_and_outcome() {
        let metrics = Arc::new(RequestMetrics::new());
        let ok = Arc::new(ScriptedGateway::new(vec![
            Ok(GatewayReply::empty()),
            Ok(GatewayReply::single(r#"{"action":"wave"}"#)),
        ]));
        let failing = Arc::new(ScriptedGateway::new(vec![Err(GatewayError::Network(
            "connection reset".into(),
        ))]));

        pipeline(ok)
            .with_metrics(metrics.clone())
            .run(&continue_history(), None)
            .await
            .unwrap();
        pipeline(failing)
            .with_metrics(metrics.clone())
            .run(&continue_history(), None)
            .await
            .unwrap_err();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.attempts, 3);
    }

    #[tokio::test]
    async fn non_record_elements_are_malformed_and_not_retried() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(GatewayReply::single("[1, 2]")),
            Ok(GatewayReply::single(r#"{"action":"wave"}"#)),
        ]));
        let err = pipeline(gateway.clone())
            .run(&continue_history(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::MalformedResponse { .. }));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn mixed_array_is_rejected_not_partially_accepted() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(GatewayReply::single(
            r#"[{"action":"x"}, 7]"#,
        ))]));
        let err = pipeline(gateway.clone())
            .run(&continue_history(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::MalformedResponse { .. }));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn slow_sink_does_not_hold_up_the_request() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(GatewayReply::single(
            r#"{"action":"wave"}"#,
        ))]));
        let started = Instant::now();
        let result = pipeline(gateway)
            .with_sink(Arc::new(SlowSink {
                delay: Duration::from_secs(5),
            }))
            .with_sink_timeout(Duration::from_millis(50))
            .run(&continue_history(), None)
            .await;

        assert!(result.is_ok());
        // two abandoned writes at 50ms each, far below one 5s write
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn fast_sink_still_receives_transcripts_under_a_timeout() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(GatewayReply::single(
            r#"{"action":"wave"}"#,
        ))]));
        let sink = Arc::new(RecordingSink::default());
        pipeline(gateway)
            .with_sink(sink.clone())
            .with_sink_timeout(Duration::from_millis(50))
            .run(&continue_history(), None)
            .await
            .unwrap();

        assert_eq!(sink.entries().len(), 2);
    }
}
