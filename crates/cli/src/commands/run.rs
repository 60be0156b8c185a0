//! `npcmind run` — run the pipeline against the configured endpoint.

use super::history;
use npcmind_config::AppConfig;
use npcmind_core::sink::{DiagnosticSink, NoopSink, TracingSink};
use npcmind_pipeline::Pipeline;
use npcmind_providers::OpenAiCompatGateway;
use npcmind_telemetry::RequestMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub async fn run(source: &str, model: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let history = history::read(source)?;

    let gateway = OpenAiCompatGateway::from_config(&config)?;
    let metrics = Arc::new(RequestMetrics::new());
    let pipeline = Pipeline::new(Arc::new(gateway), config.models.clone())
        .with_sink(diagnostic_sink(&config))
        .with_sink_timeout(Duration::from_millis(config.diagnostics.sink_timeout_ms))
        .with_metrics(metrics.clone());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            on_interrupt.cancel();
        }
    });

    let result = pipeline.run_with_cancel(&history, model, &cancel).await;

    let snapshot = metrics.snapshot();
    debug!(
        attempts = snapshot.attempts,
        mean_ms = snapshot.lifetime_mean_ms,
        "Request metrics"
    );

    let result = result?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn diagnostic_sink(config: &AppConfig) -> Arc<dyn DiagnosticSink> {
    if config.diagnostics.transcripts {
        Arc::new(TracingSink)
    } else {
        Arc::new(NoopSink)
    }
}
