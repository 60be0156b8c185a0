//! Shared test helpers for pipeline tests.

use async_trait::async_trait;
use npcmind_core::error::{GatewayError, SinkError};
use npcmind_core::gateway::{GatewayReply, GatewayRequest, ModelGateway};
use npcmind_core::history::{HistoryEntry, Record};
use npcmind_core::message::CompiledMessage;
use npcmind_core::sink::DiagnosticSink;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A gateway that returns scripted replies in order.
///
/// Panics if more calls are made than replies provided.
pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<GatewayReply, GatewayError>>>,
    requests: Mutex<Vec<GatewayRequest>>,
}

impl ScriptedGateway {
    pub fn new(replies: Vec<Result<GatewayReply, GatewayError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<GatewayRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: GatewayRequest) -> Result<GatewayReply, GatewayError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedGateway: no reply scripted for call #{call}"))
    }
}

/// A gateway whose calls never complete.
pub struct PendingGateway;

#[async_trait]
impl ModelGateway for PendingGateway {
    fn name(&self) -> &str {
        "pending"
    }

    async fn send(&self, _request: GatewayRequest) -> Result<GatewayReply, GatewayError> {
        std::future::pending().await
    }
}

/// A sink that keeps every transcript it receives.
#[derive(Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<(String, Vec<CompiledMessage>)>>,
}

impl RecordingSink {
    pub fn entries(&self) -> Vec<(String, Vec<CompiledMessage>)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiagnosticSink for RecordingSink {
    async fn append(&self, label: &str, transcript: &[CompiledMessage]) -> Result<(), SinkError> {
        self.entries
            .lock()
            .unwrap()
            .push((label.to_string(), transcript.to_vec()));
        Ok(())
    }
}

/// A sink whose writes take `delay` to finish.
pub struct SlowSink {
    pub delay: std::time::Duration,
}

#[async_trait]
impl DiagnosticSink for SlowSink {
    async fn append(&self, _label: &str, _transcript: &[CompiledMessage]) -> Result<(), SinkError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// A sink that always fails.
pub struct FailingSink;

#[async_trait]
impl DiagnosticSink for FailingSink {
    async fn append(&self, _label: &str, _transcript: &[CompiledMessage]) -> Result<(), SinkError> {
        Err(SinkError::Unavailable("disk full".into()))
    }
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn system(content: Value) -> HistoryEntry {
    HistoryEntry::system(record(content))
}

pub fn npc(content: Value) -> HistoryEntry {
    HistoryEntry::character(record(content))
}

pub fn continue_history() -> Vec<HistoryEntry> {
    vec![system(json!({"query": "continue"}))]
}
