//! Response filter — raw model text to validated records.

use npcmind_core::error::PipelineError;
use npcmind_core::history::{QueryType, Record};
use serde_json::Value;
use tracing::debug;

/// Longest slice of raw text carried in an error message.
const PREVIEW_CHARS: usize = 120;

/// Normalize raw text into something that parses as a JSON array.
///
/// A bracketed array passes through, a single object is wrapped. Anything
/// else is [`PipelineError::UnrecognizedResponseShape`].
pub fn normalize_shape(raw: &str) -> Result<String, PipelineError> {
    let text = raw.trim();
    if text.starts_with('[') && text.ends_with(']') {
        Ok(text.to_string())
    } else if text.starts_with('{') && text.ends_with('}') {
        Ok(format!("[{text}]"))
    } else {
        Err(PipelineError::UnrecognizedResponseShape {
            preview: preview(text),
        })
    }
}

/// Parse normalized text as a list of records.
///
/// Every element must be a JSON object; anything else (a number, a string,
/// a nested array) makes the whole reply [`PipelineError::MalformedResponse`].
pub fn parse_response(normalized: &str) -> Result<Vec<Record>, PipelineError> {
    serde_json::from_str::<Vec<Record>>(normalized).map_err(|e| PipelineError::MalformedResponse {
        reason: e.to_string(),
    })
}

/// Keep only records the game engine understands.
///
/// A record survives when it carries a `system` key naming a query type, an
/// `action` key of any shape, or a `type` key (copied into `action`).
pub fn filter_records(records: Vec<Record>) -> Vec<Record> {
    let total = records.len();
    let kept: Vec<Record> = records.into_iter().filter_map(accept).collect();

    if kept.len() < total {
        debug!(total, kept = kept.len(), "Dropped unrecognized response records");
    }
    kept
}

/// Normalize, parse and filter in one step.
///
/// An empty result is [`PipelineError::NoValidRecords`].
pub fn extract_records(raw: &str) -> Result<Vec<Record>, PipelineError> {
    let normalized = normalize_shape(raw)?;
    let records = filter_records(parse_response(&normalized)?);
    if records.is_empty() {
        return Err(PipelineError::NoValidRecords);
    }
    Ok(records)
}

fn accept(mut record: Record) -> Option<Record> {
    if is_control_record(&record) || record.contains_key("action") {
        return Some(record);
    }
    let alias = record.get("type").cloned()?;
    record.insert("action".to_string(), alias);
    Some(record)
}

fn is_control_record(record: &Record) -> bool {
    match record.get("system") {
        Some(Value::String(tag)) => QueryType::ALL.iter().any(|q| q.as_str() == tag),
        _ => false,
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}
