//! Dialogue history types — what a client sends per request.
//!
//! A history is an ordered list of [`HistoryEntry`] values. Each entry's
//! `content` arrives either as a JSON object or as a string holding one; it is
//! normalized into a [`Record`] once, at deserialization time, so nothing
//! downstream has to branch on the encoding again.

use crate::error::CompilationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// A generic key-value record.
pub type Record = serde_json::Map<String, Value>;

/// Who authored a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    /// The controlling game system
    #[serde(rename = "system")]
    System,
    /// The character being driven
    #[serde(rename = "npc")]
    Character,
}

/// The declared purpose of a system-origin entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    Continue,
    Ignore,
    Inspect,
    Perception,
    Context,
    WhoAmI,
    Actions,
}

impl QueryType {
    /// Every query type, in declaration order.
    pub const ALL: [QueryType; 7] = [
        Self::Continue,
        Self::Ignore,
        Self::Inspect,
        Self::Perception,
        Self::Context,
        Self::WhoAmI,
        Self::Actions,
    ];

    /// The wire name of this query type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Ignore => "ignore",
            Self::Inspect => "inspect",
            Self::Perception => "perception",
            Self::Context => "context",
            Self::WhoAmI => "whoami",
            Self::Actions => "actions",
        }
    }
}

impl FromStr for QueryType {
    type Err = CompilationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| CompilationError::UnknownQueryType(s.to_string()))
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry content as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EntryContent {
    /// A JSON object
    Record(Record),
    /// A string that must decode into a JSON object
    Encoded(String),
}

impl EntryContent {
    /// Normalize into a record, rejecting strings that do not hold an object.
    pub fn into_record(self) -> Result<Record, CompilationError> {
        match self {
            Self::Record(record) => Ok(record),
            Self::Encoded(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(record)) => Ok(record),
                Ok(other) => Err(CompilationError::InvalidContent(format!(
                    "encoded content is {}, expected an object",
                    json_kind(&other)
                ))),
                Err(e) => Err(CompilationError::InvalidContent(e.to_string())),
            },
        }
    }
}

/// A history entry exactly as it arrives, before content normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawHistoryEntry {
    pub from: Origin,
    pub content: EntryContent,
}

/// One turn of dialogue history, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHistoryEntry")]
pub struct HistoryEntry {
    /// Who authored the entry
    pub from: Origin,

    /// The decoded content record
    pub content: Record,
}

impl TryFrom<RawHistoryEntry> for HistoryEntry {
    type Error = CompilationError;

    fn try_from(raw: RawHistoryEntry) -> Result<Self, Self::Error> {
        Ok(Self {
            from: raw.from,
            content: raw.content.into_record()?,
        })
    }
}

impl HistoryEntry {
    /// Create a system-origin entry.
    pub fn system(content: Record) -> Self {
        Self {
            from: Origin::System,
            content,
        }
    }

    /// Create a character-origin entry.
    pub fn character(content: Record) -> Self {
        Self {
            from: Origin::Character,
            content,
        }
    }

    /// Read the declared query type of a system entry.
    pub fn query_type(&self) -> Result<QueryType, CompilationError> {
        match self.content.get("query") {
            None => Err(CompilationError::MissingQueryKey),
            Some(Value::String(s)) => s.parse(),
            Some(other) => Err(CompilationError::UnknownQueryType(other.to_string())),
        }
    }
}

/// Short human name for a JSON value's type, for error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a record",
    }
}
