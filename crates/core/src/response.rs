//! Pipeline output.

use crate::history::Record;
use serde::{Deserialize, Serialize};

/// The validated records a pipeline run produced, in model order.
///
/// Never empty when returned from a successful run. Serializes as a bare
/// JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineResult(Vec<Record>);

impl PipelineResult {
    pub fn new(records: Vec<Record>) -> Self {
        Self(records)
    }

    pub fn records(&self) -> &[Record] {
        &self.0
    }

    pub fn into_records(self) -> Vec<Record> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
