//! Reading history input from a file or stdin.

use npcmind_core::history::HistoryEntry;
use std::io::Read;
use std::path::Path;

/// Read a JSON array of history entries from `source` (`-` means stdin).
pub fn read(source: &str) -> Result<Vec<HistoryEntry>, Box<dyn std::error::Error>> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(Path::new(source))
            .map_err(|e| format!("Failed to read history from {source}: {e}"))?
    };
    parse(&raw)
}

/// Parse a JSON array of history entries.
pub fn parse(raw: &str) -> Result<Vec<HistoryEntry>, Box<dyn std::error::Error>> {
    let entries: Vec<HistoryEntry> =
        serde_json::from_str(raw).map_err(|e| format!("Invalid history: {e}"))?;
    tracing::debug!(entries = entries.len(), "History loaded");
    Ok(entries)
}
