//! `npcmind compile` — print the assembled prompt without calling a backend.

use super::history;
use npcmind_core::history::HistoryEntry;
use npcmind_pipeline::HistoryAssembler;

pub fn run(source: &str) -> Result<(), Box<dyn std::error::Error>> {
    let history = history::read(source)?;
    println!("{}", render(&history)?);
    Ok(())
}

/// The full message sequence as pretty JSON.
fn render(history: &[HistoryEntry]) -> Result<String, Box<dyn std::error::Error>> {
    let prompt = HistoryAssembler::default().assemble(history)?;
    Ok(serde_json::to_string_pretty(&prompt.messages)?)
}
