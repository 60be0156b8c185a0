//! History assembler — builds the exact message sequence sent to the model.
//!
//! The sequence always has the same three layers:
//!
//! 1. **Persona preamble** (four fixed instructions) — never deduplicated
//! 2. **Compiled history** (one message per surviving entry) — deduplicated
//! 3. **Action suffix** (one fixed instruction) — never deduplicated
//!
//! Assembly is deterministic: identical histories always produce identical
//! sequences.

use crate::compiler::compile_entry;
use npcmind_core::error::CompilationError;
use npcmind_core::history::HistoryEntry;
use npcmind_core::message::CompiledMessage;
use tracing::debug;

/// The default persona preamble.
pub const PERSONA_PREAMBLE: [&str; 4] = [
    "You are a character in a video game. The game sends you what is happening around you, \
     and you decide what your character does next.",
    "You only ever answer with JSON. Never write explanations, markdown or any text outside the JSON.",
    "An answer is a JSON object with an \"action\" key naming one of the actions you were given, \
     plus any parameters that action needs.",
    "Stay in character. Never mention that you are an AI, a language model, or part of a game.",
];

/// The default action-request suffix.
pub const ACTION_SUFFIX: &str = "What do you do next? Answer with exactly one concise action, \
     as a single JSON object and nothing else.";

/// A fully assembled prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    /// Compiled, deduplicated history (no preamble, no suffix).
    pub history: Vec<CompiledMessage>,
    /// Preamble + history + suffix, in send order.
    pub messages: Vec<CompiledMessage>,
}

impl AssembledPrompt {
    /// Everything except the trailing suffix.
    pub fn without_suffix(&self) -> &[CompiledMessage] {
        let end = self.messages.len().saturating_sub(1);
        &self.messages[..end]
    }
}

/// Turns a history into an [`AssembledPrompt`].
#[derive(Debug, Clone)]
pub struct HistoryAssembler {
    preamble: [String; 4],
    suffix: String,
}

impl HistoryAssembler {
    /// Create an assembler with the default preamble and suffix.
    pub fn new() -> Self {
        Self {
            preamble: PERSONA_PREAMBLE.map(String::from),
            suffix: ACTION_SUFFIX.to_string(),
        }
    }

    /// Replace the persona preamble.
    pub fn with_preamble(mut self, preamble: [String; 4]) -> Self {
        self.preamble = preamble;
        self
    }

    /// Replace the action suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Compile every entry, drop empty ones, and deduplicate.
    ///
    /// The first compilation failure aborts the whole history.
    pub fn compile_history(
        &self,
        history: &[HistoryEntry],
    ) -> Result<Vec<CompiledMessage>, CompilationError> {
        let mut compiled = Vec::with_capacity(history.len());
        for entry in history {
            if let Some(message) = compile_entry(entry)? {
                if !message.text.is_empty() {
                    compiled.push(message);
                }
            }
        }

        let before = compiled.len();
        let compiled = dedup_by_text(compiled);
        if compiled.len() < before {
            debug!(
                removed = before - compiled.len(),
                kept = compiled.len(),
                "Dropped duplicate history messages"
            );
        }

        Ok(compiled)
    }

    /// Build the complete sequence: preamble, compiled history, suffix.
    pub fn assemble(&self, history: &[HistoryEntry]) -> Result<AssembledPrompt, CompilationError> {
        let compiled = self.compile_history(history)?;

        let mut messages = Vec::with_capacity(self.preamble.len() + compiled.len() + 1);
        messages.extend(self.preamble.iter().map(CompiledMessage::instruction));
        messages.extend(compiled.iter().cloned());
        messages.push(CompiledMessage::instruction(&self.suffix));

        Ok(AssembledPrompt {
            history: compiled,
            messages,
        })
    }
}

impl Default for HistoryAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove later messages whose text equals an earlier one's.
///
/// Quadratic on purpose: histories are a few dozen entries at most.
pub fn dedup_by_text(messages: Vec<CompiledMessage>) -> Vec<CompiledMessage> {
    let mut kept: Vec<CompiledMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        if !kept.iter().any(|k| k.text == message.text) {
            kept.push(message);
        }
    }
    kept
}
