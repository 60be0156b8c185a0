//! Compiled message types.
//!
//! These are the values that flow from the assembler to the model gateway:
//! history entry → compiler → `CompiledMessage` → gateway.

use serde::{Deserialize, Serialize};

/// The role of a compiled message in the sequence sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions from the controlling system (preamble, history, suffix)
    Instruction,
    /// Something the character previously did
    Reply,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instruction => write!(f, "instruction"),
            Self::Reply => write!(f, "reply"),
        }
    }
}

/// A single role-tagged message. Derived per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledMessage {
    /// Who this message speaks for
    pub role: Role,

    /// The natural-language (or JSON, for replies) text
    pub text: String,
}

impl CompiledMessage {
    /// Create a new instruction message.
    pub fn instruction(text: impl Into<String>) -> Self {
        Self {
            role: Role::Instruction,
            text: text.into(),
        }
    }

    /// Create a new reply message.
    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            role: Role::Reply,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_instruction_message() {
        let msg = CompiledMessage::instruction("You are Ava.");
        assert_eq!(msg.role, Role::Instruction);
        assert_eq!(msg.text, "You are Ava.");
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&CompiledMessage::reply("{}")).unwrap();
        assert!(json.contains(r#""role":"reply""#));
    }
}
