//! ModelGateway trait — the abstraction over generative backends.
//!
//! A gateway knows how to send a compiled message sequence to a language
//! model and hand back the raw generated text. Everything about transport,
//! authentication and rate limiting lives behind this trait.
//!
//! Implementations: OpenAI-compatible endpoints (`npcmind-providers`), and
//! scripted mocks in tests.

use crate::error::GatewayError;
use crate::message::CompiledMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling parameters sent with every request.
///
/// Fixed by the pipeline; callers never supply these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Temperature (high: characters should not be predictable)
    pub temperature: f32,

    /// Nucleus sampling mass
    pub top_p: f32,

    pub frequency_penalty: f32,

    pub presence_penalty: f32,

    /// Output token ceiling; one action is short
    pub max_tokens: u32,
}

impl SamplingConfig {
    /// The parameters every pipeline request uses.
    pub const FIXED: SamplingConfig = SamplingConfig {
        temperature: 1.0,
        top_p: 1.0,
        frequency_penalty: 0.0,
        presence_penalty: 0.0,
        max_tokens: 150,
    };
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self::FIXED
    }
}

/// A request to a model gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// The validated model identifier
    pub model: String,

    /// Preamble, compiled history and suffix, in order
    pub messages: Vec<CompiledMessage>,

    pub sampling: SamplingConfig,
}

/// What a gateway produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayReply {
    /// Text of the first choice (empty when there are no choices)
    pub text: String,

    /// How many choices the backend returned
    pub choice_count: usize,
}

impl GatewayReply {
    /// A reply carrying a single choice.
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choice_count: 1,
        }
    }

    /// A reply with no choices at all.
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            choice_count: 0,
        }
    }
}

/// The core gateway trait.
///
/// The retry controller calls `send()` without knowing which backend sits
/// behind it. An `Err` here is never retried by the pipeline.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// A human-readable name for this gateway (e.g., "openai").
    fn name(&self) -> &str;

    /// Send a message sequence and get the raw reply.
    async fn send(&self, request: GatewayRequest) -> std::result::Result<GatewayReply, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_is_fixed() {
        let sampling = SamplingConfig::default();
        assert!((sampling.temperature - 1.0).abs() < f32::EPSILON);
        assert!((sampling.top_p - 1.0).abs() < f32::EPSILON);
        assert_eq!(sampling.frequency_penalty, 0.0);
        assert_eq!(sampling.presence_penalty, 0.0);
        assert_eq!(sampling.max_tokens, 150);
    }

    #[test]
    fn empty_reply_has_no_choices() {
        let reply = GatewayReply::empty();
        assert_eq!(reply.choice_count, 0);
        assert!(reply.text.is_empty());
    }
}
