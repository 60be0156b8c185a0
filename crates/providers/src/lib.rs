//! Model gateway implementations for npcmind.
//!
//! All gateways implement the `npcmind_core::ModelGateway` trait.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatGateway;
