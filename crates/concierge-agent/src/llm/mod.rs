//! LLM integration layer.
//!
//! - [`types`] -- Chat messages and requests.
//! - [`client`] -- HTTP client for Anthropic and OpenAI-compatible APIs.
//! - [`json`] -- Tolerant JSON-object extraction from model output.

pub mod client;
pub mod json;
pub mod types;

pub use client::{LlmClient, LlmClientConfig, LlmProvider, OLLAMA_BASE_URL};
pub use json::extract_object;
pub use types::{ChatRequest, Message, Role};
