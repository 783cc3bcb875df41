//! LlmProvider trait definition.
//!
//! The session actor treats text generation as a blocking capability: one
//! completion request in, one response out. Uses RPITIT (native async fn
//! in traits, Rust 2024 edition). Implementations live in parlor-infra.

use parlor_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for LLM provider backends.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
