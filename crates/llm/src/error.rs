use thiserror::Error;

/// Error kinds surfaced by an LLM provider (spec §7: `LLMTimeout`, `LLMError`).
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request timed out")]
    Timeout,

    #[error("llm provider error: {0}")]
    Provider(String),
}
