//! Advisory coaching backends.
//!
//! Provides text-generation providers (Ollama, `OpenAI`-compatible) and the
//! [`Advisor`] seam the decision engine falls back to for ambiguous states.

pub mod advisory;
pub mod ai_provider;
pub mod prompt;
pub mod providers;

pub use advisory::{
    AdvisoryError, AdvisoryRequest, AdvisoryVerdict, Advisor, DisabledAdvisor, LlmAdvisor,
    ReplyParser, TaskContext, Trend, MAX_SUGGESTED_BREAK_MINUTES,
};
pub use ai_provider::{create_provider, AiProviderTrait};
