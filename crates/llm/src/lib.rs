pub mod client;
pub mod config;
pub mod openai;
pub mod retry;
pub mod stream;

pub use client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage, ToolCall};
pub use config::{DEFAULT_MODEL, LlmConfig, SemaphoredClient, build_llm_client};
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
pub use stream::{SseDecoder, StreamAccumulator, StreamEvent};
