//! Resilient chat-completions invocation layer.
//!
//! # Architecture
//!
//! ```text
//! Stage → LlmProvider (ChatClient)
//!   ├── ChatRequest::to_body   (model, messages, temperature, max_tokens?, ...extra)
//!   ├── retry loop             (max_retries + 1 attempts, linear backoff)
//!   │   └── Transport          (one POST, classified AttemptError)
//!   └── extract_text           (choices[0].message.content or "")
//! ```

pub mod client;
pub mod config;
pub mod message;
pub mod provider;
pub mod transport;

// Re-export key types
pub use client::{ChatClient, create_provider, extract_text};
pub use config::EndpointConfig;
pub use message::{ChatMessage, ChatRequest, Role, system_message};
pub use provider::LlmProvider;
pub use transport::{AttemptError, HttpTransport, Sleeper, ThreadSleeper, Transport};
