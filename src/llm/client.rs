//! Chat-completions client with bounded retry.
//!
//! [`ChatClient`] turns a [`ChatRequest`] into `POST {base}/chat/completions`
//! and retries connection-level failures with a linear backoff. Explicit
//! HTTP error statuses are surfaced on the first occurrence.

use serde_json::Value;
use tracing::{debug, warn};

use super::config::EndpointConfig;
use super::message::ChatRequest;
use super::provider::LlmProvider;
use super::transport::{AttemptError, HttpTransport, Sleeper, ThreadSleeper, Transport};
use crate::error::LlmError;

/// Provider names served by [`ChatClient`].
const OPENAI_PROVIDERS: [&str; 2] = ["openai", "openai-compatible"];

/// Client for one `OpenAI`-compatible chat endpoint.
pub struct ChatClient {
    config: EndpointConfig,
    transport: Box<dyn Transport>,
    sleeper: Box<dyn Sleeper>,
}

impl ChatClient {
    /// Creates a client with the blocking HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidRequest`] if the HTTP client cannot be built.
    pub fn new(config: EndpointConfig) -> Result<Self, LlmError> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::with_parts(
            config,
            Box::new(transport),
            Box::new(ThreadSleeper),
        ))
    }

    /// Creates a client from explicit transport and sleeper implementations.
    #[must_use]
    pub fn with_parts(
        config: EndpointConfig,
        transport: Box<dyn Transport>,
        sleeper: Box<dyn Sleeper>,
    ) -> Self {
        Self {
            config,
            transport,
            sleeper,
        }
    }

    /// Endpoint configuration.
    #[must_use]
    pub const fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Posts `body`, retrying connection-level failures.
    ///
    /// Makes at most `max_retries + 1` attempts. Retry `k` (1-based) is
    /// preceded by a sleep of `backoff_base * k` seconds.
    fn post_with_retry(&self, url: &str, body: &Value) -> Result<Value, LlmError> {
        let max_retries = self.config.max_retries;
        let mut last_error = String::new();

        for attempt in 0..=max_retries {
            debug!(attempt = attempt + 1, url, "Sending chat request");

            match self.transport.post_json(url, &self.config.api_key, body) {
                Ok(document) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "Chat request succeeded after retry");
                    }
                    return Ok(document);
                }
                Err(err) if err.is_retryable() => {
                    warn!(attempt = attempt + 1, error = ?err, "Chat request failed");
                    if let AttemptError::Connection { message } = err {
                        last_error = message;
                    }
                }
                Err(err) => {
                    warn!(attempt = attempt + 1, error = ?err, "Chat request failed, not retrying");
                    return Err(err.into());
                }
            }

            if attempt < max_retries {
                let delay = self.config.backoff_for(attempt + 1);
                debug!(delay_secs = delay.as_secs_f64(), "Backing off before retry");
                self.sleeper.sleep(delay);
            }
        }

        warn!(attempts = max_retries + 1, "All retry attempts exhausted");
        Err(LlmError::RetriesExhausted {
            attempts: max_retries + 1,
            message: last_error,
        })
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("config", &self.config)
            .field("transport", &"<dyn Transport>")
            .finish_non_exhaustive()
    }
}

impl LlmProvider for ChatClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn chat(&self, request: &ChatRequest) -> Result<Value, LlmError> {
        let body = request.to_body()?;
        self.post_with_retry(&self.config.chat_completions_url(), &body)
    }
}

/// Pulls the assistant text out of a chat-completions response.
///
/// Reads `choices[0].message.content`. Any missing step, or a non-string
/// content, yields an empty string.
#[must_use]
pub fn extract_text(response: &Value) -> String {
    response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Supported Providers
///
/// - `"openai"` / `"openai-compatible"`: any chat-completions endpoint
///
/// # Errors
///
/// Returns [`LlmError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(
    provider: &str,
    config: EndpointConfig,
) -> Result<Box<dyn LlmProvider>, LlmError> {
    if OPENAI_PROVIDERS.contains(&provider) {
        Ok(Box::new(ChatClient::new(config)?))
    } else {
        Err(LlmError::UnsupportedProvider {
            name: provider.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::llm::message::system_message;

    /// Transport that replays a fixed script of outcomes and records calls.
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        script: Arc<Mutex<VecDeque<Result<Value, AttemptError>>>>,
        calls: Arc<Mutex<Vec<(String, String, Value)>>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<Value, AttemptError>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into())),
                calls: Arc::default(),
            }
        }

        fn attempts(&self) -> usize {
            self.calls.lock().map_or(0, |c| c.len())
        }
    }

    impl Transport for ScriptedTransport {
        fn post_json(
            &self,
            url: &str,
            api_key: &str,
            body: &Value,
        ) -> Result<Value, AttemptError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push((url.to_string(), api_key.to_string(), body.clone()));
            }
            self.script
                .lock()
                .ok()
                .and_then(|mut s| s.pop_front())
                .unwrap_or_else(|| {
                    Err(AttemptError::Connection {
                        message: "script exhausted".to_string(),
                    })
                })
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSleeper {
        sleeps: Arc<Mutex<Vec<Duration>>>,
    }

    impl RecordingSleeper {
        fn recorded(&self) -> Vec<Duration> {
            self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            if let Ok(mut sleeps) = self.sleeps.lock() {
                sleeps.push(duration);
            }
        }
    }

    fn connection_error(message: &str) -> Result<Value, AttemptError> {
        Err(AttemptError::Connection {
            message: message.to_string(),
        })
    }

    fn completion(content: &str) -> Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    fn client(
        max_retries: u32,
        script: Vec<Result<Value, AttemptError>>,
    ) -> (ChatClient, ScriptedTransport, RecordingSleeper) {
        let config = EndpointConfig::builder()
            .api_key("test-key")
            .base_url("http://llm.local/v1/")
            .max_retries(max_retries)
            .backoff_base(2.0)
            .build()
            .unwrap_or_else(|_| unreachable!());
        let transport = ScriptedTransport::new(script);
        let sleeper = RecordingSleeper::default();
        let client = ChatClient::with_parts(
            config,
            Box::new(transport.clone()),
            Box::new(sleeper.clone()),
        );
        (client, transport, sleeper)
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "test-model".to_string(),
            messages: vec![system_message("prompt")],
            temperature: 0.0,
            max_tokens: None,
            extra: None,
        }
    }

    #[test]
    fn test_success_first_attempt() {
        let (client, transport, sleeper) = client(3, vec![Ok(completion("MATCH (n) RETURN n"))]);
        let response = client.chat(&request()).unwrap_or_else(|_| unreachable!());
        assert_eq!(extract_text(&response), "MATCH (n) RETURN n");
        assert_eq!(transport.attempts(), 1);
        assert!(sleeper.recorded().is_empty());
    }

    #[test]
    fn test_request_shape() {
        let (client, transport, _) = client(0, vec![Ok(completion("x"))]);
        client.chat(&request()).unwrap_or_else(|_| unreachable!());

        let calls = transport.calls.lock().map(|c| c.clone()).unwrap_or_default();
        let (url, key, body) = &calls[0];
        assert_eq!(url, "http://llm.local/v1/chat/completions");
        assert_eq!(key, "test-key");
        assert_eq!(body["model"], json!("test-model"));
        assert_eq!(body["messages"][0]["role"], json!("system"));
    }

    #[test]
    fn test_two_connection_errors_then_success() {
        let (client, transport, sleeper) = client(
            3,
            vec![
                connection_error("refused"),
                connection_error("reset"),
                Ok(completion("ok")),
            ],
        );
        let response = client.chat(&request()).unwrap_or_else(|_| unreachable!());
        assert_eq!(extract_text(&response), "ok");
        assert_eq!(transport.attempts(), 3);
        assert_eq!(
            sleeper.recorded(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[test]
    fn test_exhausted_backoff_schedule() {
        let (client, transport, sleeper) = client(3, vec![]);
        let err = client.chat(&request()).err();
        assert_eq!(transport.attempts(), 4);
        assert_eq!(
            sleeper.recorded(),
            vec![
                Duration::from_secs_f64(2.0),
                Duration::from_secs_f64(4.0),
                Duration::from_secs_f64(6.0),
            ]
        );
        assert!(matches!(
            err,
            Some(LlmError::RetriesExhausted { attempts: 4, ref message }) if message == "script exhausted"
        ));
    }

    #[test]
    fn test_last_connection_error_is_surfaced() {
        let (client, _, _) = client(
            1,
            vec![connection_error("first"), connection_error("second")],
        );
        let err = client.chat(&request()).err();
        assert!(matches!(
            err,
            Some(LlmError::RetriesExhausted { attempts: 2, ref message }) if message == "second"
        ));
    }

    #[test]
    fn test_protocol_error_not_retried() {
        let (client, transport, sleeper) = client(
            3,
            vec![Err(AttemptError::Status {
                status: 503,
                body: "overloaded".to_string(),
            })],
        );
        let err = client.chat(&request()).err();
        assert_eq!(transport.attempts(), 1);
        assert!(sleeper.recorded().is_empty());
        assert!(matches!(
            err,
            Some(LlmError::Protocol { status: 503, ref body }) if body == "overloaded"
        ));
    }

    #[test]
    fn test_protocol_error_after_connection_error() {
        let (client, transport, sleeper) = client(
            3,
            vec![
                connection_error("refused"),
                Err(AttemptError::Status {
                    status: 400,
                    body: "bad".to_string(),
                }),
            ],
        );
        let err = client.chat(&request()).err();
        assert_eq!(transport.attempts(), 2);
        assert_eq!(sleeper.recorded().len(), 1);
        assert!(matches!(err, Some(LlmError::Protocol { status: 400, .. })));
    }

    #[test]
    fn test_decode_error_not_retried() {
        let (client, transport, _) = client(
            3,
            vec![Err(AttemptError::Decode {
                message: "expected value".to_string(),
                body: "<html>".to_string(),
            })],
        );
        let err = client.chat(&request()).err();
        assert_eq!(transport.attempts(), 1);
        assert!(matches!(err, Some(LlmError::ResponseDecode { .. })));
    }

    #[test]
    fn test_invalid_request_never_sent() {
        let (client, transport, _) = client(3, vec![Ok(completion("x"))]);
        let mut req = request();
        req.temperature = f64::INFINITY;
        let err = client.chat(&req).err();
        assert_eq!(transport.attempts(), 0);
        assert!(matches!(err, Some(LlmError::InvalidRequest(_))));
    }

    #[test]
    fn test_zero_retries_single_attempt() {
        let (client, transport, sleeper) = client(0, vec![]);
        let err = client.chat(&request()).err();
        assert_eq!(transport.attempts(), 1);
        assert!(sleeper.recorded().is_empty());
        assert!(matches!(err, Some(LlmError::RetriesExhausted { attempts: 1, .. })));
    }

    #[test]
    fn test_extract_text() {
        let response = json!({"choices": [{"message": {"content": "X"}}]});
        assert_eq!(extract_text(&response), "X");
    }

    #[test]
    fn test_extract_text_missing_fields() {
        assert_eq!(extract_text(&json!({})), "");
        assert_eq!(extract_text(&json!({"choices": []})), "");
        assert_eq!(extract_text(&json!({"choices": [{}]})), "");
        assert_eq!(extract_text(&json!({"choices": [{"message": {}}]})), "");
        assert_eq!(
            extract_text(&json!({"choices": [{"message": {"content": null}}]})),
            ""
        );
        assert_eq!(extract_text(&json!("not an object")), "");
    }

    #[test]
    fn test_create_openai_provider() {
        let config = EndpointConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let provider = create_provider("openai", config);
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap_or_else(|_| unreachable!()).name(), "openai");
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = EndpointConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let result = create_provider("anthropic", config);
        assert!(matches!(
            result,
            Err(LlmError::UnsupportedProvider { ref name }) if name == "anthropic"
        ));
    }
}
