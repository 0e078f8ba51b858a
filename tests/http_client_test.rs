//! Chat client against a local HTTP endpoint.

use std::io::Read;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use kg_prompt::error::LlmError;
use kg_prompt::llm::{
    ChatClient, ChatRequest, EndpointConfig, HttpTransport, LlmProvider, Sleeper, extract_text,
    system_message,
};
use mockito::Matcher;
use serde_json::json;

/// Records sleeps instead of blocking.
#[derive(Clone, Default)]
struct RecordingSleeper(Arc<Mutex<Vec<Duration>>>);

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.0.lock() {
            sleeps.push(duration);
        }
    }
}

impl RecordingSleeper {
    fn recorded(&self) -> Vec<Duration> {
        self.0.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

fn config(base_url: &str, max_retries: u32) -> EndpointConfig {
    EndpointConfig::builder()
        .base_url(base_url)
        .api_key("test-key")
        .max_retries(max_retries)
        .backoff_base(2.0)
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| unreachable!())
}

fn client(config: EndpointConfig, sleeper: RecordingSleeper) -> ChatClient {
    let transport = HttpTransport::new(config.timeout).unwrap_or_else(|_| unreachable!());
    ChatClient::with_parts(config, Box::new(transport), Box::new(sleeper))
}

fn request() -> ChatRequest {
    ChatRequest {
        model: "gpt-4o-mini".to_string(),
        messages: vec![system_message("Translate: which cells are LFP?")],
        temperature: 0.0,
        max_tokens: None,
        extra: None,
    }
}

#[test]
fn test_successful_call_sends_expected_request() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_header("content-type", Matcher::Regex("^application/json".into()))
        .match_body(Matcher::Json(json!({
            "model": "gpt-4o-mini",
            "messages": [{"role": "system", "content": "Translate: which cells are LFP?"}],
            "temperature": 0.0
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"MATCH (c:Cell) RETURN c"}}]}"#)
        .expect(1)
        .create();

    let sleeper = RecordingSleeper::default();
    let client = client(config(&server.url(), 3), sleeper.clone());
    let response = client.chat(&request()).unwrap_or_else(|_| unreachable!());

    mock.assert();
    assert_eq!(extract_text(&response), "MATCH (c:Cell) RETURN c");
    assert!(sleeper.recorded().is_empty());
}

#[test]
fn test_non_2xx_is_not_retried() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .with_body("upstream overloaded")
        .expect(1)
        .create();

    let sleeper = RecordingSleeper::default();
    let err = client(config(&server.url(), 3), sleeper.clone())
        .chat(&request())
        .err();

    mock.assert();
    assert!(matches!(
        err,
        Some(LlmError::Protocol { status: 503, ref body }) if body == "upstream overloaded"
    ));
    assert!(sleeper.recorded().is_empty());
}

#[test]
fn test_undecodable_body_is_not_retried() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body("<html>gateway</html>")
        .expect(1)
        .create();

    let err = client(config(&server.url(), 3), RecordingSleeper::default())
        .chat(&request())
        .err();

    mock.assert();
    assert!(matches!(err, Some(LlmError::ResponseDecode { ref body, .. }) if body.contains("gateway")));
}

#[test]
fn test_connection_refused_is_retried_then_exhausted() {
    // Nothing listens on port 1.
    let sleeper = RecordingSleeper::default();
    let err = client(config("http://127.0.0.1:1", 2), sleeper.clone())
        .chat(&request())
        .err();

    assert!(matches!(err, Some(LlmError::RetriesExhausted { attempts: 3, .. })));
    assert_eq!(
        sleeper.recorded(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
}

#[test]
fn test_timeout_is_retried_then_exhausted() {
    // Accepts connections and reads the request but never answers.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap_or_else(|_| unreachable!());
    let addr = listener.local_addr().unwrap_or_else(|_| unreachable!());
    thread::spawn(move || {
        let mut held = Vec::new();
        for mut stream in listener.incoming().flatten() {
            let mut buf = [0_u8; 4096];
            let _ = stream.read(&mut buf);
            held.push(stream);
        }
    });

    let config = EndpointConfig::builder()
        .base_url(format!("http://{addr}"))
        .api_key("test-key")
        .max_retries(1)
        .backoff_base(2.0)
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap_or_else(|_| unreachable!());
    let sleeper = RecordingSleeper::default();
    let err = client(config, sleeper.clone()).chat(&request()).err();

    assert!(matches!(err, Some(LlmError::RetriesExhausted { attempts: 2, .. })));
    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(2)]);
}

#[test]
fn test_missing_choices_extracts_empty_text() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"x","choices":[]}"#)
        .create();

    let response = client(config(&server.url(), 0), RecordingSleeper::default())
        .chat(&request())
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(extract_text(&response), "");
}
