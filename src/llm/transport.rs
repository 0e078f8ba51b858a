//! Single-attempt HTTP transport.
//!
//! A [`Transport`] performs exactly one POST and classifies the outcome
//! into an [`AttemptError`]. The retry policy lives in
//! [`ChatClient`](super::client::ChatClient) and only looks at
//! [`AttemptError::is_retryable`].

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;

use crate::error::LlmError;

/// Classified failure of a single request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// Endpoint answered with an explicit non-2xx status. Not retried.
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },
    /// Connection refused, reset, timed out, or the body could not be read.
    Connection {
        /// Underlying error message.
        message: String,
    },
    /// The request itself is malformed (bad URL, unencodable body). Not retried.
    Request {
        /// Underlying error message.
        message: String,
    },
    /// A 2xx body that is not JSON. Not retried.
    Decode {
        /// Decoder message.
        message: String,
        /// Raw body.
        body: String,
    },
}

impl AttemptError {
    /// Returns `true` if another attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl From<AttemptError> for LlmError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::Status { status, body } => Self::Protocol { status, body },
            AttemptError::Connection { message } => Self::RetriesExhausted {
                attempts: 1,
                message,
            },
            AttemptError::Request { message } => Self::InvalidRequest(message),
            AttemptError::Decode { message, body } => Self::ResponseDecode { message, body },
        }
    }
}

/// One authenticated JSON POST.
pub trait Transport: Send + Sync {
    /// Sends `body` to `url` with a bearer credential and decodes the JSON reply.
    ///
    /// # Errors
    ///
    /// Returns a classified [`AttemptError`].
    fn post_json(&self, url: &str, api_key: &str, body: &Value) -> Result<Value, AttemptError>;
}

/// Blocking sleep used between retries.
pub trait Sleeper: Send + Sync {
    /// Blocks the current thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// [`Transport`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport whose every attempt is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::InvalidRequest`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, api_key: &str, body: &Value) -> Result<Value, AttemptError> {
        // The response is owned by this scope and released on every return path.
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let text = response.text().map_err(|e| AttemptError::Connection {
            message: format!("failed to read response body: {e}"),
        })?;

        serde_json::from_str(&text).map_err(|e| AttemptError::Decode {
            message: e.to_string(),
            body: text,
        })
    }
}

/// Splits `reqwest` send failures into malformed-request and connection-level.
fn classify(err: reqwest::Error) -> AttemptError {
    if err.is_builder() {
        AttemptError::Request {
            message: err.to_string(),
        }
    } else {
        AttemptError::Connection {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connection_errors_retry() {
        assert!(
            AttemptError::Connection {
                message: "reset".to_string()
            }
            .is_retryable()
        );
        assert!(
            !AttemptError::Status {
                status: 500,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(
            !AttemptError::Request {
                message: "bad url".to_string()
            }
            .is_retryable()
        );
        assert!(
            !AttemptError::Decode {
                message: "eof".to_string(),
                body: "<html>".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_status_maps_to_protocol_error() {
        let err: LlmError = AttemptError::Status {
            status: 401,
            body: "bad key".to_string(),
        }
        .into();
        assert!(matches!(err, LlmError::Protocol { status: 401, ref body } if body == "bad key"));
    }

    #[test]
    fn test_invalid_url_is_request_error() {
        let transport =
            HttpTransport::new(Duration::from_secs(1)).unwrap_or_else(|_| unreachable!());
        let result = transport.post_json("not a url", "k", &Value::Null);
        assert!(matches!(result, Err(AttemptError::Request { .. })));
    }
}
