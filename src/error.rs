//! Error types for kg-prompt.
//!
//! Each layer owns an error enum; [`Error`] aggregates them so the
//! pipeline and CLI can propagate any of them with `?`.

use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Chat endpoint invocation failed.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Prompt template could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Knowledge-base query failed.
    #[error(transparent)]
    Kg(#[from] KgError),

    /// Configuration could not be loaded or is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Pipeline orchestration failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// CLI command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure outside any narrower layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while invoking a chat endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The endpoint answered with an explicit non-2xx status.
    #[error("HTTP {status}: {body}")]
    Protocol {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// Every attempt failed at the connection level.
    #[error("network error after {attempts} attempt(s): {message}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last observed connection-level failure.
        message: String,
    },

    /// The request could not be built or sent as specified.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A 2xx response carried a body that is not JSON.
    #[error("failed to decode response: {message}")]
    ResponseDecode {
        /// Decoder message.
        message: String,
        /// Raw body received.
        body: String,
    },

    /// No API key was configured.
    #[error("API key not configured (set llm.api_key, KGP_API_KEY or OPENAI_API_KEY)")]
    ApiKeyMissing,

    /// Unknown provider name.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// Provider name as configured.
        name: String,
    },
}

/// Errors raised while rendering a prompt template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The template references a slot with no supplied value.
    #[error("template references unknown slot '{name}'")]
    UnknownSlot {
        /// Slot name.
        name: String,
    },

    /// A `{}` slot without a name.
    #[error("empty slot at byte {position}")]
    EmptySlot {
        /// Byte offset of the opening brace.
        position: usize,
    },

    /// A lone `{` or `}` that is neither a slot nor an escape.
    #[error("unbalanced brace at byte {position} (use '{{{{' or '}}}}' for literal braces)")]
    Unbalanced {
        /// Byte offset of the brace.
        position: usize,
    },
}

/// Errors raised by knowledge-base query executors.
#[derive(Debug, Error)]
pub enum KgError {
    /// The database endpoint answered with a non-2xx status.
    #[error("knowledge base HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The database rejected the query.
    #[error("query failed ({code}): {message}")]
    Query {
        /// Database error code.
        code: String,
        /// Database error message.
        message: String,
    },

    /// The database could not be reached.
    #[error("knowledge base connection failed: {0}")]
    Connection(String),

    /// Rows could not be decoded.
    #[error("invalid rows: {0}")]
    InvalidRows(String),

    /// Reading a rows file failed.
    #[error("failed to read rows from {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the expected shape.
    #[error("failed to parse config {path}: {message}")]
    Parse {
        /// File path.
        path: String,
        /// Parser message.
        message: String,
    },

    /// A required section is missing.
    #[error("missing config section [{0}]")]
    MissingSection(&'static str),

    /// A value is out of range.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Dotted key.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Errors raised by the pipeline orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The retrieval stage produced an empty query.
    #[error("retrieval stage returned an empty query (raw reply: {raw:?})")]
    EmptyQuery {
        /// Raw model reply.
        raw: String,
    },

    /// Writing an artifact failed.
    #[error("failed to write artifact {path}: {source}")]
    Artifact {
        /// Artifact path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Serializing rows for an artifact failed.
    #[error("failed to serialize {what}: {message}")]
    Serialize {
        /// What was being serialized.
        what: &'static str,
        /// Serializer message.
        message: String,
    },
}

/// Errors raised by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required input is missing.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// An input file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadInput {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An output file could not be written.
    #[error("failed to write {path}: {source}")]
    WriteOutput {
        /// File or directory path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An input file has invalid content.
    #[error("invalid input in {path}: {message}")]
    InvalidInput {
        /// File path.
        path: String,
        /// What is wrong.
        message: String,
    },

    /// Command failed for a reason outside the library layers.
    #[error("{0}")]
    ExecutionFailed(String),
}
