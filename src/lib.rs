//! # kg-prompt
//!
//! Knowledge-graph grounded prompt enhancement.
//!
//! A question goes through two language-model stages around a knowledge
//! graph:
//!
//! ```text
//! question ─▶ RetrievalStage ─▶ Cypher ─▶ QueryExecutor ─▶ rows
//!                                                            │
//!          enhanced prompt ◀─ GenerationStage ◀─ evidence ◀──┘
//! ```
//!
//! Both stages talk to an OpenAI-compatible chat-completions endpoint
//! through [`llm::ChatClient`], which retries connection-level failures
//! with linear backoff and fails fast on everything else.
//!
//! ## Example
//!
//! ```no_run
//! use kg_prompt::llm::{EndpointConfig, create_provider};
//! use kg_prompt::prompt::RETRIEVAL_TEMPLATE;
//! use kg_prompt::stage::{RetrievalStage, StageSettings};
//!
//! let provider = create_provider("openai", EndpointConfig::from_env()?)?;
//! let stage = RetrievalStage::new(StageSettings::new("gpt-4o-mini"), RETRIEVAL_TEMPLATE)?;
//! let result = stage.generate_query(
//!     provider.as_ref(),
//!     "Which LFP cells lost more than 10% capacity?",
//!     "(:Cell {id, chemistry})-[:HAS_STATE]->(:State {soh})",
//!     "",
//!     "MATCH (c:Cell) RETURN c.id LIMIT 5",
//! )?;
//! println!("{}", result.query);
//! # Ok::<(), kg_prompt::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod kg;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod stage;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineInputs, PipelineOutcome};
