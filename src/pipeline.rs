//! End-to-end pipeline: question → query → rows → enhanced prompt.
//!
//! Every intermediate value is persisted as an artifact in the output
//! directory as soon as it exists, so a failed run leaves everything up to
//! the failing step on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::kg::{QueryExecutor, Row, format_evidence};
use crate::llm::LlmProvider;
use crate::stage::{GenerationResult, GenerationStage, RetrievalResult, RetrievalStage};

/// Artifact file names, in the order they are written.
pub mod artifact {
    /// Rendered retrieval prompt.
    pub const RETRIEVAL_PROMPT: &str = "retrieval_prompt.txt";
    /// Raw retrieval reply.
    pub const RETRIEVAL_RESPONSE: &str = "retrieval_response.txt";
    /// Query handed to the executor.
    pub const QUERY: &str = "cypher.txt";
    /// Result rows as pretty JSON.
    pub const RESULTS: &str = "kg_results.json";
    /// Evidence lines.
    pub const EVIDENCE: &str = "kg_triplets.txt";
    /// Rendered generation prompt.
    pub const GENERATION_PROMPT: &str = "generation_prompt.txt";
    /// Final enhanced prompt.
    pub const ENHANCED_PROMPT: &str = "enhanced_prompt.txt";

    /// All artifacts of a complete run.
    pub const ALL: [&str; 7] = [
        RETRIEVAL_PROMPT,
        RETRIEVAL_RESPONSE,
        QUERY,
        RESULTS,
        EVIDENCE,
        GENERATION_PROMPT,
        ENHANCED_PROMPT,
    ];
}

/// Default number of rows rendered as evidence.
pub const DEFAULT_TRIPLETS_MAX_ROWS: usize = 50;

/// Writes artifacts into one directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    /// Creates the writer, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Artifact`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> std::result::Result<Self, PipelineError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| PipelineError::Artifact {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `contents` to `name`, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Artifact`] on I/O failure.
    pub fn write(&self, name: &str, contents: &str) -> std::result::Result<PathBuf, PipelineError> {
        let path = self.dir.join(name);
        std::fs::write(&path, contents).map_err(|source| PipelineError::Artifact {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), bytes = contents.len(), "Wrote artifact");
        Ok(path)
    }

    /// Writes `value` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Serialize`] or [`PipelineError::Artifact`].
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> std::result::Result<PathBuf, PipelineError> {
        let text = serde_json::to_string_pretty(value).map_err(|e| PipelineError::Serialize {
            what: "artifact",
            message: e.to_string(),
        })?;
        self.write(name, &text)
    }
}

/// Text inputs of one run.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    /// The user's question.
    pub user_query: String,
    /// Graph schema description.
    pub schema_text: String,
    /// Formatted value dictionary.
    pub value_dict_text: String,
    /// Example query shown to the model.
    pub cypher_example: String,
    /// Rows rendered into evidence.
    pub triplets_max_rows: usize,
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Retrieval stage result.
    pub retrieval: RetrievalResult,
    /// Rows returned by the executor.
    pub rows: Vec<Row>,
    /// Evidence text given to the generation stage.
    pub evidence: String,
    /// Generation stage result.
    pub generation: GenerationResult,
    /// Directory holding the artifacts.
    pub output_dir: PathBuf,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Runs both stages around a query executor.
pub struct Pipeline {
    provider: Arc<dyn LlmProvider>,
    executor: Box<dyn QueryExecutor>,
    retrieval: RetrievalStage,
    generation: GenerationStage,
    artifacts: ArtifactWriter,
}

impl Pipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        executor: Box<dyn QueryExecutor>,
        retrieval: RetrievalStage,
        generation: GenerationStage,
        artifacts: ArtifactWriter,
    ) -> Self {
        Self {
            provider,
            executor,
            retrieval,
            generation,
            artifacts,
        }
    }

    /// Executes the full pipeline.
    ///
    /// # Steps
    ///
    /// 1. Render and persist the retrieval prompt
    /// 2. Call the retrieval stage; persist the reply and the query
    /// 3. Execute the query; persist the rows
    /// 4. Format and persist evidence
    /// 5. Render and persist the generation prompt
    /// 6. Call the generation stage; persist the enhanced prompt
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyQuery`] if retrieval yields an empty
    /// query; template, provider, executor and artifact errors propagate
    /// unchanged.
    pub fn run(&self, inputs: &PipelineInputs) -> Result<PipelineOutcome> {
        let start = Instant::now();
        let provider = self.provider.as_ref();

        let retrieval_prompt = self.retrieval.build_prompt(
            &inputs.user_query,
            &inputs.schema_text,
            &inputs.value_dict_text,
            &inputs.cypher_example,
        )?;
        self.artifacts
            .write(artifact::RETRIEVAL_PROMPT, &retrieval_prompt)?;

        info!("Step 1/3: generating query");
        let retrieval = self
            .retrieval
            .generate_from_prompt(provider, &retrieval_prompt)?;
        self.artifacts
            .write(artifact::RETRIEVAL_RESPONSE, &retrieval.raw)?;
        self.artifacts.write(artifact::QUERY, &retrieval.query)?;

        if retrieval.query.trim().is_empty() {
            return Err(PipelineError::EmptyQuery {
                raw: retrieval.raw,
            }
            .into());
        }

        info!("Step 2/3: executing query");
        let rows = self.executor.execute(&retrieval.query)?;
        self.artifacts.write_json(artifact::RESULTS, &rows)?;
        info!(rows = rows.len(), "Query returned rows");

        let evidence = format_evidence(&rows, inputs.triplets_max_rows);
        self.artifacts.write(artifact::EVIDENCE, &evidence)?;

        let generation_prompt = self
            .generation
            .build_prompt(&inputs.user_query, &evidence)?;
        self.artifacts
            .write(artifact::GENERATION_PROMPT, &generation_prompt)?;

        info!("Step 3/3: generating enhanced prompt");
        let generation = self
            .generation
            .generate_from_prompt(provider, &generation_prompt)?;
        self.artifacts
            .write(artifact::ENHANCED_PROMPT, &generation.enhanced_prompt)?;

        let elapsed = start.elapsed();
        info!(
            elapsed_ms = elapsed.as_millis(),
            output_dir = %self.artifacts.dir().display(),
            "Pipeline complete"
        );

        Ok(PipelineOutcome {
            retrieval,
            rows,
            evidence,
            generation,
            output_dir: self.artifacts.dir().to_path_buf(),
            elapsed,
        })
    }
}
