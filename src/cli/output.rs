//! Output formatting for CLI results.

use serde::Serialize;

use crate::pipeline::PipelineOutcome;
use crate::prompt::Scaffold;
use crate::stage::RetrievalResult;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything unrecognized is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON with a trailing newline.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        match serde_json::to_string_pretty(value) {
            Ok(mut json) => {
                json.push('\n');
                json
            }
            Err(e) => format!("{{\"error\": \"serialization failed: {e}\"}}\n"),
        }
    }
}

/// Formats a retrieval result.
#[must_use]
pub fn format_retrieval(result: &RetrievalResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => match &result.rationale {
            Some(rationale) => format!("{}\n\n-- {rationale}\n", result.query),
            None => format!("{}\n", result.query),
        },
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "query": result.query,
            "rationale": result.rationale,
            "raw": result.raw,
        })),
    }
}

/// Formats a completed pipeline run.
#[must_use]
pub fn format_outcome(outcome: &PipelineOutcome, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!(
            "{}\n\n---\nQuery: {}\nRows: {} | Time: {:.1}s\nWrote outputs to {}\n",
            outcome.generation.enhanced_prompt.trim_end(),
            outcome.retrieval.query,
            outcome.rows.len(),
            outcome.elapsed.as_secs_f64(),
            outcome.output_dir.display()
        ),
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "query": outcome.retrieval.query,
            "rationale": outcome.retrieval.rationale,
            "rows": outcome.rows.len(),
            "enhanced_prompt": outcome.generation.enhanced_prompt,
            "output_dir": outcome.output_dir.to_string_lossy(),
            "elapsed_ms": u64::try_from(outcome.elapsed.as_millis()).unwrap_or(u64::MAX),
        })),
    }
}

/// Formats the result of scaffolding prompt templates.
#[must_use]
pub fn format_scaffold(scaffold: &Scaffold, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = format!("Prompt directory: {}\n", scaffold.dir.display());
            for (mark, paths) in [("+", &scaffold.written), ("=", &scaffold.existing)] {
                for path in paths {
                    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                    out.push_str(mark);
                    out.push(' ');
                    out.push_str(&name);
                    out.push('\n');
                }
            }
            out
        }
        OutputFormat::Json => format.to_json(scaffold),
    }
}
