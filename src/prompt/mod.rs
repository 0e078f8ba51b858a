//! Prompt templates for the retrieval and generation stages.
//!
//! Templates are loaded from external files when available, falling back
//! to compiled-in defaults. Slot names are fixed per stage: see
//! [`RETRIEVAL_SLOTS`] and [`GENERATION_SLOTS`].

pub mod template;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

pub use template::Template;

/// Slots available to the retrieval template.
pub const RETRIEVAL_SLOTS: [&str; 4] = ["user_query", "kg_schema", "kg_value_dict", "cypher_example"];

/// Slots available to the generation template.
pub const GENERATION_SLOTS: [&str; 2] = ["user_query", "kg_triplets"];

/// Default retrieval (question → Cypher) template.
pub const RETRIEVAL_TEMPLATE: &str = r#"You are a Neo4j Cypher expert working on a battery knowledge graph. Translate the user's question into a single read-only Cypher query.

## Graph Schema

{kg_schema}

## Value Dictionary

{kg_value_dict}

## Example Query

```cypher
{cypher_example}
```

## Rules

- Use only labels, relationship types and properties that appear in the schema.
- Use literal values consistent with the value dictionary (types, example values, ranges).
- Never write to the graph: no CREATE, MERGE, SET, DELETE, REMOVE or CALL of write procedures.
- Return named columns (`RETURN c.id AS cell_id`), not whole nodes, and always add a LIMIT.

## Output Format (JSON)

Return ONLY a JSON object, no surrounding text:
```json
{{"cypher": "<the query>", "rationale": "<one sentence on how the query answers the question>"}}
```

## Question

{user_query}"#;

/// Default generation (evidence → enhanced prompt) template.
pub const GENERATION_TEMPLATE: &str = r"You are a prompt engineer. Rewrite the user's question into an enhanced prompt for a downstream assistant, grounded in the knowledge-graph evidence below.

## Evidence

Each line is one result row as `key=value` pairs separated by `; `.

{kg_triplets}

## Instructions

1. Restate the user's goal precisely.
2. Include every evidence value the assistant needs, with units, quoted verbatim.
3. If the evidence is empty or does not cover the question, say so explicitly in the prompt instead of inventing values.
4. Do not answer the question yourself.

Return only the enhanced prompt text.

## Question

{user_query}";

/// Default prompt directory under the user's home.
const DEFAULT_PROMPT_DIR: &str = ".config/kg-prompt/prompts";

/// Filename for the retrieval template.
const RETRIEVAL_FILENAME: &str = "retrieval.txt";
/// Filename for the generation template.
const GENERATION_FILENAME: &str = "generation.txt";

/// On-disk file and compiled-in source of each stage template.
const TEMPLATE_FILES: [(&str, &str); 2] = [
    (RETRIEVAL_FILENAME, RETRIEVAL_TEMPLATE),
    (GENERATION_FILENAME, GENERATION_TEMPLATE),
];

/// Template sources for both stages.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// Retrieval template source.
    pub retrieval: String,
    /// Generation template source.
    pub generation: String,
}

/// Files touched by [`PromptSet::write_defaults`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct Scaffold {
    /// Target directory.
    pub dir: PathBuf,
    /// Templates created by this call.
    pub written: Vec<PathBuf>,
    /// Templates left untouched because they already existed.
    pub existing: Vec<PathBuf>,
}

impl PromptSet {
    /// Loads both templates, file by file, falling back to the compiled-in source.
    ///
    /// The directory is `prompt_dir` if given, else `KGP_PROMPT_DIR`, else
    /// [`PromptSet::default_dir`].
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let dir = prompt_dir
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("KGP_PROMPT_DIR").map(PathBuf::from))
            .or_else(Self::default_dir);
        let [retrieval, generation] =
            TEMPLATE_FILES.map(|(file, fallback)| read_template(dir.as_deref(), file, fallback));
        Self {
            retrieval,
            generation,
        }
    }

    /// Writes every missing template into `dir`, creating it first.
    ///
    /// Existing files are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error from creating the directory or a file.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Scaffold> {
        std::fs::create_dir_all(dir)?;
        let mut scaffold = Scaffold {
            dir: dir.to_path_buf(),
            ..Scaffold::default()
        };
        for (file, source) in TEMPLATE_FILES {
            let path = dir.join(file);
            if path.exists() {
                scaffold.existing.push(path);
            } else {
                std::fs::write(&path, source)?;
                scaffold.written.push(path);
            }
        }
        Ok(scaffold)
    }

    /// `~/.config/kg-prompt/prompts`, if a home directory is known.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_PROMPT_DIR))
    }
}

fn read_template(dir: Option<&Path>, file: &str, fallback: &str) -> String {
    let Some(path) = dir.map(|d| d.join(file)) else {
        return fallback.to_string();
    };
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            debug!(path = %path.display(), "Loaded prompt template");
            text
        }
        Err(_) => fallback.to_string(),
    }
}
