//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::cli::output::{OutputFormat, format_outcome, format_retrieval, format_scaffold};
use crate::cli::parser::{Cli, Commands, ContextArgs, QueryArgs};
use crate::config::AppConfig;
use crate::error::{CommandError, Result};
use crate::kg::{
    Neo4jHttpExecutor, QueryExecutor, RowsFileExecutor, format_value_dict, load_value_dict,
};
use crate::llm::{LlmProvider, create_provider};
use crate::pipeline::{ArtifactWriter, Pipeline, PipelineInputs};
use crate::prompt::PromptSet;
use crate::stage::{GenerationStage, RetrievalStage};

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Run {
            query,
            context,
            triplets_max_rows,
            output_dir,
            rows_file,
            prompt_dir,
        } => {
            let params = RunParams {
                query,
                context,
                triplets_max_rows: *triplets_max_rows,
                output_dir: output_dir.as_deref(),
                rows_file: rows_file.as_deref(),
                prompt_dir: prompt_dir.as_deref(),
            };
            cmd_run(cli, &params, format)
        }
        Commands::Retrieve {
            query,
            context,
            prompt_dir,
        } => cmd_retrieve(cli, query, context, prompt_dir.as_deref(), format),
        Commands::Generate {
            query,
            evidence_file,
            prompt_dir,
        } => cmd_generate(cli, query, evidence_file, prompt_dir.as_deref(), format),
        Commands::Render {
            query,
            context,
            prompt_dir,
        } => cmd_render(cli, query, context, prompt_dir.as_deref(), format),
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
    }
}

// ==================== Parameter Structs ====================

/// Parameters for the run command.
#[derive(Debug, Clone)]
struct RunParams<'a> {
    query: &'a QueryArgs,
    context: &'a ContextArgs,
    triplets_max_rows: usize,
    output_dir: Option<&'a Path>,
    rows_file: Option<&'a Path>,
    prompt_dir: Option<&'a Path>,
}

/// Retrieval context texts read from disk.
struct ContextTexts {
    schema: String,
    value_dict: String,
    cypher_example: String,
}

// ==================== Helpers ====================

fn read_input(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|source| CommandError::ReadInput {
        path: path.display().to_string(),
        source,
    })?;
    Ok(text.trim().to_string())
}

/// Resolves the question; a file wins over the inline value.
fn resolve_user_query(args: &QueryArgs) -> Result<String> {
    let query = match (&args.user_query_file, &args.user_query) {
        (Some(path), _) => read_input(path)?,
        (None, Some(text)) => text.trim().to_string(),
        (None, None) => {
            return Err(CommandError::MissingInput(
                "provide --user-query or --user-query-file".to_string(),
            )
            .into());
        }
    };
    if query.is_empty() {
        return Err(CommandError::MissingInput("user query is empty".to_string()).into());
    }
    Ok(query)
}

fn load_context(args: &ContextArgs) -> Result<ContextTexts> {
    let schema = read_input(&args.schema_file)?;
    let cypher_example = read_input(&args.cypher_example_file)?;
    let dict = load_value_dict(&args.value_dict)?;
    debug!(keys = dict.len(), "Loaded value dictionary");
    Ok(ContextTexts {
        schema,
        value_dict: format_value_dict(&dict, args.value_dict_max_keys),
        cypher_example,
    })
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    Ok(AppConfig::load(cli.config.as_deref())?)
}

fn load_prompts(config: &AppConfig, prompt_dir: Option<&Path>) -> PromptSet {
    PromptSet::load(prompt_dir.or(config.paths.prompt_dir.as_deref()))
}

fn build_provider(config: &AppConfig) -> Result<Arc<dyn LlmProvider>> {
    let endpoint = config.endpoint_config()?;
    debug!(provider = %config.llm.provider, endpoint = ?endpoint, "Creating provider");
    Ok(Arc::from(create_provider(&config.llm.provider, endpoint)?))
}

fn retrieval_stage(config: &AppConfig, prompts: &PromptSet) -> Result<RetrievalStage> {
    Ok(RetrievalStage::new(
        config.retrieval_settings(),
        &prompts.retrieval,
    )?)
}

fn generation_stage(config: &AppConfig, prompts: &PromptSet) -> Result<GenerationStage> {
    Ok(GenerationStage::new(
        config.generation_settings(),
        &prompts.generation,
    )?)
}

// ==================== Command Implementations ====================

fn cmd_run(cli: &Cli, params: &RunParams<'_>, format: OutputFormat) -> Result<String> {
    let user_query = resolve_user_query(params.query)?;
    let context = load_context(params.context)?;
    let config = load_config(cli)?;
    let prompts = load_prompts(&config, params.prompt_dir);

    let retrieval = retrieval_stage(&config, &prompts)?;
    let generation = generation_stage(&config, &prompts)?;

    let executor: Box<dyn QueryExecutor> = match params.rows_file {
        Some(path) => Box::new(RowsFileExecutor::new(path)),
        None => Box::new(Neo4jHttpExecutor::new(config.neo4j_config()?)?),
    };

    let output_dir = params
        .output_dir
        .map_or_else(|| config.paths.output_dir.clone(), PathBuf::from);
    let artifacts = ArtifactWriter::new(output_dir)?;

    let pipeline = Pipeline::new(
        build_provider(&config)?,
        executor,
        retrieval,
        generation,
        artifacts,
    );
    let outcome = pipeline.run(&PipelineInputs {
        user_query,
        schema_text: context.schema,
        value_dict_text: context.value_dict,
        cypher_example: context.cypher_example,
        triplets_max_rows: params.triplets_max_rows,
    })?;

    Ok(format_outcome(&outcome, format))
}

fn cmd_retrieve(
    cli: &Cli,
    query: &QueryArgs,
    context: &ContextArgs,
    prompt_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let user_query = resolve_user_query(query)?;
    let context = load_context(context)?;
    let config = load_config(cli)?;
    let prompts = load_prompts(&config, prompt_dir);
    let stage = retrieval_stage(&config, &prompts)?;
    let provider = build_provider(&config)?;

    let result = stage.generate_query(
        provider.as_ref(),
        &user_query,
        &context.schema,
        &context.value_dict,
        &context.cypher_example,
    )?;
    Ok(format_retrieval(&result, format))
}

fn cmd_generate(
    cli: &Cli,
    query: &QueryArgs,
    evidence_file: &Path,
    prompt_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let user_query = resolve_user_query(query)?;
    let evidence = read_input(evidence_file)?;
    let config = load_config(cli)?;
    let prompts = load_prompts(&config, prompt_dir);
    let stage = generation_stage(&config, &prompts)?;
    let provider = build_provider(&config)?;

    let result = stage.generate(provider.as_ref(), &user_query, &evidence)?;
    match format {
        OutputFormat::Text => Ok(format!("{}\n", result.enhanced_prompt.trim_end())),
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({
            "enhanced_prompt": result.enhanced_prompt,
        }))),
    }
}

fn cmd_render(
    cli: &Cli,
    query: &QueryArgs,
    context: &ContextArgs,
    prompt_dir: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let user_query = resolve_user_query(query)?;
    let context = load_context(context)?;
    let config = load_config(cli)?;
    let prompts = load_prompts(&config, prompt_dir);
    let stage = retrieval_stage(&config, &prompts)?;

    let prompt = stage.build_prompt(
        &user_query,
        &context.schema,
        &context.value_dict,
        &context.cypher_example,
    )?;
    match format {
        OutputFormat::Text => Ok(format!("{prompt}\n")),
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({ "prompt": prompt }))),
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let dir = dir
        .map(Path::to_path_buf)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| {
            CommandError::ExecutionFailed("no home directory; pass --dir".to_string())
        })?;
    let scaffold = PromptSet::write_defaults(&dir).map_err(|source| CommandError::WriteOutput {
        path: dir.display().to_string(),
        source,
    })?;
    info!(
        written = scaffold.written.len(),
        existing = scaffold.existing.len(),
        "Scaffolded prompt templates"
    );
    Ok(format_scaffold(&scaffold, format))
}
