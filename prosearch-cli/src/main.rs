//! Prosearch CLI - Command-line interface for Prosearch
//!
//! Runs the iterative research workflow on a question and manages configuration

use clap::{Parser, Subcommand};
use prosearch_agent::{Collaborators, ResearchEngine, ResearchOutcome};
use prosearch_core::{
    init_logging, log_run_failed, log_run_finished, log_run_start, ErrorContext,
    Message, ProsearchConfig, ProsearchError, ProsearchResult, RunOverrides,
};
use prosearch_rag::{
    ArticleIndex, DuckDuckGoSearch, LlmAnswerWriter, LlmClientPool, LlmQueryGenerator,
    LlmReflector, PromptLibrary, RagError, TextGenerator, WebResearcher,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "prosearch")]
#[command(about = "Iterative multi-source research with cited answers")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a question and print a cited answer
    Research {
        /// The question to research
        question: String,

        /// Number of initial search queries
        #[arg(long)]
        initial_queries: Option<usize>,

        /// Maximum number of reflection passes
        #[arg(long)]
        max_loops: Option<u32>,

        /// Model for query generation and web research
        #[arg(long)]
        query_model: Option<String>,

        /// Model for reflection and the final answer
        #[arg(long)]
        reasoning_model: Option<String>,

        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> ProsearchResult<()> {
    let cli = Cli::parse();

    let (config, config_path) = load_config(cli.config.as_ref())?;

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config = logging_config.verbose();
    }

    init_logging(&logging_config).map_err(|e| ProsearchError::Config {
        message: format!("Failed to initialize logging: {}", e),
        source: Some(e),
        context: ErrorContext::new("cli")
            .with_operation("init_logging")
            .with_suggestion("Check logging configuration"),
    })?;

    info!("Starting Prosearch CLI v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("No configuration file found, using defaults"),
    }

    match cli.command {
        Commands::Research {
            question,
            initial_queries,
            max_loops,
            query_model,
            reasoning_model,
            json,
        } => {
            let overrides = RunOverrides {
                initial_query_count: initial_queries,
                max_research_loops: max_loops,
                query_model,
                reasoning_model,
            };
            handle_research(question, overrides, json, &config).await?;
        }
        Commands::Config {
            show,
            init,
            validate,
        } => {
            handle_config(show, init, validate, &config, config_path.as_ref()).await?;
        }
    }

    Ok(())
}

/// Load the configuration and report which file it came from
fn load_config(
    config_path: Option<&PathBuf>,
) -> ProsearchResult<(ProsearchConfig, Option<PathBuf>)> {
    if let Some(path) = config_path {
        return Ok((ProsearchConfig::from_file(path)?, Some(path.clone())));
    }

    let default_paths = [
        dirs::config_dir().map(|d| d.join("prosearch").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".prosearch").join("config.toml")),
        Some(PathBuf::from("prosearch.toml")),
    ];

    for path in default_paths.into_iter().flatten() {
        if path.exists() {
            return Ok((ProsearchConfig::from_file(&path)?, Some(path)));
        }
    }

    Ok((ProsearchConfig::default(), None))
}

async fn handle_research(
    question: String,
    overrides: RunOverrides,
    json: bool,
    config: &ProsearchConfig,
) -> ProsearchResult<()> {
    log_run_start!("research", question = %question);

    config.validate()?;
    let engine = build_engine(config).map_err(|e| {
        log_run_failed!("build_engine", e);
        e
    })?;

    let outcome = engine
        .run(vec![Message::user(question)], &overrides)
        .await
        .map_err(|e| {
            log_run_failed!("research", e);
            e
        })?;

    log_run_finished!(
        "research",
        loops = outcome.research_loop_count,
        waves = outcome.waves,
        sources = outcome.sources.len()
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    Ok(())
}

/// Wire the concrete collaborators into an engine
fn build_engine(config: &ProsearchConfig) -> ProsearchResult<ResearchEngine> {
    let llm: Arc<dyn TextGenerator> = Arc::new(
        LlmClientPool::new(config.llm.clone()).map_err(|e| setup_error(e, "create_llm_pool"))?,
    );
    let prompts = Arc::new(PromptLibrary::new().map_err(|e| setup_error(e, "load_prompts"))?);
    let search = Arc::new(
        DuckDuckGoSearch::new(config.search.clone()).map_err(|e| setup_error(e, "create_search"))?,
    );

    let lookup = load_lookup(config)?;

    let collaborators = Collaborators {
        query_generator: Arc::new(LlmQueryGenerator::new(llm.clone(), prompts.clone())),
        researcher: Arc::new(WebResearcher::new(search, llm.clone(), prompts.clone())),
        lookup: Arc::new(lookup),
        reflector: Arc::new(LlmReflector::new(llm.clone(), prompts.clone())),
        answer_writer: Arc::new(
            LlmAnswerWriter::new(llm, prompts)
                .with_system_prompt(config.llm.answer_system_prompt.clone()),
        ),
    };

    ResearchEngine::from_config(config, collaborators)
}

/// The targeted-lookup index, empty when no corpus is configured
fn load_lookup(config: &ProsearchConfig) -> ProsearchResult<ArticleIndex> {
    match &config.lookup.corpus_path {
        Some(path) => ArticleIndex::from_file(path, config.lookup.max_matches),
        None => {
            warn!("No lookup.corpus_path configured; targeted lookups will return no articles");
            ArticleIndex::empty(config.lookup.max_matches)
        }
    }
    .map_err(|e| setup_error(e, "load_lookup_corpus"))
}

fn setup_error(err: RagError, operation: &str) -> ProsearchError {
    ProsearchError::Config {
        message: err.to_string(),
        source: Some(Box::new(err)),
        context: ErrorContext::new("cli")
            .with_operation(operation)
            .with_suggestion("Check if LLM API keys are configured (OPENAI_API_KEY, ANTHROPIC_API_KEY, etc.)")
            .with_suggestion("Check lookup.corpus_path if a corpus is configured"),
    }
}

fn print_outcome(outcome: &ResearchOutcome) {
    println!("{}", outcome.answer().unwrap_or_default());

    if !outcome.sources.is_empty() {
        println!();
        println!("Sources:");
        for (i, source) in outcome.sources.iter().enumerate() {
            match &source.label {
                Some(label) => println!("  {}. {} - {}", i + 1, label, source.canonical_value),
                None => println!("  {}. {}", i + 1, source.canonical_value),
            }
        }
    }

    println!();
    println!(
        "Route: {:?} | reflection passes: {} | waves: {} | queries: {}",
        outcome.route,
        outcome.research_loop_count,
        outcome.waves,
        outcome.queries_run.len()
    );
}

async fn handle_config(
    show: bool,
    init: bool,
    validate: bool,
    config: &ProsearchConfig,
    config_path: Option<&PathBuf>,
) -> ProsearchResult<()> {
    if init {
        let config_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
            .ok_or_else(|| ProsearchError::Config {
                message: "Could not determine a configuration directory".to_string(),
                source: None,
                context: ErrorContext::new("config_init")
                    .with_suggestion("Pass --config with an explicit path"),
            })?
            .join("prosearch");

        tokio::fs::create_dir_all(&config_dir).await?;
        let path = config_dir.join("config.toml");

        ProsearchConfig::default().save_to_file(&path)?;
        println!("Configuration initialized at: {:?}", path);
        println!("Edit the file to add your API keys and customize settings.");
    }

    if show {
        if let Some(path) = config_path {
            println!("# Loaded from {:?}", path);
        }
        let rendered =
            toml::to_string_pretty(&config.redacted()).map_err(|e| ProsearchError::Config {
                message: format!("Failed to render configuration: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config_show"),
            })?;
        println!("{}", rendered);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("Configuration is valid"),
            Err(e) => {
                println!("Configuration validation failed: {}", e);
                return Err(e);
            }
        }
    }

    Ok(())
}
