use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thinking_models::catalog::{self, ModelCatalog, ModelFilter, ModelType};
use thinking_models::config::Config;
use thinking_models::llm::{LlmClient, Provider};
use thinking_models::output::{self, OutputFormat};
use thinking_models::query::{BatchOptions, QueryOrchestrator, QueryRequest};
use thinking_models::server::{self, AppState};
use thinking_models::{LlmOverride, build_orchestrator, interactive};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "thinking-models",
    about = "Solve problems with an LLM guided by a library of thinking models"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "thinking-models.toml")]
    config: PathBuf,

    /// Directory containing thinking model .txt files (overrides config)
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct LlmArgs {
    /// LLM provider override: openai, anthropic, gemini
    #[arg(long)]
    provider: Option<Provider>,

    /// LLM model name override
    #[arg(long)]
    llm_model: Option<String>,

    /// Sampling temperature (0-2)
    #[arg(long)]
    temperature: Option<f64>,

    /// Maximum tokens per completion
    #[arg(long)]
    max_tokens: Option<u32>,
}

impl LlmArgs {
    fn to_override(&self) -> LlmOverride {
        LlmOverride {
            provider: self.provider,
            model: self.llm_model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(clap::Subcommand)]
enum Command {
    /// Process a single query or a batch file of queries
    Query {
        /// The problem or question to solve
        text: Option<String>,

        /// File with one query per line (blank lines and # comments skipped)
        #[arg(short = 'f', long)]
        batch_file: Option<PathBuf>,

        /// Use this thinking model instead of letting the LLM choose
        #[arg(short, long)]
        model: Option<String>,

        /// Process batch queries concurrently
        #[arg(long)]
        parallel: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write the rendered result to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Interactive query loop
    Interactive {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        #[command(flatten)]
        llm: LlmArgs,
    },

    /// List thinking models
    Models {
        /// Filter by type: solve or explain
        #[arg(long = "type")]
        model_type: Option<ModelType>,

        /// Filter by field (exact match, '*' for universal)
        #[arg(long)]
        field: Option<String>,

        /// Case-insensitive substring search over id and definition
        #[arg(long)]
        search: Option<String>,

        /// Print JSON instead of a compact listing
        #[arg(long)]
        json: bool,
    },

    /// Show one thinking model in full
    Show { id: String },

    /// Catalog statistics
    Summary,

    /// Verify the LLM connection
    Check {
        #[command(flatten)]
        llm: LlmArgs,
    },

    /// Start the REST + WebSocket server
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[command(flatten)]
        llm: LlmArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(dir) = cli.models_dir.clone() {
        config.catalog.models_dir = dir;
    }

    let default_filter = format!(
        "thinking_models={}",
        config.log_level.as_deref().unwrap_or("info").to_lowercase()
    );
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&default_filter))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("thinking_models=info")),
        )
        .init();

    match cli.command {
        Command::Query {
            text,
            batch_file,
            model,
            parallel,
            format,
            output,
            llm,
        } => {
            llm.to_override().apply(&mut config.llm);
            config.validate()?;
            let catalog = load_catalog(&config)?;
            let orchestrator = build_orchestrator(&config, catalog)?;

            if let Some(path) = batch_file {
                let options = BatchOptions {
                    forced_model_id: model,
                    generation: Default::default(),
                    parallel: parallel.then_some(true),
                };
                return run_batch(&orchestrator, &path, &options, format, output.as_deref()).await;
            }
            let Some(text) = text else {
                anyhow::bail!("no query provided; pass a query or --batch-file (see --help)");
            };

            let mut request = QueryRequest::new(text);
            request.forced_model_id = model;
            match orchestrator.process_query(&request).await {
                Ok(result) => emit(&output::render_result(&result, format)?, output.as_deref()),
                Err(e) => {
                    eprintln!("Error [{}]: {e}", e.kind());
                    std::process::exit(1);
                }
            }
        }
        Command::Interactive { format, llm } => {
            llm.to_override().apply(&mut config.llm);
            config.validate()?;
            let catalog = load_catalog(&config)?;
            let orchestrator = build_orchestrator(&config, catalog)?;
            interactive::run(&orchestrator, &config, format).await
        }
        Command::Models {
            model_type,
            field,
            search,
            json,
        } => {
            let catalog = load_catalog(&config)?;
            let filter = ModelFilter {
                model_type,
                field,
                search,
            };
            let models = catalog.list(&filter);
            if json {
                println!("{}", serde_json::to_string_pretty(&models)?);
            } else {
                for m in &models {
                    println!(
                        "{:<32} {:<8} {}",
                        m.id,
                        m.model_type,
                        m.field.as_deref().unwrap_or("-")
                    );
                }
                println!("{} of {} models", models.len(), catalog.len());
            }
            Ok(())
        }
        Command::Show { id } => {
            let catalog = load_catalog(&config)?;
            let model = catalog.get(&id)?;
            println!("{}", serde_json::to_string_pretty(model)?);
            Ok(())
        }
        Command::Summary => {
            let catalog = load_catalog(&config)?;
            println!("{}", serde_json::to_string_pretty(&catalog.summary())?);
            Ok(())
        }
        Command::Check { llm } => {
            llm.to_override().apply(&mut config.llm);
            config.validate()?;
            let client = LlmClient::from_config(&config.llm)?;
            if client.test_connection().await {
                println!("LLM connection OK ({:?}, {})", client.provider(), client.model());
                Ok(())
            } else {
                anyhow::bail!("LLM connection test failed")
            }
        }
        Command::Serve { host, port, llm } => {
            llm.to_override().apply(&mut config.llm);
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            let catalog = load_catalog(&config)?;
            let orchestrator = match build_orchestrator(&config, catalog.clone()) {
                Ok(o) => Some(Arc::new(o)),
                Err(e) => {
                    warn!("starting without query processing: {e}");
                    None
                }
            };
            server::serve(&config.server, AppState::new(catalog, orchestrator)).await?;
            Ok(())
        }
    }
}

fn load_catalog(config: &Config) -> Result<Arc<ModelCatalog>> {
    let catalog = catalog::loader::load_dir(&config.catalog.models_dir)
        .with_context(|| format!("loading models from {}", config.catalog.models_dir.display()))?;
    Ok(Arc::new(catalog))
}

async fn run_batch(
    orchestrator: &QueryOrchestrator,
    path: &Path,
    options: &BatchOptions,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let queries = read_batch_file(path)?;
    if queries.is_empty() {
        anyhow::bail!("no queries found in {}", path.display());
    }
    eprintln!("Processing {} queries from {}...", queries.len(), path.display());
    let batch = orchestrator.process_batch(&queries, options).await;
    emit(&output::render_batch(&batch, format)?, output)?;
    if batch.failed > 0 {
        eprintln!("{} of {} queries failed", batch.failed, batch.results.len());
        std::process::exit(1);
    }
    Ok(())
}

fn read_batch_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading batch file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect())
}

fn emit(rendered: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            output::export(path, rendered)?;
            eprintln!("Result saved to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}
