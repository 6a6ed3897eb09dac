use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use hotscore::config::Config;
use hotscore::embedding::EmbeddingProvider;
use hotscore::embedding::local::LocalEmbeddingProvider;
use hotscore::embedding::openai::OpenAIEmbeddingProvider;
use hotscore::logging;
use hotscore::pipeline::{ScoreRequest, ScoringPipeline};
use hotscore::scoring::HotScoreEngine;
use hotscore::server::{scored_item_json, ScoringService};
use rmcp::ServiceExt;

#[derive(Parser)]
#[command(name = "hotscore", version, about = "Hot-score ranking engine for news items")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a JSON batch ({"news": [...], "topic_keywords": [...], "top_n": N}) and print the ranking
    Rank {
        /// Request file; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
        /// Override the request's top_n
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Print the effective configuration as JSON
    Config,
}

/// Create the embedding provider based on configuration.
///
/// Returns `None` when embedding is disabled (provider = "none").
async fn create_embedding_provider(
    config: &Config,
) -> Result<Option<Arc<dyn EmbeddingProvider + Send + Sync>>> {
    match config.embedding.provider.as_str() {
        "none" => Ok(None),
        "openai" => {
            let api_key = config.embedding.openai_api_key.clone()
                .ok_or_else(|| anyhow::anyhow!(
                    "OpenAI API key required when provider is 'openai'. \
                     Set HOTSCORE_EMBEDDING__OPENAI_API_KEY or embedding.openai_api_key in hotscore.toml"
                ))?;
            let provider: Arc<dyn EmbeddingProvider + Send + Sync> = Arc::new(OpenAIEmbeddingProvider::new(
                api_key,
                config.embedding.openai_base_url.clone(),
                config.embedding.openai_model.clone(),
            )?);
            Ok(Some(provider))
        }
        "local" => {
            let provider: Arc<dyn EmbeddingProvider + Send + Sync> =
                Arc::new(LocalEmbeddingProvider::new(&config.embedding.cache_dir).await?);
            Ok(Some(provider))
        }
        other => Err(anyhow::anyhow!(
            "Unknown embedding provider '{}': expected local, openai or none",
            other
        )),
    }
}

async fn build_pipeline(config: &Config) -> Result<Arc<ScoringPipeline>> {
    let engine = Arc::new(HotScoreEngine::new(config.scoring.clone())?);
    let provider = create_embedding_provider(config).await?;
    tracing::info!(
        provider = %config.embedding.provider,
        model = ?provider.as_ref().map(|p| p.model_name().to_string()),
        "Scoring engine ready"
    );
    Ok(Arc::new(ScoringPipeline::new(engine, provider)))
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration; invalid weights are fatal here, never at scoring time
    let config = Config::load()?;

    // 3. Initialize logging FIRST (before any other output)
    // logging goes to stderr only; stdout carries JSON-RPC or the ranking output
    logging::init_logging(&config);

    match cli.command {
        Some(Commands::Config) => {
            println!("{}", serde_json::to_string_pretty(&config.scoring)?);
        }

        Some(Commands::Rank { input, top_n }) => {
            let raw = match input {
                Some(path) => std::fs::read_to_string(&path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let mut request: ScoreRequest = serde_json::from_str(&raw)?;
            if top_n.is_some() {
                request.top_n = top_n;
            }

            let pipeline = build_pipeline(&config).await?;
            let ranked = pipeline.score(request).await?;
            let output: Vec<serde_json::Value> = ranked.iter().map(scored_item_json).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        None => {
            // Default: start the MCP server
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                "hotscore server starting"
            );

            let pipeline = build_pipeline(&config).await?;
            let service = ScoringService::new(pipeline);

            // Serve via stdio transport
            let (stdin, stdout) = rmcp::transport::io::stdio();
            let server = service.serve((stdin, stdout)).await?;

            tracing::info!("hotscore server running — awaiting tool calls via stdio");

            // Wait for shutdown (client disconnects or signal)
            server.waiting().await?;

            tracing::info!("hotscore server stopped");
        }
    }

    Ok(())
}
