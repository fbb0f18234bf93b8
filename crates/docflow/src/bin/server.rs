//! docflow server binary
//!
//! Run with: cargo run -p docflow --bin docflow-server

use std::path::PathBuf;

use docflow::{config::DocflowConfig, server::DocflowServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docflow=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                      docflow server                       ║
║      Sequential document ingestion with live progress     ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    // Load configuration
    let config_path = std::env::var("DOCFLOW_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("docflow.toml"));
    let config = DocflowConfig::load(&config_path)?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Database: {}", config.storage.database_path.display());
    tracing::info!("  - Upload dir: {}", config.storage.upload_dir.display());
    tracing::info!("  - Embedding model: {}", config.embedding.model);
    tracing::info!(
        "  - Chunk size: {} tokens (overlap {})",
        config.ingest.chunk_size,
        config.ingest.chunk_overlap
    );

    // Check Ollama
    tracing::info!("Checking Ollama at {}...", config.embedding.base_url);
    let client = reqwest::Client::new();
    match client
        .get(format!("{}/api/tags", config.embedding.base_url))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!("Ollama is running");
        }
        _ => {
            tracing::warn!("Ollama not available at {}", config.embedding.base_url);
            tracing::warn!("Embedding calls will fail until it is started:");
            tracing::warn!("  1. Install: brew install ollama");
            tracing::warn!("  2. Start: ollama serve");
            tracing::warn!("  3. Pull the model: ollama pull {}", config.embedding.model);
        }
    }

    // Create and start server
    let server = DocflowServer::new(config)?;

    println!("\nServer starting...");
    println!("  API: http://{}/api", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/documents/upload     - Upload a document");
    println!("  GET  /api/documents            - List documents");
    println!("  GET  /api/documents/stream/:id - Live progress (SSE)");
    println!("  GET  /api/queue                - Upload queue");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
