//! docket - Main Entry Point
//!
//! Document segmentation and retrieval service.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docket::api::{build_router, AppState};
use docket::embedding::{EmbeddingService, HttpEmbeddingClient};
use docket::store::ChunkStore;
use docket::types::{ChunkingConfig, ChunkingProfile};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "docket=info,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").map_or(false, |f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mut config = ChunkingConfig::from_env().context("invalid DOCKET_* configuration")?;
    if config.active_profile != "default" {
        match ChunkingProfile::find(&config.active_profile) {
            Some(profile) => config.apply_profile(&profile),
            None => warn!(profile = %config.active_profile, "Unknown chunking profile, using defaults"),
        }
    }
    config
        .chunk_config()
        .validate()
        .context("invalid chunking configuration")?;

    info!("Starting docket v{}", env!("CARGO_PKG_VERSION"));
    info!(
        target_tokens = config.target_tokens,
        window_size = config.window_size,
        profile = %config.active_profile,
        "Chunking configuration"
    );

    let chunk_store = match &config.data_dir {
        Some(dir) => {
            let store = ChunkStore::persistent(dir).await?;
            store.load_all().await?;
            store
        }
        None => ChunkStore::in_memory(),
    };

    let embedder: Option<Arc<dyn EmbeddingService>> = match &config.embedding_service_url {
        Some(url) => {
            let client = HttpEmbeddingClient::new(url)?;
            match client.initialize().await {
                Ok(device) => info!(device = %device.device, "Embedding service connected"),
                Err(e) => warn!(error = %e, "Embedding service not reachable yet"),
            }
            Some(Arc::new(client))
        }
        None => {
            warn!("No embedding service configured; search is disabled");
            None
        }
    };

    let state = Arc::new(AppState::new(config, Arc::new(chunk_store), embedder));
    let app = build_router(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3017);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
