//! Castgen worker binary.
//!
//! Wires configuration, storage, adapters, the WebSocket progress endpoint
//! and the worker loop.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use castgen_genai::GeminiClient;
use castgen_media::FfmpegProcessor;
use castgen_notify::{ws::ws_progress, EventBus};
use castgen_pipeline::{Pipeline, PipelineConfig, PipelineDeps, Worker};
use castgen_publish::{Publisher, YouTubeClient};
use castgen_storage::{LocalStore, ObjectStore, S3Store};
use castgen_store::InMemoryJobStore;

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = match "castgen=info".parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting castgen-worker");

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    if let Err(e) = castgen_media::check_ffmpeg() {
        error!("ffmpeg is required: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = castgen_media::check_ffprobe() {
        error!("ffprobe is required: {}", e);
        std::process::exit(1);
    }

    let objects: Arc<dyn ObjectStore> = match std::env::var("CASTGEN_STORAGE").as_deref() {
        Ok("s3") => match S3Store::from_env() {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to create S3 store: {}", e);
                std::process::exit(1);
            }
        },
        _ => {
            let root = std::env::var("CASTGEN_STORAGE_ROOT")
                .unwrap_or_else(|_| "/var/lib/castgen/objects".to_string());
            Arc::new(LocalStore::new(root))
        }
    };

    let generator = match GeminiClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to create generation adapter: {}", e);
            std::process::exit(1);
        }
    };

    let publisher: Option<Arc<dyn Publisher>> = if config.channel_id.is_some() {
        match YouTubeClient::from_env() {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                error!("Publishing configured but client creation failed: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("No publish channel configured, publish stage will be a no-op");
        None
    };

    let bus = EventBus::new();
    let deps = PipelineDeps {
        store: Arc::new(InMemoryJobStore::new()),
        objects,
        media: Arc::new(FfmpegProcessor),
        generator,
        publisher,
        bus: bus.clone(),
        config,
    };
    let pipeline = Arc::new(Pipeline::new(deps));

    // WebSocket progress endpoint
    let ws_addr = std::env::var("CASTGEN_WS_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let app = Router::new()
        .route("/ws/progress", get(ws_progress))
        .with_state(bus);
    let listener = match tokio::net::TcpListener::bind(&ws_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", ws_addr, e);
            std::process::exit(1);
        }
    };
    info!("WebSocket progress endpoint on {}", ws_addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("WebSocket server error: {}", e);
        }
    });

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    Worker::new(pipeline).run(shutdown_rx).await;

    info!("Worker shutdown complete");
}
