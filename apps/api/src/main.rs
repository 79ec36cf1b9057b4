use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use directory_cell::services::SpecialtyService;
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting AfyaConnect API server");

    // Load configuration
    let config = AppConfig::from_env();

    if config.seed_reference_data {
        seed_reference_data(&config).await;
    }

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let port = config.server_port;
    let state = Arc::new(config);

    // Build the application router
    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Upserts the default specialties. Failures are logged; the server still starts.
async fn seed_reference_data(config: &AppConfig) {
    if config.supabase_service_role_key.is_empty() {
        warn!("SEED_REFERENCE_DATA is set but SUPABASE_SERVICE_ROLE_KEY is missing, skipping seed");
        return;
    }

    match SpecialtyService::new(config)
        .seed_default_specialties(&config.supabase_service_role_key)
        .await
    {
        Ok(inserted) => info!("Seeded {} medical specialties", inserted),
        Err(e) => error!("Failed to seed medical specialties: {}", e),
    }
}
