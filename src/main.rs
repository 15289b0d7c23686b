use axum::http::HeaderValue;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chain_asset_data::{
    api,
    config::Config,
    constants::API_VERSION,
    services::{build_asset_data_helper, ProviderTracker},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chain_asset_data=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting chain asset data service");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    let providers = Arc::new(ProviderTracker::from_config(&config)?);
    let assets = Arc::new(build_asset_data_helper(&config, providers.clone())?);
    if assets.options().use_mainnet_fork {
        tracing::warn!("Mainnet fork balance fallback enabled");
    }

    let app_state = api::AppState {
        config: config.clone(),
        providers,
        assets,
    };

    let app = build_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: api::AppState) -> Router {
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Networks
        .route("/api/v1/networks", get(api::assets::list_networks))
        // Asset data
        .route(
            "/api/v1/networks/{chain_id}/accounts/{address}/balances",
            get(api::assets::get_balances),
        )
        .route(
            "/api/v1/networks/{chain_id}/accounts/{address}/transfers",
            get(api::assets::get_transfers),
        )
        .route(
            "/api/v1/networks/{chain_id}/tokens/{contract}/metadata",
            get(api::assets::get_token_metadata),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
