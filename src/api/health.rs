use axum::{extract::State, Json};
use serde::Serialize;
use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub connected_networks: Vec<String>,
    pub mainnet_fork: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected_networks = state
        .providers
        .connected_networks()
        .iter()
        .map(|network| network.name.to_string())
        .collect();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connected_networks,
        mainnet_fork: state.assets.options().use_mainnet_fork,
    })
}
