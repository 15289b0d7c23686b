// src/api/mod.rs

pub mod assets;
pub mod health;

use std::sync::Arc;

use crate::{
    config::Config,
    constants::network_by_chain_id,
    error::{AppError, Result},
    models::EvmNetwork,
    services::{AssetDataHelper, ProviderTracker},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub providers: Arc<ProviderTracker>,
    pub assets: Arc<AssetDataHelper>,
}

/// Resolves a path chain id to a supported network.
pub fn require_network(chain_id: &str) -> Result<EvmNetwork> {
    network_by_chain_id(chain_id)
        .ok_or_else(|| AppError::NotFound(format!("Unsupported network: {}", chain_id)))
}
