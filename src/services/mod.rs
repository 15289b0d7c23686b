// All service modules
pub mod asset_data;
pub mod connections;
pub mod diagnostics;
pub mod onchain;

// Re-export for convenience
pub use asset_data::{AssetDataHelper, AssetDataOptions};
pub use connections::{
    ChainConnection, ConnectionProvider, ProviderTracker, Transport, TransportCapability,
};
pub use diagnostics::{DiagnosticLevel, Diagnostics, TracingDiagnostics};
pub use onchain::{ChainReader, Erc20Reader};

use std::sync::Arc;

use crate::{config::Config, error::Result, indexer::AlchemyClient};

/// Wires the production collaborators behind an `AssetDataHelper`.
pub fn build_asset_data_helper(
    config: &Config,
    providers: Arc<ProviderTracker>,
) -> Result<AssetDataHelper> {
    let indexer = AlchemyClient::new(config.rpc_timeout_secs)?;
    let chain_reader = Erc20Reader::new(config.rpc_timeout_secs);

    Ok(AssetDataHelper::new(
        providers,
        Arc::new(indexer),
        Arc::new(chain_reader),
        AssetDataOptions::from_config(config),
    ))
}
