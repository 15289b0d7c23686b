use futures_util::future::join_all;
use std::sync::Arc;

use super::{
    connections::{ChainConnection, ConnectionProvider},
    diagnostics::{DiagnosticLevel, Diagnostics, TracingDiagnostics},
    onchain::ChainReader,
};
use crate::{
    config::Config,
    constants::{MAINNET_FORK_NETWORK, MAINNET_FORK_TOKENS},
    error::Result,
    indexer::EnhancedIndexer,
    models::{
        AddressOnNetwork, AssetTransfer, SmartContract, SmartContractAmount,
        SmartContractFungibleAsset,
    },
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetDataOptions {
    /// Read balances of `MAINNET_FORK_TOKENS` directly from the node when the
    /// enhanced lookup yields nothing. Only meant for local mainnet forks.
    pub use_mainnet_fork: bool,
}

impl AssetDataOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            use_mainnet_fork: config.use_mainnet_fork,
        }
    }
}

/// Resolves token balances, token metadata and transfer history for an
/// address, choosing per network between the enhanced indexer and raw
/// contract reads.
///
/// Failure policy differs per operation:
/// * balances never fail; an unusable indexer degrades to the fork fallback
///   or to an empty list.
/// * metadata falls back to raw reads, whose failure is returned.
/// * transfers have no fallback and return the indexer's error unchanged so
///   callers can tell "nothing happened" from "could not check".
pub struct AssetDataHelper {
    connections: Arc<dyn ConnectionProvider>,
    indexer: Arc<dyn EnhancedIndexer>,
    chain_reader: Arc<dyn ChainReader>,
    diagnostics: Arc<dyn Diagnostics>,
    options: AssetDataOptions,
}

impl AssetDataHelper {
    pub fn new(
        connections: Arc<dyn ConnectionProvider>,
        indexer: Arc<dyn EnhancedIndexer>,
        chain_reader: Arc<dyn ChainReader>,
        options: AssetDataOptions,
    ) -> Self {
        Self {
            connections,
            indexer,
            chain_reader,
            diagnostics: Arc::new(TracingDiagnostics),
            options,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn options(&self) -> AssetDataOptions {
        self.options
    }

    pub async fn get_token_balances(
        &self,
        address: &AddressOnNetwork,
        contract_addresses: Option<&[String]>,
    ) -> Vec<SmartContractAmount> {
        let Some(connection) = self.connections.connection_for(&address.network) else {
            return Vec::new();
        };

        let transport = connection.current_transport();
        if transport.capability().is_enhanced() {
            match self
                .indexer
                .token_balances(transport, address, contract_addresses)
                .await
            {
                Ok(balances) => return balances,
                Err(err) => self.diagnostics.record(
                    DiagnosticLevel::Debug,
                    "Problem resolving asset balances via enhanced indexer; network may not support it.",
                    &err,
                ),
            }
        }

        if self.options.use_mainnet_fork {
            return self.mainnet_fork_balances(&connection, address).await;
        }

        Vec::new()
    }

    pub async fn get_token_metadata(
        &self,
        contract: &SmartContract,
    ) -> Result<Option<SmartContractFungibleAsset>> {
        let Some(connection) = self.connections.connection_for(&contract.home_network) else {
            return Ok(None);
        };

        let transport = connection.current_transport();
        if transport.capability().is_enhanced() {
            match self.indexer.token_metadata(transport, contract).await {
                Ok(asset) => return Ok(Some(asset)),
                Err(err) => self.diagnostics.record(
                    DiagnosticLevel::Debug,
                    "Problem resolving asset metadata via enhanced indexer; network may not support it. Falling back to standard lookup.",
                    &err,
                ),
            }
        }

        self.chain_reader
            .token_metadata(&connection, contract)
            .await
            .map(Some)
    }

    /// Transfers touching `address` between `start_block` and `end_block`
    /// (latest when absent). Empty when the network has no enhanced-capable
    /// transport.
    pub async fn get_asset_transfers(
        &self,
        address: &AddressOnNetwork,
        start_block: u64,
        end_block: Option<u64>,
    ) -> Result<Vec<AssetTransfer>> {
        let Some(connection) = self.connections.connection_for(&address.network) else {
            return Ok(Vec::new());
        };

        let transport = connection.current_transport();
        if !transport.capability().is_enhanced() {
            return Ok(Vec::new());
        }

        self.indexer
            .asset_transfers(transport, address, start_block, end_block)
            .await
            .map_err(|err| {
                self.diagnostics.record(
                    DiagnosticLevel::Warn,
                    "Problem resolving asset transfers via enhanced indexer; network may not support it.",
                    &err,
                );
                err
            })
    }

    async fn mainnet_fork_balances(
        &self,
        connection: &ChainConnection,
        address: &AddressOnNetwork,
    ) -> Vec<SmartContractAmount> {
        let lookups = MAINNET_FORK_TOKENS.iter().map(|token| async move {
            self.chain_reader
                .balance_of(connection, token, &address.address)
                .await
                .map(|amount| SmartContractAmount {
                    smart_contract: SmartContract::new(*token, MAINNET_FORK_NETWORK),
                    amount,
                })
        });

        join_all(lookups)
            .await
            .into_iter()
            .filter_map(|result| match result {
                Ok(balance) => Some(balance),
                Err(err) => {
                    self.diagnostics.record(
                        DiagnosticLevel::Debug,
                        "Problem reading mainnet fork token balance.",
                        &err,
                    );
                    None
                }
            })
            .collect()
    }
}
