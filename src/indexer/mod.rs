pub mod alchemy_client;

use async_trait::async_trait;

use crate::{
    error::Result,
    models::{
        AddressOnNetwork, AssetTransfer, SmartContract, SmartContractAmount,
        SmartContractFungibleAsset,
    },
    services::connections::Transport,
};

pub use alchemy_client::AlchemyClient;

/// Hosted indexing API answering aggregated asset queries. A failure means
/// the transport/network pair could not answer, not necessarily a hard fault.
#[async_trait]
pub trait EnhancedIndexer: Send + Sync {
    async fn token_balances(
        &self,
        transport: &Transport,
        address: &AddressOnNetwork,
        contract_addresses: Option<&[String]>,
    ) -> Result<Vec<SmartContractAmount>>;

    async fn token_metadata(
        &self,
        transport: &Transport,
        contract: &SmartContract,
    ) -> Result<SmartContractFungibleAsset>;

    async fn asset_transfers(
        &self,
        transport: &Transport,
        address: &AddressOnNetwork,
        start_block: u64,
        end_block: Option<u64>,
    ) -> Result<Vec<AssetTransfer>>;
}
