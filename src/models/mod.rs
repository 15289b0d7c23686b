// src/models/mod.rs
pub mod asset;
pub mod network;
pub mod response;

pub use asset::{
    AddressOnNetwork,
    AssetTransfer,
    SmartContract,
    SmartContractAmount,
    SmartContractFungibleAsset,
    TransferredAsset,
};
pub use network::{EvmNetwork, NetworkBaseAsset};
pub use response::ApiResponse;
