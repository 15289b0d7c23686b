use chrono::{DateTime, Utc};
use ethers::types::U256;
use serde::Serialize;

use super::{EvmNetwork, NetworkBaseAsset};

/// A wallet or contract address scoped to a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressOnNetwork {
    pub address: String,
    pub network: EvmNetwork,
}

impl AddressOnNetwork {
    pub fn new(address: impl Into<String>, network: EvmNetwork) -> Self {
        Self {
            address: address.into(),
            network,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmartContract {
    pub contract_address: String,
    pub home_network: EvmNetwork,
}

impl SmartContract {
    pub fn new(contract_address: impl Into<String>, home_network: EvmNetwork) -> Self {
        Self {
            contract_address: contract_address.into(),
            home_network,
        }
    }
}

/// Balance of a token contract held by some address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmartContractAmount {
    pub smart_contract: SmartContract,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmartContractFungibleAsset {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    pub contract_address: String,
    pub home_network: EvmNetwork,
}

/// Asset moved by a transfer: either the network's base asset or a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferredAsset {
    Native(NetworkBaseAsset),
    Fungible {
        symbol: String,
        decimals: u8,
        contract_address: String,
        home_network: EvmNetwork,
    },
}

impl TransferredAsset {
    pub fn symbol(&self) -> &str {
        match self {
            TransferredAsset::Native(asset) => asset.symbol,
            TransferredAsset::Fungible { symbol, .. } => symbol,
        }
    }

    pub fn contract_address(&self) -> Option<&str> {
        match self {
            TransferredAsset::Native(_) => None,
            TransferredAsset::Fungible {
                contract_address, ..
            } => Some(contract_address),
        }
    }
}

/// A historical transfer touching an address. Only produced by an indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetTransfer {
    pub network: EvmNetwork,
    pub asset: TransferredAsset,
    pub amount: U256,
    pub from: String,
    pub to: Option<String>,
    pub tx_hash: String,
    pub block_height: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_timestamp: Option<DateTime<Utc>>,
    pub data_source: String,
}
