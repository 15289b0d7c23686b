// Application constants
use crate::models::{EvmNetwork, NetworkBaseAsset};

pub const API_VERSION: &str = "v1";

// Base assets
pub const ETH: NetworkBaseAsset = NetworkBaseAsset {
    name: "Ether",
    symbol: "ETH",
    decimals: 18,
};
pub const MATIC: NetworkBaseAsset = NetworkBaseAsset {
    name: "Matic Token",
    symbol: "MATIC",
    decimals: 18,
};

// Supported EVM networks
pub const ETHEREUM: EvmNetwork = EvmNetwork {
    name: "Ethereum",
    chain_id: "1",
    base_asset: ETH,
};
pub const POLYGON: EvmNetwork = EvmNetwork {
    name: "Polygon",
    chain_id: "137",
    base_asset: MATIC,
};
pub const ARBITRUM: EvmNetwork = EvmNetwork {
    name: "Arbitrum",
    chain_id: "42161",
    base_asset: ETH,
};
pub const OPTIMISM: EvmNetwork = EvmNetwork {
    name: "Optimism",
    chain_id: "10",
    base_asset: ETH,
};
pub const GOERLI: EvmNetwork = EvmNetwork {
    name: "Goerli",
    chain_id: "5",
    base_asset: ETH,
};

pub const SUPPORTED_NETWORKS: [EvmNetwork; 5] = [ETHEREUM, POLYGON, ARBITRUM, OPTIMISM, GOERLI];

/// Looks up a supported network by its decimal chain id.
pub fn network_by_chain_id(chain_id: &str) -> Option<EvmNetwork> {
    let chain_id = chain_id.trim();
    SUPPORTED_NETWORKS
        .iter()
        .find(|network| network.chain_id == chain_id)
        .copied()
}

// Mainnet fork
pub const MAINNET_FORK_NETWORK: EvmNetwork = ETHEREUM;
pub const MAINNET_FORK_TOKENS: [&str; 1] = ["0xE3709cde1eaFF5297035306C3D42E3cC8812ffa9"];

// Enhanced indexer (Alchemy)
pub const ALCHEMY_HOST_SUFFIXES: [&str; 2] = ["alchemy.com", "alchemyapi.io"];
pub const ALCHEMY_DATA_SOURCE: &str = "alchemy";
pub const ALCHEMY_DEFAULT_TOKEN_SPEC: &str = "erc20";
pub const ALCHEMY_TRANSFER_CATEGORIES: [&str; 2] = ["external", "erc20"];

/// Alchemy endpoint for a network, when Alchemy serves it.
pub fn alchemy_endpoint_for(network: &EvmNetwork, api_key: &str) -> Option<String> {
    let subdomain = match network.chain_id {
        "1" => "eth-mainnet",
        "137" => "polygon-mainnet",
        "42161" => "arb-mainnet",
        "10" => "opt-mainnet",
        "5" => "eth-goerli",
        _ => return None,
    };
    Some(format!("https://{subdomain}.g.alchemy.com/v2/{api_key}"))
}

// Transport
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;
