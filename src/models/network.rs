use serde::Serialize;
use std::fmt;

/// Native asset a network pays fees in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NetworkBaseAsset {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
}

/// An EVM network the service knows about. Networks are static configuration,
/// see `constants::SUPPORTED_NETWORKS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EvmNetwork {
    pub name: &'static str,
    pub chain_id: &'static str,
    pub base_asset: NetworkBaseAsset,
}

impl fmt::Display for EvmNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.chain_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::constants::{ETHEREUM, POLYGON};

    #[test]
    fn display_shows_name_and_chain_id() {
        assert_eq!(ETHEREUM.to_string(), "Ethereum (1)");
        assert_eq!(POLYGON.base_asset.symbol, "MATIC");
    }
}
