use async_trait::async_trait;
use ethers::contract::ContractError;
use ethers::providers::{Http, MiddlewareError, Provider, RpcError};
use ethers::types::{Address, U256};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use super::connections::ChainConnection;
use crate::{
    error::{AppError, Result},
    models::{SmartContract, SmartContractFungibleAsset},
};

ethers::contract::abigen!(
    Erc20,
    r#"[
        function balanceOf(address) view returns (uint256)
        function name() view returns (string)
        function symbol() view returns (string)
        function decimals() view returns (uint8)
    ]"#
);

/// Point reads against a token contract through a node connection.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn balance_of(
        &self,
        connection: &ChainConnection,
        contract_address: &str,
        owner_address: &str,
    ) -> Result<U256>;

    async fn token_metadata(
        &self,
        connection: &ChainConnection,
        contract: &SmartContract,
    ) -> Result<SmartContractFungibleAsset>;
}

/// ERC20 reader over the connection's current transport. A timeout or a
/// transport fault moves the connection on to its next transport; a node
/// answer such as a revert or an undecodable return value does not.
#[derive(Debug, Clone)]
pub struct Erc20Reader {
    timeout: Duration,
}

impl Erc20Reader {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn contract(
        &self,
        connection: &ChainConnection,
        contract_address: &str,
    ) -> Result<Erc20<Provider<Http>>> {
        let address = parse_address(contract_address, "ERC20")?;
        Ok(Erc20::new(address, connection.current_transport().provider()))
    }

    async fn read<T, F>(&self, connection: &ChainConnection, label: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, ContractError<Provider<Http>>>>,
    {
        let transport = connection.current_transport().label().to_string();
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                if is_transport_fault(&err) {
                    connection.fail_over();
                }
                Err(AppError::BlockchainRPC(format!(
                    "{} via {}: {}",
                    label, transport, err
                )))
            }
            Err(_) => {
                connection.fail_over();
                Err(AppError::BlockchainRPC(format!(
                    "{} via {} timed out after {}s",
                    label,
                    transport,
                    self.timeout.as_secs()
                )))
            }
        }
    }
}

// A JSON-RPC error body means the node answered; only rate limiting and
// gateway trouble count as the transport failing.
fn is_transport_fault(err: &ContractError<Provider<Http>>) -> bool {
    let response = match err {
        ContractError::MiddlewareError { e } => MiddlewareError::as_error_response(e),
        ContractError::ProviderError { e } => RpcError::as_error_response(e),
        _ => return false,
    };
    match response {
        None => true,
        Some(rpc_error) => looks_like_transient_rpc_error(&rpc_error.message),
    }
}

fn looks_like_transient_rpc_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("too many requests")
        || lower.contains("429")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("gateway")
        || lower.contains("temporarily unavailable")
        || lower.contains("connection reset")
}

#[async_trait]
impl ChainReader for Erc20Reader {
    async fn balance_of(
        &self,
        connection: &ChainConnection,
        contract_address: &str,
        owner_address: &str,
    ) -> Result<U256> {
        let owner = parse_address(owner_address, "owner")?;
        let erc20 = self.contract(connection, contract_address)?;
        self.read(connection, "erc20_balanceOf", erc20.balance_of(owner).call())
            .await
    }

    async fn token_metadata(
        &self,
        connection: &ChainConnection,
        contract: &SmartContract,
    ) -> Result<SmartContractFungibleAsset> {
        let erc20 = self.contract(connection, &contract.contract_address)?;

        let name = self.read(connection, "erc20_name", erc20.name().call()).await?;
        let symbol = self
            .read(connection, "erc20_symbol", erc20.symbol().call())
            .await?;
        let decimals = self
            .read(connection, "erc20_decimals", erc20.decimals().call())
            .await?;

        Ok(SmartContractFungibleAsset {
            name,
            symbol,
            decimals,
            logo_url: None,
            contract_address: contract.contract_address.clone(),
            home_network: contract.home_network,
        })
    }
}

pub fn parse_address(value: &str, label: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|_| AppError::BadRequest(format!("Invalid {} address: {}", label, value)))
}
