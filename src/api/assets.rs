use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    constants::SUPPORTED_NETWORKS,
    error::{AppError, Result},
    models::{
        AddressOnNetwork, ApiResponse, AssetTransfer, EvmNetwork, SmartContract,
        SmartContractAmount, SmartContractFungibleAsset,
    },
    services::ConnectionProvider,
    utils::normalize_evm_address,
};

use super::{require_network, AppState};

#[derive(Debug, Deserialize)]
pub struct BalancesQuery {
    /// Comma separated contract addresses to restrict the lookup to.
    pub contracts: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransfersQuery {
    pub start_block: Option<u64>,
    pub end_block: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct NetworkStatus {
    #[serde(flatten)]
    pub network: EvmNetwork,
    pub connected: bool,
    pub enhanced: bool,
}

// Internal helper that parses the optional `contracts` filter.
fn parse_contract_filter(raw: Option<&str>) -> Result<Option<Vec<String>>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let contracts = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize_evm_address)
        .collect::<Result<Vec<_>>>()?;
    if contracts.is_empty() {
        return Ok(None);
    }
    Ok(Some(contracts))
}

fn validate_block_range(start_block: u64, end_block: Option<u64>) -> Result<()> {
    match end_block {
        Some(end) if end < start_block => Err(AppError::BadRequest(format!(
            "end_block {} is before start_block {}",
            end, start_block
        ))),
        _ => Ok(()),
    }
}

/// GET /api/v1/networks
pub async fn list_networks(State(state): State<AppState>) -> Json<ApiResponse<Vec<NetworkStatus>>> {
    let statuses = SUPPORTED_NETWORKS
        .iter()
        .map(|network| {
            let connection = state.providers.connection_for(network);
            NetworkStatus {
                network: *network,
                connected: connection.is_some(),
                enhanced: connection
                    .map(|c| c.supports_enhanced_lookup())
                    .unwrap_or(false),
            }
        })
        .collect();

    Json(ApiResponse::success(statuses))
}

/// GET /api/v1/networks/{chain_id}/accounts/{address}/balances
pub async fn get_balances(
    State(state): State<AppState>,
    Path((chain_id, address)): Path<(String, String)>,
    Query(query): Query<BalancesQuery>,
) -> Result<Json<ApiResponse<Vec<SmartContractAmount>>>> {
    let network = require_network(&chain_id)?;
    let address = AddressOnNetwork::new(normalize_evm_address(&address)?, network);
    let contracts = parse_contract_filter(query.contracts.as_deref())?;

    let balances = state
        .assets
        .get_token_balances(&address, contracts.as_deref())
        .await;

    Ok(Json(ApiResponse::success(balances)))
}

/// GET /api/v1/networks/{chain_id}/tokens/{contract}/metadata
pub async fn get_token_metadata(
    State(state): State<AppState>,
    Path((chain_id, contract)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Option<SmartContractFungibleAsset>>>> {
    let network = require_network(&chain_id)?;
    let contract = SmartContract::new(normalize_evm_address(&contract)?, network);

    let metadata = state.assets.get_token_metadata(&contract).await?;

    Ok(Json(ApiResponse::success(metadata)))
}

/// GET /api/v1/networks/{chain_id}/accounts/{address}/transfers
pub async fn get_transfers(
    State(state): State<AppState>,
    Path((chain_id, address)): Path<(String, String)>,
    Query(query): Query<TransfersQuery>,
) -> Result<Json<ApiResponse<Vec<AssetTransfer>>>> {
    let network = require_network(&chain_id)?;
    let address = AddressOnNetwork::new(normalize_evm_address(&address)?, network);
    let start_block = query.start_block.unwrap_or(0);
    validate_block_range(start_block, query.end_block)?;

    let transfers = state
        .assets
        .get_asset_transfers(&address, start_block, query.end_block)
        .await?;

    Ok(Json(ApiResponse::success(transfers)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_filter_parsing() {
        assert_eq!(parse_contract_filter(None).expect("ok"), None);
        assert_eq!(parse_contract_filter(Some(" , ")).expect("ok"), None);

        let parsed = parse_contract_filter(Some(
            "0xE3709cde1eaFF5297035306C3D42E3cC8812ffa9, 0x00000000000000000000000000000000000000cd",
        ))
        .expect("ok")
        .expect("some");
        assert_eq!(
            parsed,
            vec![
                "0xe3709cde1eaff5297035306c3d42e3cc8812ffa9".to_string(),
                "0x00000000000000000000000000000000000000cd".to_string(),
            ]
        );

        assert!(matches!(
            parse_contract_filter(Some("0xE3709cde1eaFF5297035306C3D42E3cC8812ffa9,0x12")),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn block_range_must_not_be_inverted() {
        assert!(validate_block_range(100, Some(200)).is_ok());
        assert!(validate_block_range(100, Some(100)).is_ok());
        assert!(validate_block_range(100, None).is_ok());
        assert!(matches!(
            validate_block_range(200, Some(100)),
            Err(AppError::BadRequest(_))
        ));
    }
}
