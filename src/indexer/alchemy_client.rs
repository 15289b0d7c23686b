use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashSet;
use std::time::Duration;

use super::EnhancedIndexer;
use crate::{
    constants::{ALCHEMY_DATA_SOURCE, ALCHEMY_DEFAULT_TOKEN_SPEC, ALCHEMY_TRANSFER_CATEGORIES},
    error::{AppError, Result},
    models::{
        AddressOnNetwork, AssetTransfer, EvmNetwork, SmartContract, SmartContractAmount,
        SmartContractFungibleAsset, TransferredAsset,
    },
    services::connections::Transport,
    utils::{parse_hex_quantity, parse_hex_u64, to_hex_quantity},
};

const MAX_TRANSFER_PAGES: usize = 10;

// Alchemy's `uniqueId` names one transfer (tx hash plus log or trace
// position), so it is the only safe de-duplication key.
type KeyedTransfer = (Option<String>, AssetTransfer);

fn rpc_request(method: &str, params: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferDirection {
    Outgoing,
    Incoming,
}

fn asset_transfers_params(
    address: &str,
    direction: TransferDirection,
    start_block: u64,
    end_block: Option<u64>,
    page_key: Option<&str>,
) -> serde_json::Value {
    let mut params = serde_json::json!({
        "fromBlock": to_hex_quantity(start_block),
        "toBlock": end_block.map(to_hex_quantity).unwrap_or_else(|| "latest".to_string()),
        "category": ALCHEMY_TRANSFER_CATEGORIES,
        "excludeZeroValue": false,
        "withMetadata": true,
    });
    let address_field = match direction {
        TransferDirection::Outgoing => "fromAddress",
        TransferDirection::Incoming => "toAddress",
    };
    params[address_field] = serde_json::Value::String(address.to_string());
    if let Some(key) = page_key {
        params["pageKey"] = serde_json::Value::String(key.to_string());
    }
    params
}

/// Alchemy enhanced API client. Queries go to the transport's own endpoint,
/// so the network is whatever that endpoint serves.
#[derive(Debug, Clone)]
pub struct AlchemyClient {
    client: reqwest::Client,
}

impl AlchemyClient {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client error: {}", e)))?;
        Ok(Self { client })
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        transport: &Transport,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        let request = rpc_request(method, params);

        let response = self
            .client
            .post(transport.url().as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::ExternalAPI(format!(
                "{} on {} returned HTTP {}",
                method,
                transport.label(),
                status
            )));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| AppError::ExternalAPI(e.without_url().to_string()))?;

        body.into_result(method)
    }

    async fn transfers_in_direction(
        &self,
        transport: &Transport,
        address: &AddressOnNetwork,
        direction: TransferDirection,
        start_block: u64,
        end_block: Option<u64>,
    ) -> Result<Vec<KeyedTransfer>> {
        let mut transfers = Vec::new();
        let mut page_key: Option<String> = None;

        for _ in 0..MAX_TRANSFER_PAGES {
            let params = asset_transfers_params(
                &address.address,
                direction,
                start_block,
                end_block,
                page_key.as_deref(),
            );
            let page: AssetTransfersResponse = self
                .rpc_call(transport, "alchemy_getAssetTransfers", serde_json::json!([params]))
                .await?;

            transfers.extend(page.transfers.into_iter().filter_map(|raw| {
                let unique_id = raw.unique_id.clone();
                transfer_from_raw(raw, &address.network).map(|transfer| (unique_id, transfer))
            }));

            match page.page_key {
                Some(next) if !next.is_empty() => page_key = Some(next),
                _ => return Ok(transfers),
            }
        }

        Err(AppError::ExternalAPI(format!(
            "alchemy_getAssetTransfers for {} on {} truncated after {} pages",
            address.address, address.network, MAX_TRANSFER_PAGES
        )))
    }
}

#[async_trait]
impl EnhancedIndexer for AlchemyClient {
    async fn token_balances(
        &self,
        transport: &Transport,
        address: &AddressOnNetwork,
        contract_addresses: Option<&[String]>,
    ) -> Result<Vec<SmartContractAmount>> {
        let token_spec = match contract_addresses {
            Some(contracts) => serde_json::json!(contracts),
            None => serde_json::json!(ALCHEMY_DEFAULT_TOKEN_SPEC),
        };
        let response: TokenBalancesResponse = self
            .rpc_call(
                transport,
                "alchemy_getTokenBalances",
                serde_json::json!([address.address, token_spec]),
            )
            .await?;

        balances_from_response(response, &address.network)
    }

    async fn token_metadata(
        &self,
        transport: &Transport,
        contract: &SmartContract,
    ) -> Result<SmartContractFungibleAsset> {
        let response: TokenMetadataResponse = self
            .rpc_call(
                transport,
                "alchemy_getTokenMetadata",
                serde_json::json!([contract.contract_address]),
            )
            .await?;

        metadata_from_response(response, contract)
    }

    async fn asset_transfers(
        &self,
        transport: &Transport,
        address: &AddressOnNetwork,
        start_block: u64,
        end_block: Option<u64>,
    ) -> Result<Vec<AssetTransfer>> {
        let (outgoing, incoming) = futures_util::future::try_join(
            self.transfers_in_direction(
                transport,
                address,
                TransferDirection::Outgoing,
                start_block,
                end_block,
            ),
            self.transfers_in_direction(
                transport,
                address,
                TransferDirection::Incoming,
                start_block,
                end_block,
            ),
        )
        .await?;

        Ok(merge_transfers(outgoing, incoming))
    }
}

fn balances_from_response(
    response: TokenBalancesResponse,
    network: &EvmNetwork,
) -> Result<Vec<SmartContractAmount>> {
    let mut balances = Vec::with_capacity(response.token_balances.len());
    for entry in response.token_balances {
        if entry.error.as_ref().is_some_and(|e| !e.is_null()) {
            continue;
        }
        let Some(raw_balance) = entry.token_balance else {
            continue;
        };
        balances.push(SmartContractAmount {
            smart_contract: SmartContract::new(entry.contract_address, *network),
            amount: parse_hex_quantity(&raw_balance)?,
        });
    }
    Ok(balances)
}

fn metadata_from_response(
    response: TokenMetadataResponse,
    contract: &SmartContract,
) -> Result<SmartContractFungibleAsset> {
    let (Some(name), Some(symbol), Some(decimals)) =
        (response.name, response.symbol, response.decimals)
    else {
        return Err(AppError::ExternalAPI(format!(
            "Incomplete token metadata for {}",
            contract.contract_address
        )));
    };

    Ok(SmartContractFungibleAsset {
        name,
        symbol,
        decimals,
        logo_url: response.logo.filter(|logo| !logo.is_empty()),
        contract_address: contract.contract_address.clone(),
        home_network: contract.home_network,
    })
}

fn transfer_from_raw(raw: RawTransfer, network: &EvmNetwork) -> Option<AssetTransfer> {
    let value = raw.raw_contract.value.as_deref()?;
    let amount = parse_hex_quantity(value).ok()?;
    let block_height = parse_hex_u64(&raw.block_num).ok()?;

    let asset = match raw.raw_contract.address {
        None => TransferredAsset::Native(network.base_asset),
        Some(contract_address) => {
            // Tokens without a symbol or decimals cannot be rendered.
            let decimals = parse_hex_u64(raw.raw_contract.decimal.as_deref()?).ok()?;
            TransferredAsset::Fungible {
                symbol: raw.asset?,
                decimals: u8::try_from(decimals).ok()?,
                contract_address,
                home_network: *network,
            }
        }
    };

    let block_timestamp = raw
        .metadata
        .and_then(|m| m.block_timestamp)
        .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Some(AssetTransfer {
        network: *network,
        asset,
        amount,
        from: raw.from,
        to: raw.to,
        tx_hash: raw.hash,
        block_height,
        block_timestamp,
        data_source: ALCHEMY_DATA_SOURCE.to_string(),
    })
}

// Self-transfers come back from both directional queries. Entries without
// a `uniqueId` are kept as they are.
fn merge_transfers(outgoing: Vec<KeyedTransfer>, incoming: Vec<KeyedTransfer>) -> Vec<AssetTransfer> {
    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(outgoing.len() + incoming.len());
    for (unique_id, transfer) in outgoing.into_iter().chain(incoming) {
        if let Some(unique_id) = unique_id {
            if !seen.insert(unique_id) {
                continue;
            }
        }
        merged.push(transfer);
    }
    merged.sort_by_key(|transfer| transfer.block_height);
    merged
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

impl<T> RpcResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        if let Some(err) = self.error {
            return Err(AppError::ExternalAPI(format!(
                "{} failed ({}): {}",
                method, err.code, err.message
            )));
        }
        self.result
            .ok_or_else(|| AppError::ExternalAPI(format!("{} returned no result", method)))
    }
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalancesResponse {
    token_balances: Vec<TokenBalanceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalanceEntry {
    contract_address: String,
    token_balance: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TokenMetadataResponse {
    name: Option<String>,
    symbol: Option<String>,
    decimals: Option<u8>,
    logo: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetTransfersResponse {
    transfers: Vec<RawTransfer>,
    page_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransfer {
    #[serde(default)]
    unique_id: Option<String>,
    block_num: String,
    hash: String,
    from: String,
    to: Option<String>,
    asset: Option<String>,
    raw_contract: RawContract,
    metadata: Option<TransferMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawContract {
    value: Option<String>,
    address: Option<String>,
    decimal: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferMetadata {
    block_timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ETH, ETHEREUM, POLYGON};
    use crate::test_support::{rpc_error, rpc_result, RpcStub};
    use ethers::types::U256;

    fn raw_transfer(value: serde_json::Value) -> RawTransfer {
        serde_json::from_value(value).expect("raw transfer parses")
    }

    #[test]
    fn rpc_request_sets_method_and_id() {
        let req = rpc_request("alchemy_getTokenBalances", serde_json::json!([]));
        assert_eq!(
            req.get("method").and_then(|v| v.as_str()),
            Some("alchemy_getTokenBalances")
        );
        assert_eq!(req.get("id").and_then(|v| v.as_i64()), Some(1));
    }

    #[test]
    fn transfer_params_encode_range_and_direction() {
        let params = asset_transfers_params("0xabc", TransferDirection::Incoming, 100, Some(200), None);
        assert_eq!(params["fromBlock"], "0x64");
        assert_eq!(params["toBlock"], "0xc8");
        assert_eq!(params["toAddress"], "0xabc");
        assert!(params.get("fromAddress").is_none());

        let params =
            asset_transfers_params("0xabc", TransferDirection::Outgoing, 0, None, Some("next"));
        assert_eq!(params["toBlock"], "latest");
        assert_eq!(params["fromAddress"], "0xabc");
        assert_eq!(params["pageKey"], "next");
    }

    #[test]
    fn rpc_error_object_becomes_external_api_error() {
        let body: RpcResponse<TokenMetadataResponse> = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32601, "message": "Method not found" }
        }))
        .expect("parses");
        let err = body.into_result("alchemy_getTokenMetadata").unwrap_err();
        assert!(matches!(err, AppError::ExternalAPI(msg) if msg.contains("Method not found")));
    }

    #[test]
    fn balances_skip_errors_and_tag_request_network() {
        let response: TokenBalancesResponse = serde_json::from_value(serde_json::json!({
            "address": "0xowner",
            "tokenBalances": [
                { "contractAddress": "0xaaa", "tokenBalance": "0x0de0b6b3a7640000", "error": null },
                { "contractAddress": "0xbbb", "tokenBalance": null, "error": null },
                { "contractAddress": "0xccc", "tokenBalance": "0x1", "error": "execution reverted" }
            ]
        }))
        .expect("parses");

        let balances = balances_from_response(response, &POLYGON).expect("balances");
        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].smart_contract.contract_address, "0xaaa");
        assert_eq!(balances[0].smart_contract.home_network, POLYGON);
        assert_eq!(balances[0].amount, U256::exp10(18));
    }

    #[test]
    fn incomplete_metadata_is_an_error() {
        let contract = SmartContract::new("0xtoken", ETHEREUM);
        let response: TokenMetadataResponse = serde_json::from_value(serde_json::json!({
            "name": "Thing", "symbol": null, "decimals": 18, "logo": null
        }))
        .expect("parses");
        assert!(matches!(
            metadata_from_response(response, &contract),
            Err(AppError::ExternalAPI(_))
        ));

        let response: TokenMetadataResponse = serde_json::from_value(serde_json::json!({
            "name": "Thing", "symbol": "THG", "decimals": 6, "logo": ""
        }))
        .expect("parses");
        let asset = metadata_from_response(response, &contract).expect("complete");
        assert_eq!(asset.symbol, "THG");
        assert_eq!(asset.decimals, 6);
        assert_eq!(asset.logo_url, None);
        assert_eq!(asset.contract_address, contract.contract_address);
    }

    #[test]
    fn native_and_token_transfers_are_mapped() {
        let native = transfer_from_raw(
            raw_transfer(serde_json::json!({
                "blockNum": "0x96",
                "hash": "0xh1",
                "from": "0xfrom",
                "to": "0xto",
                "asset": "ETH",
                "category": "external",
                "rawContract": { "value": "0x5", "address": null, "decimal": "0x12" },
                "metadata": { "blockTimestamp": "2022-03-01T12:00:00.000Z" }
            })),
            &ETHEREUM,
        )
        .expect("native transfer");
        assert_eq!(native.asset, TransferredAsset::Native(ETH));
        assert_eq!(native.block_height, 150);
        assert_eq!(native.amount, U256::from(5u64));
        assert!(native.block_timestamp.is_some());
        assert_eq!(native.data_source, "alchemy");

        let token = transfer_from_raw(
            raw_transfer(serde_json::json!({
                "blockNum": "0x64",
                "hash": "0xh2",
                "from": "0xfrom",
                "to": null,
                "asset": "USDC",
                "category": "erc20",
                "rawContract": { "value": "0x0f4240", "address": "0xusdc", "decimal": "0x6" }
            })),
            &ETHEREUM,
        )
        .expect("token transfer");
        assert_eq!(token.asset.symbol(), "USDC");
        assert_eq!(token.asset.contract_address(), Some("0xusdc"));
        assert_eq!(token.to, None);
    }

    #[test]
    fn transfers_without_value_or_symbol_are_skipped() {
        let no_value = raw_transfer(serde_json::json!({
            "blockNum": "0x1", "hash": "0xh", "from": "0xf", "to": "0xt",
            "asset": "ETH", "category": "external",
            "rawContract": { "value": null, "address": null, "decimal": "0x12" }
        }));
        assert!(transfer_from_raw(no_value, &ETHEREUM).is_none());

        let no_symbol = raw_transfer(serde_json::json!({
            "blockNum": "0x1", "hash": "0xh", "from": "0xf", "to": "0xt",
            "asset": null, "category": "erc20",
            "rawContract": { "value": "0x1", "address": "0xtoken", "decimal": "0x12" }
        }));
        assert!(transfer_from_raw(no_symbol, &ETHEREUM).is_none());
    }

    fn native_transfer(hash: &str, block: u64) -> AssetTransfer {
        AssetTransfer {
            network: ETHEREUM,
            asset: TransferredAsset::Native(ETH),
            amount: U256::one(),
            from: "0xself".to_string(),
            to: Some("0xself".to_string()),
            tx_hash: hash.to_string(),
            block_height: block,
            block_timestamp: None,
            data_source: ALCHEMY_DATA_SOURCE.to_string(),
        }
    }

    fn keyed(unique_id: &str, hash: &str, block: u64) -> KeyedTransfer {
        (Some(unique_id.to_string()), native_transfer(hash, block))
    }

    #[test]
    fn merge_dedupes_self_transfers_and_sorts() {
        let merged = merge_transfers(
            vec![keyed("0xb:external", "0xb", 20), keyed("0xa:external", "0xa", 10)],
            vec![keyed("0xa:external", "0xa", 10), keyed("0xc:external", "0xc", 15)],
        );
        let hashes: Vec<&str> = merged.iter().map(|t| t.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0xa", "0xc", "0xb"]);
    }

    #[test]
    fn merge_keeps_identical_logs_with_distinct_ids() {
        // Same token, amount, parties and tx: two separate Transfer logs.
        let merged = merge_transfers(
            vec![keyed("0xd:log:3", "0xd", 30), keyed("0xd:log:4", "0xd", 30)],
            vec![keyed("0xd:log:4", "0xd", 30)],
        );
        assert_eq!(merged.len(), 2);

        let merged = merge_transfers(
            vec![(None, native_transfer("0xe", 40))],
            vec![(None, native_transfer("0xe", 40))],
        );
        assert_eq!(merged.len(), 2);
    }

    fn raw_json(unique_id: &str, hash: &str, block: u64) -> serde_json::Value {
        serde_json::json!({
            "uniqueId": unique_id,
            "blockNum": to_hex_quantity(block),
            "hash": hash,
            "from": "0xowner",
            "to": "0xowner",
            "asset": "ETH",
            "category": "external",
            "rawContract": { "value": "0x1", "address": null, "decimal": "0x12" }
        })
    }

    fn transfer_page(transfers: Vec<serde_json::Value>, page_key: Option<&str>) -> serde_json::Value {
        let mut page = serde_json::json!({ "transfers": transfers });
        if let Some(key) = page_key {
            page["pageKey"] = serde_json::Value::String(key.to_string());
        }
        page
    }

    fn owner() -> AddressOnNetwork {
        AddressOnNetwork::new("0xowner", ETHEREUM)
    }

    #[tokio::test]
    async fn transfers_follow_page_keys_in_both_directions() {
        let node = RpcStub::spawn(|request| {
            let params = &request["params"][0];
            let page = if params.get("fromAddress").is_some() {
                match params["pageKey"].as_str() {
                    None => transfer_page(vec![raw_json("0x1:external", "0x1", 5)], Some("second")),
                    Some("second") => transfer_page(vec![raw_json("0x2:external", "0x2", 9)], None),
                    Some(other) => panic!("unexpected page key {other}"),
                }
            } else {
                transfer_page(
                    vec![raw_json("0x2:external", "0x2", 9), raw_json("0x3:external", "0x3", 7)],
                    None,
                )
            };
            rpc_result(request, page)
        })
        .await;
        let client = AlchemyClient::new(5).expect("client");
        let transport = Transport::new(node.url()).expect("transport");

        let transfers = client
            .asset_transfers(&transport, &owner(), 0, None)
            .await
            .expect("transfers");

        let hashes: Vec<&str> = transfers.iter().map(|t| t.tx_hash.as_str()).collect();
        assert_eq!(hashes, vec!["0x1", "0x3", "0x2"]);
        assert_eq!(node.calls(), 3);
    }

    #[tokio::test]
    async fn endless_page_keys_are_reported_as_truncated() {
        let node = RpcStub::spawn(|request| {
            rpc_result(
                request,
                transfer_page(vec![raw_json("0x1:external", "0x1", 5)], Some("more")),
            )
        })
        .await;
        let client = AlchemyClient::new(5).expect("client");
        let transport = Transport::new(node.url()).expect("transport");

        let err = client
            .asset_transfers(&transport, &owner(), 0, None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ExternalAPI(msg) if msg.contains("truncated after 10 pages")));
    }

    #[tokio::test]
    async fn http_error_status_is_external_api_error() {
        let node = RpcStub::spawn(|_| {
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "message": "upstream down" }),
            )
        })
        .await;
        let client = AlchemyClient::new(5).expect("client");
        let transport = Transport::new(node.url()).expect("transport");

        let err = client
            .token_metadata(&transport, &SmartContract::new("0xtoken", ETHEREUM))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ExternalAPI(msg) if msg.contains("HTTP 500")));
    }

    #[tokio::test]
    async fn rpc_error_body_is_external_api_error() {
        let node = RpcStub::spawn(|request| rpc_error(request, -32602, "invalid contract")).await;
        let client = AlchemyClient::new(5).expect("client");
        let transport = Transport::new(node.url()).expect("transport");

        let err = client
            .token_balances(&transport, &owner(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ExternalAPI(msg) if msg.contains("invalid contract")));
    }

    #[tokio::test]
    async fn balances_are_read_from_node_answer() {
        let node = RpcStub::spawn(|request| {
            assert_eq!(request["method"], "alchemy_getTokenBalances");
            assert_eq!(request["params"][1], "erc20");
            rpc_result(
                request,
                serde_json::json!({
                    "address": "0xowner",
                    "tokenBalances": [{ "contractAddress": "0xaaa", "tokenBalance": "0x2a", "error": null }]
                }),
            )
        })
        .await;
        let client = AlchemyClient::new(5).expect("client");
        let transport = Transport::new(node.url()).expect("transport");

        let balances = client
            .token_balances(&transport, &owner(), None)
            .await
            .expect("balances");

        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].amount, U256::from(42u64));
    }
}
