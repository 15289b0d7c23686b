use ethers::providers::{Http, Provider};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

use crate::{
    config::Config,
    constants::{alchemy_endpoint_for, ALCHEMY_HOST_SUFFIXES, SUPPORTED_NETWORKS},
    error::{AppError, Result},
    models::EvmNetwork,
};

/// Whether a transport can answer enhanced indexer queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCapability {
    Enhanced,
    Plain,
}

impl TransportCapability {
    /// Tags endpoints served by a known indexing provider as enhanced.
    pub fn detect(url: &Url) -> Self {
        let Some(host) = url.host_str() else {
            return TransportCapability::Plain;
        };
        let host = host.to_ascii_lowercase();
        let enhanced = ALCHEMY_HOST_SUFFIXES
            .iter()
            .any(|suffix| host == *suffix || host.ends_with(&format!(".{suffix}")));
        if enhanced {
            TransportCapability::Enhanced
        } else {
            TransportCapability::Plain
        }
    }

    pub fn is_enhanced(self) -> bool {
        matches!(self, TransportCapability::Enhanced)
    }
}

/// One node endpoint. The capability is fixed when the transport is built.
#[derive(Debug, Clone)]
pub struct Transport {
    url: Url,
    capability: TransportCapability,
    provider: Arc<Provider<Http>>,
}

impl Transport {
    pub fn new(raw_url: &str) -> Result<Self> {
        let url = parse_rpc_url(raw_url)?;
        let capability = TransportCapability::detect(&url);
        Self::build(url, capability)
    }

    pub fn with_capability(raw_url: &str, capability: TransportCapability) -> Result<Self> {
        Self::build(parse_rpc_url(raw_url)?, capability)
    }

    fn build(url: Url, capability: TransportCapability) -> Result<Self> {
        let provider = Provider::<Http>::try_from(url.as_str())
            .map_err(|e| AppError::Internal(format!("Invalid RPC URL: {}", e)))?;
        Ok(Self {
            url,
            capability,
            provider: Arc::new(provider),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn capability(&self) -> TransportCapability {
        self.capability
    }

    pub fn provider(&self) -> Arc<Provider<Http>> {
        self.provider.clone()
    }

    /// Host only; endpoint paths may carry API keys.
    pub fn label(&self) -> &str {
        self.url.host_str().unwrap_or("unknown-host")
    }
}

fn parse_rpc_url(raw_url: &str) -> Result<Url> {
    Url::parse(raw_url.trim())
        .map_err(|e| AppError::Internal(format!("Invalid RPC URL: {}", e)))
}

/// Serial fallback over the transports of one network. Callers read the
/// current transport; transport collaborators call `fail_over` after a fault.
#[derive(Debug)]
pub struct ChainConnection {
    network: EvmNetwork,
    transports: Vec<Transport>,
    active: AtomicUsize,
}

impl ChainConnection {
    pub fn new(network: EvmNetwork, transports: Vec<Transport>) -> Result<Self> {
        if transports.is_empty() {
            return Err(AppError::Internal(format!(
                "No transports configured for {}",
                network
            )));
        }
        Ok(Self {
            network,
            transports,
            active: AtomicUsize::new(0),
        })
    }

    pub fn network(&self) -> &EvmNetwork {
        &self.network
    }

    pub fn current_transport(&self) -> &Transport {
        let index = self.active.load(Ordering::Acquire) % self.transports.len();
        &self.transports[index]
    }

    pub fn supports_enhanced_lookup(&self) -> bool {
        self.current_transport().capability().is_enhanced()
    }

    pub fn transport_count(&self) -> usize {
        self.transports.len()
    }

    /// Moves to the next transport, wrapping around. Returns false when there
    /// is nothing to switch to.
    pub fn fail_over(&self) -> bool {
        if self.transports.len() < 2 {
            return false;
        }
        let len = self.transports.len();
        let previous = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some((current + 1) % len)
            })
            .unwrap_or_default();
        tracing::warn!(
            "{} failing over from {} to {}",
            self.network,
            self.transports[previous % len].label(),
            self.current_transport().label()
        );
        true
    }
}

/// Lookup of the current best connection for a network.
pub trait ConnectionProvider: Send + Sync {
    fn connection_for(&self, network: &EvmNetwork) -> Option<Arc<ChainConnection>>;
}

/// Connections per chain id, built once at startup.
#[derive(Debug, Default)]
pub struct ProviderTracker {
    connections: HashMap<String, Arc<ChainConnection>>,
}

impl ProviderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut tracker = Self::new();

        for network in SUPPORTED_NETWORKS.iter() {
            let mut transports = Vec::new();

            if let Some(key) = config.alchemy_api_key.as_deref() {
                if let Some(endpoint) = alchemy_endpoint_for(network, key) {
                    transports.push(Transport::with_capability(
                        &endpoint,
                        TransportCapability::Enhanced,
                    )?);
                }
            }
            if let Some(urls) = config.rpc_urls.get(network.chain_id) {
                for raw in urls {
                    transports.push(Transport::new(raw)?);
                }
            }

            if transports.is_empty() {
                tracing::debug!("{} has no configured transports", network);
                continue;
            }

            let connection = ChainConnection::new(*network, transports)?;
            tracing::info!(
                "{} connected via {} transport(s), enhanced={}",
                network,
                connection.transport_count(),
                connection.supports_enhanced_lookup()
            );
            tracker.register(connection);
        }

        Ok(tracker)
    }

    pub fn register(&mut self, connection: ChainConnection) {
        self.connections
            .insert(connection.network().chain_id.to_string(), Arc::new(connection));
    }

    pub fn is_connected(&self, network: &EvmNetwork) -> bool {
        self.connections.contains_key(network.chain_id)
    }

    pub fn connected_networks(&self) -> Vec<EvmNetwork> {
        SUPPORTED_NETWORKS
            .iter()
            .filter(|network| self.is_connected(network))
            .copied()
            .collect()
    }
}

impl ConnectionProvider for ProviderTracker {
    fn connection_for(&self, network: &EvmNetwork) -> Option<Arc<ChainConnection>> {
        self.connections.get(network.chain_id).cloned()
    }
}
