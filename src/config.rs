use serde::Deserialize;
use std::collections::HashMap;
use std::env;

use crate::{
    constants::{DEFAULT_RPC_TIMEOUT_SECS, SUPPORTED_NETWORKS},
    models::EvmNetwork,
    utils::is_flag_value_enabled,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Providers
    pub alchemy_api_key: Option<String>,
    /// Plain RPC endpoints keyed by chain id, in fallback order.
    pub rpc_urls: HashMap<String, Vec<String>>,
    pub rpc_timeout_secs: u64,

    // Features
    pub use_mainnet_fork: bool,

    // CORS
    pub cors_allowed_origins: String,
}

/// Environment variable holding the comma separated RPC list of a network,
/// e.g. `ETHEREUM_RPC_URLS`.
pub fn rpc_urls_env_key(network: &EvmNetwork) -> String {
    format!("{}_RPC_URLS", network.name.to_ascii_uppercase())
}

fn split_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut rpc_urls = HashMap::new();
        for network in SUPPORTED_NETWORKS.iter() {
            if let Some(raw) = lookup(&rpc_urls_env_key(network)) {
                let urls = split_urls(&raw);
                if !urls.is_empty() {
                    rpc_urls.insert(network.chain_id.to_string(), urls);
                }
            }
        }

        Ok(Config {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()?,
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),

            alchemy_api_key: lookup("ALCHEMY_API_KEY")
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            rpc_urls,
            rpc_timeout_secs: lookup("RPC_TIMEOUT_SECS")
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or(DEFAULT_RPC_TIMEOUT_SECS),

            use_mainnet_fork: lookup("USE_MAINNET_FORK")
                .map(|value| is_flag_value_enabled(&value))
                .unwrap_or(false),

            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc_timeout_secs == 0 {
            anyhow::bail!("RPC_TIMEOUT_SECS must be greater than zero");
        }
        for (chain_id, urls) in &self.rpc_urls {
            for raw in urls {
                if let Err(e) = url::Url::parse(raw) {
                    anyhow::bail!("Invalid RPC URL for chain {}: {} ({})", chain_id, raw, e);
                }
            }
        }

        if self.alchemy_api_key.is_none() {
            tracing::warn!("ALCHEMY_API_KEY not set; enhanced asset lookups are disabled");
        }
        if self.alchemy_api_key.is_none() && self.rpc_urls.is_empty() {
            tracing::warn!("No RPC endpoints configured; every network will resolve to no data");
        }
        if self.use_mainnet_fork && self.environment == "production" {
            tracing::warn!("USE_MAINNET_FORK is enabled in production");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ETHEREUM, POLYGON};

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).expect("defaults parse");
        assert_eq!(config.port, 3000);
        assert_eq!(config.rpc_timeout_secs, DEFAULT_RPC_TIMEOUT_SECS);
        assert!(!config.use_mainnet_fork);
        assert!(config.alchemy_api_key.is_none());
        assert!(config.rpc_urls.is_empty());
    }

    #[test]
    fn rpc_lists_are_split_per_network() {
        let config = config_from(&[
            (
                "ETHEREUM_RPC_URLS",
                "https://rpc-a.example, ,https://rpc-b.example",
            ),
            ("POLYGON_RPC_URLS", "https://polygon.example"),
            ("USE_MAINNET_FORK", "yes"),
            ("ALCHEMY_API_KEY", "  "),
        ])
        .expect("config parses");

        assert_eq!(
            config.rpc_urls.get(ETHEREUM.chain_id),
            Some(&vec![
                "https://rpc-a.example".to_string(),
                "https://rpc-b.example".to_string()
            ])
        );
        assert_eq!(config.rpc_urls.get(POLYGON.chain_id).map(Vec::len), Some(1));
        assert!(config.use_mainnet_fork);
        assert!(config.alchemy_api_key.is_none());
        assert_eq!(rpc_urls_env_key(&POLYGON), "POLYGON_RPC_URLS");
    }

    #[test]
    fn validate_rejects_bad_urls_and_zero_timeout() {
        let config = config_from(&[("ETHEREUM_RPC_URLS", "not a url")]).expect("parses");
        assert!(config.validate().is_err());

        let config = config_from(&[("RPC_TIMEOUT_SECS", "0")]).expect("parses");
        assert!(config.validate().is_err());

        assert!(config_from(&[("PORT", "http")]).is_err());
    }
}
