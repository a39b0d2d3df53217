//! Client configuration: bridge relay, node endpoints, polling bounds

use std::time::Duration;

/// Configuration for the bridge relay and node endpoints.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bridge relay base URL (pairing + request/response transport)
    pub bridge_url: String,
    /// Node base URL (read + write endpoints)
    pub algod_url: String,
    /// Genesis id used when the node's parameters omit one
    pub genesis_id: String,
    /// Flat fee (micro-units) used when the node's parameters omit a minimum
    pub min_fee: u64,
    /// How long to wait for the wallet to approve a new pairing
    pub pairing_timeout: Duration,
    /// Interval between polls for a signing response
    pub response_poll_interval: Duration,
    /// Maximum polls for a signing response before giving up
    pub response_poll_attempts: u32,
    /// Rounds to wait for a submitted group before timing out
    pub max_confirm_rounds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Mainnet configuration (default)
    pub fn new() -> Self {
        Self {
            bridge_url: "https://bridge.walletconnect.org".to_string(),
            algod_url: "https://algoexplorerapi.io".to_string(),
            genesis_id: "mainnet-v1.0".to_string(),
            min_fee: 1000,
            pairing_timeout: Duration::from_secs(120),
            response_poll_interval: Duration::from_secs(2),
            response_poll_attempts: 90,
            max_confirm_rounds: 10,
        }
    }

    /// Alias for new() - mainnet configuration
    pub fn mainnet() -> Self {
        Self::new()
    }

    /// Create custom configuration with a specific bridge URL
    pub fn with_bridge_url(mut self, bridge_url: impl Into<String>) -> Self {
        self.bridge_url = bridge_url.into();
        self
    }

    /// Set the node endpoint URL
    pub fn with_algod_url(mut self, algod_url: impl Into<String>) -> Self {
        self.algod_url = algod_url.into();
        self
    }

    /// Set the genesis id
    pub fn with_genesis_id(mut self, genesis_id: impl Into<String>) -> Self {
        self.genesis_id = genesis_id.into();
        self
    }
}
