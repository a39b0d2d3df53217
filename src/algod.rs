//! Node endpoint client: read (accounts, params, applications) and
//! write (raw submission, pending status) surfaces

use crate::config::ClientConfig;
use crate::error::{Result, WalletError};
use crate::transaction::{SuggestedParams, TxId};
use serde::Deserialize;
use std::str::FromStr;

/// Account asset holding for the balance display collaborator.
#[derive(Debug, Clone)]
pub struct AssetData {
    pub id: u64,
    pub amount: u64,
    pub creator: String,
    pub frozen: bool,
    pub decimals: u32,
    pub name: Option<String>,
    pub unit_name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    amount: u64,
    #[serde(default)]
    assets: Vec<AccountAsset>,
}

#[derive(Debug, Deserialize)]
struct AccountAsset {
    #[serde(rename = "asset-id")]
    asset_id: u64,
    amount: u64,
    #[serde(default)]
    creator: String,
    #[serde(rename = "is-frozen", default)]
    frozen: bool,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    params: AssetParams,
}

#[derive(Debug, Deserialize)]
struct AssetParams {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "unit-name", default)]
    unit_name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    decimals: u32,
}

#[derive(Debug, Deserialize)]
struct TransactionParamsResponse {
    #[serde(rename = "min-fee", default)]
    min_fee: Option<u64>,
    #[serde(rename = "last-round")]
    last_round: u64,
    #[serde(rename = "genesis-id", default)]
    genesis_id: Option<String>,
}

/// Application state entry (key/value as reported by the node).
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationInfo {
    pub id: u64,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "txId")]
    tx_id: String,
}

/// Confirmation status of a pending transaction.
#[derive(Debug, Clone, Deserialize)]
pub struct PendingInfo {
    #[serde(rename = "confirmed-round", default)]
    pub confirmed_round: Option<u64>,
    #[serde(rename = "pool-error", default)]
    pub pool_error: String,
}

#[derive(Debug, Deserialize)]
struct NodeStatus {
    #[serde(rename = "last-round")]
    last_round: u64,
}

/// HTTP client for the node's read and write endpoints.
#[derive(Debug, Clone)]
pub struct AlgodClient {
    base: String,
    client: reqwest::Client,
    genesis_id: String,
    min_fee: u64,
}

impl AlgodClient {
    /// Create a client for the configured node endpoint.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            base: config.algod_url.clone(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .use_rustls_tls()
                .build()
                .expect("reqwest client"),
            genesis_id: config.genesis_id.clone(),
            min_fee: config.min_fee,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WalletError::Endpoint(format!(
                "GET {} failed: {} - {}",
                path, status, body
            )));
        }

        Ok(resp.json().await?)
    }

    /// Fetch fresh sequencing and fee parameters. Fields the node does
    /// not report fall back to the configured defaults.
    pub async fn suggested_params(&self) -> Result<SuggestedParams> {
        let params: TransactionParamsResponse = self.get_json("/v2/transactions/params").await?;
        Ok(self.fill_params(params))
    }

    fn fill_params(&self, params: TransactionParamsResponse) -> SuggestedParams {
        SuggestedParams {
            fee: params.min_fee.unwrap_or(self.min_fee),
            first_valid: params.last_round,
            last_valid: params.last_round + 1000,
            genesis_id: params.genesis_id.unwrap_or_else(|| self.genesis_id.clone()),
        }
    }

    /// Account balance and asset holdings, sorted by asset id with the
    /// native balance prepended. Per-asset parameter lookups that fail
    /// leave that asset's display fields empty rather than aborting.
    pub async fn account_assets(&self, address: &str) -> Result<Vec<AssetData>> {
        let account: AccountResponse = self.get_json(&format!("/v2/accounts/{}", address)).await?;

        let mut assets: Vec<AssetData> = account
            .assets
            .into_iter()
            .map(|a| AssetData {
                id: a.asset_id,
                amount: a.amount,
                creator: a.creator,
                frozen: a.frozen,
                decimals: 0,
                name: None,
                unit_name: None,
                url: None,
            })
            .collect();
        assets.sort_by_key(|a| a.id);

        for asset in &mut assets {
            match self
                .get_json::<AssetResponse>(&format!("/v2/assets/{}", asset.id))
                .await
            {
                Ok(info) => {
                    asset.name = info.params.name;
                    asset.unit_name = info.params.unit_name;
                    asset.url = info.params.url;
                    asset.decimals = info.params.decimals;
                }
                Err(e) => {
                    tracing::warn!("asset {} params lookup failed: {}", asset.id, e);
                }
            }
        }

        assets.insert(
            0,
            AssetData {
                id: 0,
                amount: account.amount,
                creator: String::new(),
                frozen: false,
                decimals: 6,
                name: Some("Algo".to_string()),
                unit_name: Some("Algo".to_string()),
                url: None,
            },
        );

        Ok(assets)
    }

    /// Application state lookup by numeric identifier.
    pub async fn application_info(&self, app_id: u64) -> Result<ApplicationInfo> {
        self.get_json(&format!("/v2/applications/{}", app_id)).await
    }
}

/// Write-endpoint surface the submission tracker drives.
///
/// [`AlgodClient`] is the production implementation; tests script one
/// instead of standing up a node.
pub trait SubmitEndpoint: Clone + Send + Sync + 'static {
    /// Submit the concatenated raw signed transactions of one group.
    fn submit_raw(&self, blob: Vec<u8>) -> impl std::future::Future<Output = Result<TxId>> + Send;

    /// Pending-pool status for a transaction id.
    fn pending_info(
        &self,
        tx_id: &TxId,
    ) -> impl std::future::Future<Output = Result<PendingInfo>> + Send;

    /// Current round at the node's tip.
    fn current_round(&self) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Suspend until the node reports a round after the given one.
    fn wait_for_round_after(&self, round: u64)
        -> impl std::future::Future<Output = Result<u64>> + Send;
}

impl SubmitEndpoint for AlgodClient {
    async fn submit_raw(&self, blob: Vec<u8>) -> Result<TxId> {
        let url = format!("{}/v2/transactions", self.base);
        let resp = self
            .client
            .post(&url)
            .header("Content-Type", "application/x-binary")
            .body(blob)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WalletError::PoolRejected {
                reason: format!("{} - {}", status, body),
            });
        }

        let submit: SubmitResponse = resp.json().await?;
        TxId::from_str(&submit.tx_id)
    }

    async fn pending_info(&self, tx_id: &TxId) -> Result<PendingInfo> {
        self.get_json(&format!("/v2/transactions/pending/{}", tx_id))
            .await
    }

    async fn current_round(&self) -> Result<u64> {
        let status: NodeStatus = self.get_json("/v2/status").await?;
        Ok(status.last_round)
    }

    async fn wait_for_round_after(&self, round: u64) -> Result<u64> {
        let status: NodeStatus = self
            .get_json(&format!("/v2/status/wait-for-block-after/{}", round))
            .await?;
        Ok(status.last_round)
    }
}
