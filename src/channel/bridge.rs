//! HTTP bridge relay channel
//!
//! Carries the pairing to a real remote wallet through a relay: the
//! client posts envelopes under a session topic and polls for the
//! wallet's side of the exchange.

use super::{Pairing, SessionEvent, SignRequest, SignResponse, SignerChannel};
use crate::config::ClientConfig;
use crate::error::{Result, WalletError};
use crate::transaction::Address;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize)]
struct CreatePairingRequest<'a> {
    topic: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatePairingResponse {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct PairingStatusResponse {
    active: bool,
    #[serde(default)]
    accounts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    state: String,
    #[serde(default)]
    response: Option<SignResponse>,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<WireEvent>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    accounts: Vec<String>,
}

/// Relay-backed signer channel.
pub struct BridgeChannel {
    base: String,
    topic: String,
    client: reqwest::Client,
    poll_interval: Duration,
    poll_attempts: u32,
}

impl BridgeChannel {
    /// Create a channel with a fresh session topic.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .use_rustls_tls()
            .build()?;

        Ok(Self {
            base: config.bridge_url.clone(),
            topic: new_topic(),
            client,
            poll_interval: config.response_poll_interval,
            poll_attempts: config.response_poll_attempts,
        })
    }

    /// Session topic identifying this pairing on the relay.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn parse_accounts(raw: Vec<String>) -> Result<Vec<Address>> {
        raw.iter().map(|s| Address::from_str(s)).collect()
    }

    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(WalletError::Endpoint(format!(
                "{} failed: {} - {}",
                what, status, body
            )));
        }
        Ok(resp)
    }

    /// One GET against the event queue. `Ok(None)` means the relay no
    /// longer knows the pairing and the channel is closed for good.
    async fn poll_events(&self, url: &str) -> Result<Option<EventsResponse>> {
        let resp = self.client.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::check(resp, "event poll").await?;
        Ok(Some(resp.json().await?))
    }
}

impl SignerChannel for BridgeChannel {
    async fn resume(&self) -> Result<Option<Vec<Address>>> {
        let url = format!("{}/v1/pairings/{}", self.base, self.topic);
        let resp = self.client.get(&url).send().await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = Self::check(resp, "pairing lookup").await?;
        let status: PairingStatusResponse = resp.json().await?;

        if status.active {
            let accounts = Self::parse_accounts(status.accounts)?;
            tracing::info!("resumed pairing {} with {} accounts", self.topic, accounts.len());
            Ok(Some(accounts))
        } else {
            Ok(None)
        }
    }

    async fn pair(&self) -> Result<Pairing> {
        let url = format!("{}/v1/pairings", self.base);
        let resp = self
            .client
            .post(&url)
            .json(&CreatePairingRequest { topic: &self.topic })
            .send()
            .await?;
        let resp = Self::check(resp, "pairing handshake").await?;
        let created: CreatePairingResponse = resp.json().await?;

        tracing::info!("created pairing {}", self.topic);
        Ok(Pairing { uri: created.uri })
    }

    async fn request(&self, request: SignRequest) -> Result<Vec<Option<String>>> {
        let request_id = request.id;
        let url = format!("{}/v1/requests/{}", self.base, self.topic);
        let resp = self.client.post(&url).json(&request).send().await?;
        Self::check(resp, "signing request").await?;

        // Poll the relay until the wallet responds or we give up
        let url = format!("{}/v1/responses/{}/{}", self.base, self.topic, request_id);
        for attempt in 0..self.poll_attempts {
            let resp = self.client.get(&url).send().await?;
            let resp = Self::check(resp, "signing response poll").await?;
            let envelope: ResponseEnvelope = resp.json().await?;

            tracing::debug!(
                "request {} state: {} (attempt {}/{})",
                request_id,
                envelope.state,
                attempt + 1,
                self.poll_attempts
            );

            match envelope.state.as_str() {
                "responded" => {
                    let response = envelope.response.ok_or_else(|| {
                        WalletError::Endpoint("responded without a payload".to_string())
                    })?;
                    if let Some(err) = response.error {
                        return Err(WalletError::Endpoint(format!(
                            "wallet rejected request: {} ({})",
                            err.message, err.code
                        )));
                    }
                    return response.result.ok_or_else(|| {
                        WalletError::Endpoint("response carried no result".to_string())
                    });
                }
                "pending" => tokio::time::sleep(self.poll_interval).await,
                other => {
                    tracing::warn!("unknown response state: {}", other);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        Err(WalletError::Endpoint(format!(
            "no response after {} polls",
            self.poll_attempts
        )))
    }

    async fn disconnect(&self) -> Result<()> {
        let url = format!("{}/v1/pairings/{}", self.base, self.topic);
        let resp = self.client.delete(&url).send().await?;
        Self::check(resp, "disconnect").await?;
        tracing::info!("killed pairing {}", self.topic);
        Ok(())
    }

    async fn next_event(&self) -> Option<SessionEvent> {
        // The relay pops at most one queued event per GET. Transient
        // transport or decode failures are retried up to the poll
        // budget; only a relay that no longer knows the pairing (or an
        // exhausted budget) closes the event stream.
        let url = format!("{}/v1/events/{}", self.base, self.topic);
        let mut failures = 0u32;
        loop {
            let events = match self.poll_events(&url).await {
                Ok(Some(events)) => {
                    failures = 0;
                    events
                }
                Ok(None) => {
                    tracing::info!("event channel for {} closed", self.topic);
                    return None;
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.poll_attempts {
                        tracing::warn!("event poll giving up after {} failures: {}", failures, e);
                        return None;
                    }
                    tracing::warn!("event poll failed, retrying: {}", e);
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
            };

            if let Some(event) = events.events.into_iter().next() {
                match event.kind.as_str() {
                    "connect" => {
                        return Self::parse_accounts(event.accounts)
                            .ok()
                            .map(|accounts| SessionEvent::Connected { accounts })
                    }
                    "session_update" => {
                        return Self::parse_accounts(event.accounts)
                            .ok()
                            .map(|accounts| SessionEvent::SessionUpdated { accounts })
                    }
                    "disconnect" => return Some(SessionEvent::Disconnected),
                    other => tracing::warn!("unknown session event: {}", other),
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Fresh session topic, unique per channel instance.
fn new_topic() -> String {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

    let mut hasher = Sha512_256::new();
    hasher.update(nanos.to_be_bytes());
    hasher.update(seq.to_be_bytes());
    hex::encode(&hasher.finalize()[..16])
}
