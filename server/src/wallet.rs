//! Wallet gateway client.
//!
//! Two POST endpoints, debit and credit, both signed with
//! `HMAC-SHA256(secret, METHOD || path || body || timestamp)` carried in the
//! `x-signature` header. The signed body is byte-identical to the request
//! body that is sent. Calls are attempted once; retry policy belongs to the
//! wallet side, keyed on the unique transaction id.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

const BET_PATH: &str = "/api/transactions/bet";
const CREDIT_PATH: &str = "/api/transactions/credit";

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("wallet replied HTTP {0}")]
    Http(reqwest::StatusCode),
    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Success,
    Failed,
}

/// Debit (stake) request for `/api/transactions/bet`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitRequest {
    pub session_token: String,
    pub bet_amount: f64,
    pub currency: String,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditKind {
    Win,
    Refund,
}

/// Credit (win or refund) request for `/api/transactions/credit`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditRequest {
    pub session_token: String,
    pub win_amount: f64,
    pub currency: String,
    pub transaction_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: CreditKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletReply {
    pub status: TransactionStatus,
    pub new_balance: f64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WalletEnvelope {
    #[allow(dead_code)]
    status: String,
    data: WalletReply,
}

/// Outbound wallet operations.
#[async_trait]
pub trait WalletGateway: Send + Sync {
    async fn debit(&self, request: &DebitRequest) -> Result<WalletReply, WalletError>;
    async fn credit(&self, request: &CreditRequest) -> Result<WalletReply, WalletError>;
}

/// Compute the request signature over `METHOD || path || body || timestamp`.
pub fn sign(secret: &str, method: &str, path: &str, body: &str, timestamp_ms: u64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(method.to_uppercase().as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());
    mac.update(timestamp_ms.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// HTTP wallet gateway.
pub struct HttpWalletGateway {
    client: reqwest::Client,
    base_url: String,
    secret: String,
}

impl HttpWalletGateway {
    pub fn new(base_url: &str, secret: &str, timeout: Duration) -> Result<Self, WalletError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(200)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        })
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<WalletReply, WalletError> {
        let body_json = serde_json::to_string(body)
            .map_err(|err| WalletError::Unavailable(format!("request encoding failed: {err}")))?;
        let timestamp = plinko_types::now_ms();
        let signature = sign(&self.secret, "POST", path, &body_json, timestamp);
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Content-Type", "application/json")
            .header("x-timestamp", timestamp.to_string())
            .header("x-signature", signature)
            .body(body_json)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WalletError::Http(status));
        }
        let envelope: WalletEnvelope = response.json().await?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl WalletGateway for HttpWalletGateway {
    async fn debit(&self, request: &DebitRequest) -> Result<WalletReply, WalletError> {
        self.post(BET_PATH, request).await
    }

    async fn credit(&self, request: &CreditRequest) -> Result<WalletReply, WalletError> {
        self.post(CREDIT_PATH, request).await
    }
}
