use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod cyphernode;

pub use cyphernode::CyphernodeClient;

/// Outbound Lightning payment request
#[derive(Debug, Clone, Serialize)]
pub struct LnPayRequest {
    pub bolt11: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_msatoshi: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_description: Option<String>,
}

/// One entry of the backend's list-payments view. `status` is the backend's
/// verbatim string ("complete", "pending", anything else counts as failed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayListEntry {
    pub bolt11: Option<String>,
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One attempt from the backend's detailed pay-status view. An attempt that
/// carries a `success` marker completed; one that carries a `failure` marker
/// failed; one that carries neither is still in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayAttempt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Lightning/Bitcoin payment backend. Every call may time out or error
/// independently of the payment's real-world outcome; the engine's
/// reconciliation deals with that ambiguity.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// Send a Lightning payment. Ok carries the backend's raw success
    /// payload; Err covers both transport and application failures.
    async fn ln_pay(&self, req: &LnPayRequest) -> Result<Value>;

    /// List past payment attempts for an invoice
    async fn ln_list_pays(&self, bolt11: &str) -> Result<Vec<PayListEntry>>;

    /// Detailed attempt status for an invoice
    async fn ln_pay_status(&self, bolt11: &str) -> Result<Vec<PayAttempt>>;

    /// Direct on-chain payment
    async fn spend(&self, address: &str, amount_btc: f64) -> Result<Value>;
}
