use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;

/// One output queued for the next on-chain settlement batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub address: String,
    /// Amount in BTC
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Where the batching service notifies us once the batch is broadcast
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

/// What the batching service handed back for an enqueued output
#[derive(Debug, Clone)]
pub struct BatchEnqueued {
    pub batch_request_id: i64,
    /// Raw response payload, persisted as the record's settlement details
    pub raw: Value,
}

/// External service aggregating many payouts into one on-chain transaction
#[async_trait]
pub trait BatchClient: Send + Sync {
    async fn queue_for_next_batch(&self, req: &BatchRequest) -> Result<BatchEnqueued>;
}

/// JSON-RPC HTTP client for the batching service
pub struct HttpBatchClient {
    base_url: String,
    client: Client,
}

impl HttpBatchClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            base_url: config.batcher_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl BatchClient for HttpBatchClient {
    async fn queue_for_next_batch(&self, req: &BatchRequest) -> Result<BatchEnqueued> {
        let url = format!("{}/api", self.base_url);
        debug!(url = %url, address = %req.address, "Queueing output with the batching service");

        let body = json!({
            "id": 0,
            "method": "queueForNextBatch",
            "params": req,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;

        if !(status.is_success() || status.is_redirection()) {
            bail!("batcher call failed with status {}: {}", status, payload);
        }
        if payload.get("error").map_or(false, |e| !e.is_null()) {
            bail!("batcher returned error: {}", payload["error"]);
        }

        let result = payload
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("batcher response has no result"))?;
        let batch_request_id = result
            .get("batchRequestId")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("batcher response has no batchRequestId"))?;

        Ok(BatchEnqueued {
            batch_request_id,
            raw: result,
        })
    }
}
