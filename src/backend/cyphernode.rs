use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::debug;

use crate::backend::{LnPayRequest, PayAttempt, PayListEntry, PaymentBackend};
use crate::config::Config;

type HmacSha256 = Hmac<Sha256>;

// base64 of {"alg":"HS256","typ":"JWT"}
const TOKEN_HEADER_B64: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9Cg==";

/// HTTP client for a Cyphernode gateway. Every call is authenticated with a
/// short-lived HMAC-SHA256 signed bearer token regenerated per request.
pub struct CyphernodeClient {
    base_url: String,
    api_id: String,
    api_key: String,
    client: Client,
}

impl CyphernodeClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            base_url: config.cn_url.trim_end_matches('/').to_string(),
            api_id: config.cn_api_id.clone(),
            api_key: config.cn_api_key.clone(),
            client,
        })
    }

    /// Token valid for ten seconds; the gateway rejects stale ones.
    fn generate_token(&self) -> Result<String> {
        let exp = Utc::now().timestamp() + 10;
        let payload = format!(r#"{{"id":"{}","exp":{}}}"#, self.api_id, exp);
        let msg = format!("{}.{}", TOKEN_HEADER_B64, BASE64.encode(payload));

        let mut mac = HmacSha256::new_from_slice(self.api_key.as_bytes())
            .map_err(|e| anyhow!("invalid gateway API key: {}", e))?;
        mac.update(msg.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", msg, signature))
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Calling payment backend");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.generate_token()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await?;

        if !(status.is_success() || status.is_redirection()) {
            bail!("backend call {} failed with status {}: {}", path, status, payload);
        }
        // Application errors come back with 200 and an error object
        if payload.get("error").map_or(false, |e| !e.is_null()) {
            bail!("backend call {} returned error: {}", path, payload["error"]);
        }

        Ok(payload)
    }
}

/// Cyphernode wraps some responses in a `result` envelope; unwrap when present.
fn unwrap_result(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) => map.remove("result").unwrap_or(Value::Object(map)),
        other => other,
    }
}

#[async_trait]
impl PaymentBackend for CyphernodeClient {
    async fn ln_pay(&self, req: &LnPayRequest) -> Result<Value> {
        let payload = self.post("/ln_pay", serde_json::to_value(req)?).await?;
        let result = unwrap_result(payload);

        // A c-lightning failure body carries code+message instead of a
        // payment result; surface it as an error for the caller to retry.
        if result.get("payment_hash").is_none() {
            if let Some(message) = result.get("message") {
                bail!("ln_pay failed: {}", message);
            }
        }

        Ok(result)
    }

    async fn ln_list_pays(&self, bolt11: &str) -> Result<Vec<PayListEntry>> {
        let payload = self
            .post("/ln_listpays", json!({ "bolt11": bolt11 }))
            .await?;
        let result = unwrap_result(payload);

        let pays = result
            .get("pays")
            .cloned()
            .ok_or_else(|| anyhow!("ln_listpays response has no pays field"))?;

        Ok(serde_json::from_value(pays)?)
    }

    async fn ln_pay_status(&self, bolt11: &str) -> Result<Vec<PayAttempt>> {
        let payload = self
            .post("/ln_paystatus", json!({ "bolt11": bolt11 }))
            .await?;
        let result = unwrap_result(payload);

        let entries = result
            .get("pay")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| anyhow!("ln_paystatus response has no pay field"))?;

        // Attempts of every pay entry for this invoice, flattened in order
        let mut attempts = Vec::new();
        for entry in entries {
            if let Some(list) = entry.get("attempts").and_then(Value::as_array) {
                for attempt in list {
                    attempts.push(serde_json::from_value(attempt.clone())?);
                }
            }
        }

        Ok(attempts)
    }

    async fn spend(&self, address: &str, amount_btc: f64) -> Result<Value> {
        let payload = self
            .post("/spend", json!({ "address": address, "amount": amount_btc }))
            .await?;
        Ok(unwrap_result(payload))
    }
}
