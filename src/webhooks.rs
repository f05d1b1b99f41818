use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

/// Delivers one webhook notification. There is no inline retry here: a
/// failed delivery leaves the record's calledback flag unset and the next
/// scheduled sweep tries again, so delivery is at-least-once and receivers
/// must be idempotent on the record id.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// POST the payload; Ok(true) means the receiver acknowledged with a
    /// 2xx/3xx status, Ok(false) any other status.
    async fn post_json(&self, url: &str, payload: &Value) -> Result<bool>;
}

pub struct HttpWebhookSender {
    client: Client,
}

impl HttpWebhookSender {
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn post_json(&self, url: &str, payload: &Value) -> Result<bool> {
        let response = self
            .client
            .post(url)
            .header("User-Agent", "lnurld-webhook/1.0")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let delivered = status.is_success() || status.is_redirection();
        if delivered {
            debug!(url = %url, status = %status, "Webhook delivered");
        } else {
            warn!(url = %url, status = %status, "Webhook rejected by receiver");
        }

        Ok(delivered)
    }
}
