use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::engine::{locks, WithdrawEngine};
use crate::error::AppError;
use crate::model::WithdrawRecord;

impl WithdrawEngine {
    /// Callback sweep: retry every undelivered webhook notification.
    /// Single-flight under the callbacks lock; overlapping sweeps queue.
    /// Each record is awaited in turn and one record's failure never stops
    /// the sweep. Returns the number of candidates processed.
    #[instrument(skip(self))]
    pub async fn process_callbacks(&self) -> Result<usize, AppError> {
        let _guard = self.locks.acquire(locks::CALLBACKS).await;

        let candidates = self
            .store
            .scan_needing_callback()
            .await
            .map_err(|e| AppError::database_error(e.to_string()))?;

        let count = candidates.len();
        for record in candidates {
            let id = record.lnurl_withdraw_id;
            if let Err(e) = self.deliver_callbacks(record).await {
                warn!(lnurl_withdraw_id = id, error = %e, "Callback delivery failed, left for next sweep");
            }
        }

        Ok(count)
    }

    /// Deliver the outstanding notifications for one record. A non-2xx/3xx
    /// response leaves the corresponding flag unset so a later sweep retries;
    /// delivery is at-least-once and receivers must be idempotent on id.
    pub(crate) async fn deliver_callbacks(
        &self,
        mut record: WithdrawRecord,
    ) -> Result<WithdrawRecord, AppError> {
        let Some(webhook_url) = record.webhook_url.clone() else {
            return Ok(record);
        };

        let details = parsed_details(&record);

        // Enqueued with the batch service but not yet settled there
        if record.batch_request_id.is_some() && !record.paid && !record.batched_calledback {
            let payload = json!({
                "action": "fallbackBatched",
                "id": record.lnurl_withdraw_id,
                "btcFallbackAddress": record.btc_fallback_address,
                "details": details,
            });

            if self.post_acknowledged(&webhook_url, &payload).await {
                record.batched_calledback = true;
                record.batched_calledback_at = Some(Utc::now());
                record = self.persist(record).await?;
                info!(
                    lnurl_withdraw_id = record.lnurl_withdraw_id,
                    "Batched callback delivered"
                );
            }
        }

        if record.paid && !record.paid_calledback {
            let payload = if record.fallback_done {
                json!({
                    "action": "fallbackPaid",
                    "id": record.lnurl_withdraw_id,
                    "btcFallbackAddress": record.btc_fallback_address,
                    "details": details,
                })
            } else {
                json!({
                    "action": "lnPaid",
                    "id": record.lnurl_withdraw_id,
                    "bolt11": record.bolt11,
                    "details": details,
                })
            };

            if self.post_acknowledged(&webhook_url, &payload).await {
                record.paid_calledback = true;
                record.paid_calledback_at = Some(Utc::now());
                record = self.persist(record).await?;
                info!(
                    lnurl_withdraw_id = record.lnurl_withdraw_id,
                    "Paid callback delivered"
                );
            }
        }

        Ok(record)
    }

    async fn post_acknowledged(&self, url: &str, payload: &Value) -> bool {
        match self.webhooks.post_json(url, payload).await {
            Ok(acknowledged) => acknowledged,
            Err(e) => {
                warn!(url = %url, error = %e, "Webhook transport failure");
                false
            }
        }
    }

    /// Fire-and-forget delivery for a just-settled record; the scheduled
    /// sweep covers anything this task does not get acknowledged.
    pub(crate) fn spawn_callbacks(self: &Arc<Self>, record: WithdrawRecord) {
        if record.webhook_url.is_none() {
            return;
        }

        let engine = self.clone();
        tokio::spawn(async move {
            let id = record.lnurl_withdraw_id;
            if let Err(e) = engine.deliver_callbacks(record).await {
                error!(lnurl_withdraw_id = id, error = %e, "Callback delivery task failed");
            }
        });
    }
}

/// Settlement details go out as JSON when they parse, verbatim otherwise
fn parsed_details(record: &WithdrawRecord) -> Value {
    match &record.withdrawn_details {
        Some(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone())),
        None => Value::Null,
    }
}
