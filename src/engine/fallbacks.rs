use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::batcher::BatchRequest;
use crate::engine::{locks, PayOutcome, WithdrawEngine};
use crate::error::AppError;
use crate::model::WithdrawRecord;

/// Inbound notification from the batching service once a batch settles
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSettlementNotice {
    pub batch_request_id: i64,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl WithdrawEngine {
    /// Fallback sweep: settle expired, unpaid withdrawals on-chain.
    /// Shares the fallbacks lock with forced fallback. Returns the number of
    /// candidates processed.
    #[instrument(skip(self))]
    pub async fn process_fallbacks(self: &Arc<Self>) -> Result<usize, AppError> {
        let _guard = self.locks.acquire(locks::FALLBACKS).await;

        let candidates = self
            .store
            .scan_needing_fallback(Utc::now())
            .await
            .map_err(|e| AppError::database_error(e.to_string()))?;

        let count = candidates.len();
        for record in candidates {
            let id = record.lnurl_withdraw_id;
            if let Err(e) = self.process_fallback_record(record).await {
                warn!(lnurl_withdraw_id = id, error = %e, "Fallback processing failed, left for next sweep");
            }
        }

        Ok(count)
    }

    async fn process_fallback_record(
        self: &Arc<Self>,
        mut record: WithdrawRecord,
    ) -> Result<(), AppError> {
        // A late Lightning success must win over an on-chain fallback; only
        // a confirmed failure clears the way. Pending or indeterminate skips
        // this round rather than risking a double payment.
        if let Some(bolt11) = record.bolt11.clone() {
            match self.reconcile_payment(&bolt11).await {
                PayOutcome::Complete(details) => {
                    info!(
                        lnurl_withdraw_id = record.lnurl_withdraw_id,
                        "Lightning payment settled late, skipping fallback"
                    );
                    self.settle_ln_paid(record, details).await?;
                    return Ok(());
                }
                PayOutcome::Pending => {
                    debug!(
                        lnurl_withdraw_id = record.lnurl_withdraw_id,
                        "Payment still pending, skipping fallback this round"
                    );
                    return Ok(());
                }
                PayOutcome::Indeterminate => {
                    warn!(
                        lnurl_withdraw_id = record.lnurl_withdraw_id,
                        "Payment status indeterminate, skipping fallback this round"
                    );
                    return Ok(());
                }
                PayOutcome::Failed(_) => {}
            }
        }

        let Some(address) = record.btc_fallback_address.clone() else {
            return Ok(());
        };

        if record.batch_fallback {
            // Already enqueued: the batch webhook settles it
            if record.batch_request_id.is_some() {
                return Ok(());
            }

            let req = BatchRequest {
                address,
                amount: record.btc_amount(),
                description: record.description.clone(),
                external_id: record.external_id.clone(),
                webhook_url: Some(self.config().await.batch_webhook_url()),
            };

            match self.batcher.queue_for_next_batch(&req).await {
                Ok(enqueued) => {
                    record.batch_request_id = Some(enqueued.batch_request_id);
                    record.withdrawn_details = Some(enqueued.raw.to_string());
                    let record = self.persist(record).await?;
                    info!(
                        lnurl_withdraw_id = record.lnurl_withdraw_id,
                        batch_request_id = enqueued.batch_request_id,
                        "Fallback enqueued with the batching service"
                    );
                    self.spawn_callbacks(record);
                }
                Err(e) => {
                    record.withdrawn_details =
                        Some(json!({ "error": e.to_string() }).to_string());
                    self.persist(record).await?;
                }
            }
        } else {
            match self.backend.spend(&address, record.btc_amount()).await {
                Ok(details) => {
                    record.paid = true;
                    record.fallback_done = true;
                    record.withdrawn_at = Some(Utc::now());
                    record.withdrawn_details = Some(details.to_string());
                    let record = self.persist(record).await?;
                    info!(
                        lnurl_withdraw_id = record.lnurl_withdraw_id,
                        "Fallback settled with a direct on-chain spend"
                    );
                    self.spawn_callbacks(record);
                }
                Err(e) => {
                    record.withdrawn_details =
                        Some(json!({ "error": e.to_string() }).to_string());
                    self.persist(record).await?;
                }
            }
        }

        Ok(())
    }

    /// Operator override: expire a record now so the next fallback
    /// sweep picks it up. Never forces a fallback over a payment that might
    /// still land or already has.
    #[instrument(skip(self))]
    pub async fn force_fallback(
        self: &Arc<Self>,
        lnurl_withdraw_id: i64,
    ) -> Result<WithdrawRecord, AppError> {
        let _guard = self.locks.acquire(locks::FALLBACKS).await;

        let mut record = self.load_by_id(lnurl_withdraw_id).await?;
        if record.deleted {
            return Err(AppError::conflict("lnurl withdraw deactivated"));
        }
        if record.paid {
            return Err(AppError::conflict("lnurl withdraw already paid"));
        }

        if let Some(bolt11) = record.bolt11.clone() {
            match self.reconcile_payment(&bolt11).await {
                PayOutcome::Complete(details) => {
                    self.settle_ln_paid(record, details).await?;
                    return Err(AppError::conflict("lnurl withdraw already paid"));
                }
                PayOutcome::Pending => {
                    return Err(AppError::conflict("payment pending"));
                }
                PayOutcome::Indeterminate => {
                    return Err(AppError::backend_indeterminate(
                        "could not determine payment status",
                    ));
                }
                PayOutcome::Failed(_) => {}
            }
        }

        record.expires_at = Some(Utc::now() - Duration::seconds(1));
        let record = self.persist(record).await?;
        info!(
            lnurl_withdraw_id = record.lnurl_withdraw_id,
            "Expiry forced, record is eligible for the next fallback sweep"
        );

        Ok(record)
    }

    /// Inbound batch-settlement webhook. An unknown batch request id
    /// is a hard error surfaced to the caller.
    #[instrument(skip(self, notice), fields(batch_request_id = notice.batch_request_id))]
    pub async fn process_batch_webhook(
        self: &Arc<Self>,
        notice: BatchSettlementNotice,
    ) -> Result<WithdrawRecord, AppError> {
        let mut record = self
            .store
            .get_by_batch_request_id(notice.batch_request_id)
            .await
            .map_err(|e| AppError::database_error(e.to_string()))?
            .ok_or_else(|| AppError::not_found("unknown batchRequestId"))?;

        record.paid = true;
        record.fallback_done = true;
        record.withdrawn_at = Some(Utc::now());
        record.withdrawn_details =
            Some(serde_json::Value::Object(notice.details.clone()).to_string());

        let record = self.persist(record).await?;
        info!(
            lnurl_withdraw_id = record.lnurl_withdraw_id,
            batch_request_id = notice.batch_request_id,
            "Batched fallback settled"
        );
        self.spawn_callbacks(record.clone());

        Ok(record)
    }
}
