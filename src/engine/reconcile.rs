use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::backend::{LnPayRequest, PayAttempt};
use crate::engine::WithdrawEngine;
use crate::error::AppError;
use crate::model::WithdrawRecord;

/// Transient single-attempt failures are known backend behavior; pay is
/// retried this many times total before giving up.
const PAY_ATTEMPTS: u32 = 3;

/// Attempt-detail payloads beyond this count are truncated before storage.
const MAX_STORED_ATTEMPTS: usize = 1000;

/// The true outcome of a previously submitted Lightning payment, as well as
/// it can be determined. Complete and Failed carry the details worth
/// persisting on the record.
#[derive(Debug, Clone)]
pub enum PayOutcome {
    Complete(Value),
    Pending,
    Failed(Value),
    Indeterminate,
}

impl WithdrawEngine {
    /// Resolve what actually happened to an invoice. The backend's
    /// list-payments view is authoritative when it reports a complete or
    /// pending attempt; the detailed pay-status view decides otherwise; and
    /// when both probes error the outcome is indeterminate, never guessed.
    #[instrument(skip(self, bolt11))]
    pub async fn reconcile_payment(&self, bolt11: &str) -> PayOutcome {
        match self.probe_list_pays(bolt11).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => match self.probe_pay_status(bolt11).await {
                Ok(outcome) => outcome,
                // list-payments answered and reported no settlement in
                // flight; stand by its verdict
                Err(status_err) => PayOutcome::Failed(json!({
                    "failure": format!("pay-status unavailable: {}", status_err),
                })),
            },
            Err(list_err) => match self.probe_pay_status(bolt11).await {
                Ok(outcome) => outcome,
                Err(status_err) => {
                    warn!(
                        list_error = %list_err,
                        status_error = %status_err,
                        "Both payment status probes failed"
                    );
                    PayOutcome::Indeterminate
                }
            },
        }
    }

    /// list-payments probe: Some(outcome) when it is authoritative, None to
    /// fall through to the detailed status query
    async fn probe_list_pays(&self, bolt11: &str) -> Result<Option<PayOutcome>> {
        let pays = self.backend.ln_list_pays(bolt11).await?;

        for entry in &pays {
            if entry.bolt11.as_deref().map_or(false, |b| b != bolt11) {
                continue;
            }
            match entry.status.as_str() {
                "complete" => {
                    return Ok(Some(PayOutcome::Complete(serde_json::to_value(entry)?)))
                }
                "pending" => return Ok(Some(PayOutcome::Pending)),
                _ => {}
            }
        }

        debug!(entries = pays.len(), "list-payments reported nothing settled");
        Ok(None)
    }

    /// pay-status probe over the individual attempts
    async fn probe_pay_status(&self, bolt11: &str) -> Result<PayOutcome> {
        let attempts = self.backend.ln_pay_status(bolt11).await?;

        if attempts.iter().any(|a| a.success.is_some()) {
            return Ok(PayOutcome::Complete(truncate_attempts(&attempts)?));
        }
        match attempts.last() {
            Some(last) if last.failure.is_none() => Ok(PayOutcome::Pending),
            Some(_) => Ok(PayOutcome::Failed(truncate_attempts(&attempts)?)),
            // No attempt was ever made for this invoice
            None => Ok(PayOutcome::Failed(json!({
                "failure": "no payment attempt found",
            }))),
        }
    }

    /// Pay the submitted invoice and settle the record on success
    pub(crate) async fn pay_invoice(
        self: &Arc<Self>,
        mut record: WithdrawRecord,
        bolt11: &str,
    ) -> Result<(), AppError> {
        // The invoice goes on file before the payment is dispatched, so a
        // concurrent forced fallback or a restart finds it and reconciles
        // the in-flight payment instead of spending on-chain over it.
        record.bolt11 = Some(bolt11.to_string());
        let record = self.persist(record).await?;

        let req = LnPayRequest {
            bolt11: bolt11.to_string(),
            expected_msatoshi: Some(record.msatoshi),
            expected_description: record.description.clone(),
        };

        match self.attempt_payment(&req).await {
            Ok(payload) => {
                self.settle_ln_paid(record, payload).await?;
                Ok(())
            }
            Err(e) => {
                // Reload before recording the failure; another settlement
                // path may have won while the payment was in flight.
                let mut current = self.load_by_id(record.lnurl_withdraw_id).await?;
                if !current.paid {
                    current.withdrawn_details =
                        Some(json!({ "error": e.to_string() }).to_string());
                    self.persist(current).await?;
                }
                Err(AppError::backend_transient(format!(
                    "lightning payment failed: {}",
                    e
                )))
            }
        }
    }

    async fn attempt_payment(&self, req: &LnPayRequest) -> Result<Value> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.backend.ln_pay(req).await {
                Ok(payload) => {
                    info!(attempt, "Lightning payment succeeded");
                    return Ok(payload);
                }
                Err(e) if attempt < PAY_ATTEMPTS => {
                    warn!(attempt, error = %e, "Lightning payment attempt failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Bound what lands in `withdrawn_details`: runaway attempt lists collapse
/// to the first two entries with a truncation marker in the second.
fn truncate_attempts(attempts: &[PayAttempt]) -> Result<Value> {
    if attempts.len() <= MAX_STORED_ATTEMPTS {
        return Ok(serde_json::to_value(attempts)?);
    }

    let mut second = attempts[1].clone();
    second.extra.insert(
        "truncated".to_string(),
        json!(format!("{} further attempts omitted", attempts.len() - 2)),
    );
    Ok(serde_json::to_value(vec![attempts[0].clone(), second])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt() -> PayAttempt {
        PayAttempt {
            success: None,
            failure: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_small_attempt_lists_stored_whole() {
        let attempts = vec![attempt(), attempt(), attempt()];
        let value = truncate_attempts(&attempts).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_runaway_attempt_lists_are_truncated() {
        let attempts = vec![attempt(); 1500];
        let value = truncate_attempts(&attempts).unwrap();
        let stored = value.as_array().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(
            stored[1]["truncated"],
            json!("1498 further attempts omitted")
        );
    }
}
