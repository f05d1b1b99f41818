use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rand::RngCore;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::backend::PaymentBackend;
use crate::batcher::BatchClient;
use crate::config::Config;
use crate::error::AppError;
use crate::lnurl;
use crate::model::{
    CreateWithdrawRequest, WithdrawRecord, WithdrawRecordView, WithdrawRequestParams,
};
use crate::store::WithdrawStore;
use crate::webhooks::WebhookSender;

pub mod callbacks;
pub mod fallbacks;
pub mod locks;
pub mod reconcile;

pub use fallbacks::BatchSettlementNotice;
pub use locks::KeyedLocks;
pub use reconcile::PayOutcome;


/// The withdraw lifecycle engine: owns the record state machine, the claim
/// critical section, payment status reconciliation, fallback decisioning and
/// webhook delivery. All mutation of withdrawal records goes through here.
pub struct WithdrawEngine {
    pub(crate) store: Arc<dyn WithdrawStore>,
    pub(crate) backend: Arc<dyn PaymentBackend>,
    pub(crate) batcher: Arc<dyn BatchClient>,
    pub(crate) webhooks: Arc<dyn WebhookSender>,
    config: RwLock<Config>,
    pub(crate) locks: KeyedLocks,
}

impl WithdrawEngine {
    pub fn new(
        store: Arc<dyn WithdrawStore>,
        backend: Arc<dyn PaymentBackend>,
        batcher: Arc<dyn BatchClient>,
        webhooks: Arc<dyn WebhookSender>,
        config: Config,
    ) -> Self {
        Self {
            store,
            backend,
            batcher,
            webhooks,
            config: RwLock::new(config),
            locks: KeyedLocks::new(),
        }
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Reread the configuration file and swap the active configuration
    pub async fn reload_config(&self, path: &PathBuf) -> Result<Config, AppError> {
        let config = Config::load_from_file(path)
            .map_err(|e| AppError::internal_error(format!("config reload failed: {}", e)))?;
        *self.config.write().await = config.clone();
        info!("Configuration reloaded");
        Ok(config)
    }

    /// Create a withdrawal and hand back its single-use claim link
    #[instrument(skip(self, req), fields(msatoshi = req.msatoshi))]
    pub async fn create_withdraw(
        &self,
        req: CreateWithdrawRequest,
    ) -> Result<WithdrawRecordView, AppError> {
        let _guard = self.locks.acquire(locks::WITHDRAW).await;

        if req.msatoshi <= 0 {
            return Err(AppError::validation_error("msatoshi must be positive"));
        }
        if let Some(webhook_url) = &req.webhook_url {
            url::Url::parse(webhook_url)
                .map_err(|e| AppError::validation_error(format!("invalid webhookUrl: {}", e)))?;
        }
        if req.batch_fallback && req.btc_fallback_address.is_none() {
            return Err(AppError::validation_error(
                "batchFallback requires btcFallbackAddress",
            ));
        }

        let secret_token = generate_secret_token();
        let claim_url = self.config.read().await.withdraw_request_url(&secret_token);
        let encoded = lnurl::encode(&claim_url)
            .map_err(|e| AppError::internal_error(format!("LNURL encoding failed: {}", e)))?;

        let now = Utc::now();
        let record = WithdrawRecord {
            lnurl_withdraw_id: 0,
            external_id: req.external_id,
            secret_token,
            msatoshi: req.msatoshi,
            description: req.description,
            expires_at: req.expires_at,
            webhook_url: req.webhook_url,
            btc_fallback_address: req.btc_fallback_address,
            batch_fallback: req.batch_fallback,
            lnurl: encoded,
            bolt11: None,
            withdrawn_details: None,
            withdrawn_at: None,
            paid: false,
            fallback_done: false,
            deleted: false,
            batch_request_id: None,
            paid_calledback: false,
            paid_calledback_at: None,
            batched_calledback: false,
            batched_calledback_at: None,
            created_at: now,
            updated_at: now,
        };

        let record = self
            .store
            .upsert(record)
            .await
            .map_err(|e| AppError::database_error(e.to_string()))?;

        info!(
            lnurl_withdraw_id = record.lnurl_withdraw_id,
            "Lnurl withdraw created"
        );

        Ok(WithdrawRecordView {
            record,
            lnurl_decoded: claim_url,
        })
    }

    /// Lookup by id, no state change
    pub async fn get_withdraw(&self, lnurl_withdraw_id: i64) -> Result<WithdrawRecordView, AppError> {
        let record = self.load_by_id(lnurl_withdraw_id).await?;
        let lnurl_decoded = lnurl::decode(&record.lnurl)
            .map_err(|e| AppError::internal_error(format!("stored LNURL is invalid: {}", e)))?;

        Ok(WithdrawRecordView {
            record,
            lnurl_decoded,
        })
    }

    /// Soft-delete an unpaid withdrawal; terminal, mutually exclusive with
    /// the paid states
    pub async fn delete_withdraw(
        &self,
        lnurl_withdraw_id: i64,
    ) -> Result<WithdrawRecord, AppError> {
        let _guard = self.locks.acquire(locks::WITHDRAW).await;

        let mut record = self.load_by_id(lnurl_withdraw_id).await?;
        if record.deleted {
            return Err(AppError::conflict("lnurl withdraw already deactivated"));
        }
        if record.is_settled_or_batched() {
            return Err(AppError::conflict(
                "cannot deactivate a paid or batched lnurl withdraw",
            ));
        }

        record.deleted = true;
        self.persist(record).await
    }

    /// Wallet step 1: resolve the claim link to withdrawal parameters
    #[instrument(skip(self, secret_token))]
    pub async fn process_withdraw_request(
        &self,
        secret_token: &str,
    ) -> Result<WithdrawRequestParams, AppError> {
        let _guard = self.locks.acquire(locks::WITHDRAW).await;

        let record = self.load_by_secret(secret_token).await?;
        guard_claimable(&record)?;

        let config = self.config.read().await;
        Ok(WithdrawRequestParams {
            tag: "withdrawRequest",
            callback: config.withdraw_callback_url(),
            k1: record.secret_token,
            default_description: record.description,
            min_withdrawable: record.msatoshi,
            max_withdrawable: record.msatoshi,
        })
    }

    /// Wallet step 2: submit an invoice to be paid. Serialized with
    /// itself and with request resolution under the withdraw lock.
    #[instrument(skip(self, k1, pr))]
    pub async fn process_withdraw(
        self: &Arc<Self>,
        k1: &str,
        pr: &str,
    ) -> Result<(), AppError> {
        let _guard = self.locks.acquire(locks::WITHDRAW).await;

        if k1.is_empty() || pr.is_empty() {
            return Err(AppError::validation_error("k1 and pr are required"));
        }

        let record = self.load_by_secret(k1).await?;
        guard_claimable(&record)?;

        match record.bolt11.clone() {
            // Re-claim with the invoice already on record: reconcile rather
            // than pay again
            Some(existing) if existing == pr => {
                self.reconcile_recorded_invoice(record, &existing).await
            }
            // A different invoice is accepted only once the recorded one is
            // confirmed failed; a wallet must not redirect funds mid-flight
            Some(existing) => match self.reconcile_payment(&existing).await {
                PayOutcome::Failed(_) => {
                    debug!(
                        lnurl_withdraw_id = record.lnurl_withdraw_id,
                        "Previous invoice confirmed failed, accepting replacement"
                    );
                    self.pay_invoice(record, pr).await
                }
                PayOutcome::Complete(details) => {
                    self.settle_ln_paid(record, details).await?;
                    Err(AppError::conflict("lnurl withdraw already paid"))
                }
                PayOutcome::Pending => Err(AppError::conflict(
                    "cannot claim twice with a different invoice",
                )),
                PayOutcome::Indeterminate => Err(AppError::backend_indeterminate(
                    "could not determine status of the recorded invoice",
                )),
            },
            // First claim
            None => self.pay_invoice(record, pr).await,
        }
    }

    /// Outcome handling for a claim carrying the recorded invoice
    async fn reconcile_recorded_invoice(
        self: &Arc<Self>,
        record: WithdrawRecord,
        bolt11: &str,
    ) -> Result<(), AppError> {
        match self.reconcile_payment(bolt11).await {
            PayOutcome::Complete(details) => {
                self.settle_ln_paid(record, details).await?;
                Err(AppError::conflict("lnurl withdraw already paid"))
            }
            PayOutcome::Pending => Err(AppError::conflict("payment pending")),
            PayOutcome::Failed(_) if record.is_expired(Utc::now()) => {
                Err(AppError::expired("lnurl withdraw expired"))
            }
            PayOutcome::Failed(_) => {
                // Confirmed failed and still claimable: clear the failure and
                // retry with the same invoice
                let mut record = record;
                record.withdrawn_details = None;
                let bolt11 = bolt11.to_string();
                self.pay_invoice(record, &bolt11).await
            }
            PayOutcome::Indeterminate => Err(AppError::backend_indeterminate(
                "could not determine payment status",
            )),
        }
    }

    /// Mark a record settled over Lightning and notify. Rereads the stored
    /// record first: a fallback may have settled it while the payment was in
    /// flight, and that settlement must not be overwritten with stale state.
    pub(crate) async fn settle_ln_paid(
        self: &Arc<Self>,
        record: WithdrawRecord,
        details: serde_json::Value,
    ) -> Result<WithdrawRecord, AppError> {
        let mut current = self.load_by_id(record.lnurl_withdraw_id).await?;
        if current.paid {
            return Ok(current);
        }

        current.paid = true;
        current.withdrawn_at = Some(Utc::now());
        current.withdrawn_details = Some(details.to_string());
        let current = self.persist(current).await?;
        info!(
            lnurl_withdraw_id = current.lnurl_withdraw_id,
            "Lnurl withdraw paid over Lightning"
        );
        self.spawn_callbacks(current.clone());
        Ok(current)
    }

    pub(crate) async fn load_by_id(
        &self,
        lnurl_withdraw_id: i64,
    ) -> Result<WithdrawRecord, AppError> {
        self.store
            .get_by_id(lnurl_withdraw_id)
            .await
            .map_err(|e| AppError::database_error(e.to_string()))?
            .ok_or_else(|| AppError::not_found("unknown lnurlWithdrawId"))
    }

    async fn load_by_secret(&self, secret_token: &str) -> Result<WithdrawRecord, AppError> {
        self.store
            .get_by_secret(secret_token)
            .await
            .map_err(|e| AppError::database_error(e.to_string()))?
            .ok_or_else(|| AppError::not_found("invalid k1 value"))
    }

    /// Persist a decided state transition; a failure here is surfaced
    /// verbatim since the decision cannot be silently dropped
    pub(crate) async fn persist(
        &self,
        record: WithdrawRecord,
    ) -> Result<WithdrawRecord, AppError> {
        self.store
            .upsert(record)
            .await
            .map_err(|e| AppError::database_error(e.to_string()))
    }
}

/// Shared guards for the read path and the claim path: the claim link is
/// single-use once committed to a settlement path.
fn guard_claimable(record: &WithdrawRecord) -> Result<(), AppError> {
    if record.deleted {
        return Err(AppError::conflict("lnurl withdraw deactivated"));
    }
    if record.is_settled_or_batched() {
        return Err(AppError::conflict("lnurl withdraw already paid or batched"));
    }
    if record.is_expired(Utc::now()) {
        return Err(AppError::expired("lnurl withdraw expired"));
    }
    Ok(())
}

/// Fresh random claim credential; never reused
fn generate_secret_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
