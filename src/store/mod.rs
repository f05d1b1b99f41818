use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::WithdrawRecord;

pub mod memory;

pub use memory::MemoryWithdrawStore;

/// Narrow repository interface over the withdrawal records. The engine only
/// ever goes through this trait; the storage engine behind it is pluggable.
#[async_trait]
pub trait WithdrawStore: Send + Sync {
    async fn get_by_id(&self, lnurl_withdraw_id: i64) -> Result<Option<WithdrawRecord>>;

    async fn get_by_secret(&self, secret_token: &str) -> Result<Option<WithdrawRecord>>;

    async fn get_by_batch_request_id(
        &self,
        batch_request_id: i64,
    ) -> Result<Option<WithdrawRecord>>;

    /// Insert or update a record. A zero id means "assign one"; the stored
    /// record (with id and bumped `updated_at`) is returned.
    async fn upsert(&self, record: WithdrawRecord) -> Result<WithdrawRecord>;

    /// Records with an undelivered webhook notification
    async fn scan_needing_callback(&self) -> Result<Vec<WithdrawRecord>>;

    /// Expired, unpaid records eligible for fallback
    async fn scan_needing_fallback(&self, now: DateTime<Utc>) -> Result<Vec<WithdrawRecord>>;
}
