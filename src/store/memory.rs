use std::collections::BTreeMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::model::WithdrawRecord;
use crate::store::WithdrawStore;

/// In-memory record store. Keeps records in a BTreeMap so scans come out in
/// id order, which makes sweep behavior deterministic.
#[derive(Default)]
pub struct MemoryWithdrawStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<i64, WithdrawRecord>,
    next_id: i64,
}

impl MemoryWithdrawStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WithdrawStore for MemoryWithdrawStore {
    async fn get_by_id(&self, lnurl_withdraw_id: i64) -> Result<Option<WithdrawRecord>> {
        let inner = self.inner.read().await;
        Ok(inner.records.get(&lnurl_withdraw_id).cloned())
    }

    async fn get_by_secret(&self, secret_token: &str) -> Result<Option<WithdrawRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .values()
            .find(|r| r.secret_token == secret_token)
            .cloned())
    }

    async fn get_by_batch_request_id(
        &self,
        batch_request_id: i64,
    ) -> Result<Option<WithdrawRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .values()
            .find(|r| r.batch_request_id == Some(batch_request_id))
            .cloned())
    }

    async fn upsert(&self, mut record: WithdrawRecord) -> Result<WithdrawRecord> {
        let mut inner = self.inner.write().await;

        if record.lnurl_withdraw_id == 0 {
            if inner
                .records
                .values()
                .any(|r| r.secret_token == record.secret_token)
            {
                bail!("secret token already in use");
            }
            inner.next_id += 1;
            record.lnurl_withdraw_id = inner.next_id;
        }

        record.updated_at = Utc::now();
        inner
            .records
            .insert(record.lnurl_withdraw_id, record.clone());
        Ok(record)
    }

    async fn scan_needing_callback(&self) -> Result<Vec<WithdrawRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .values()
            .filter(|r| r.needs_callback())
            .cloned()
            .collect())
    }

    async fn scan_needing_fallback(&self, now: DateTime<Utc>) -> Result<Vec<WithdrawRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .values()
            .filter(|r| r.needs_fallback(now))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_record(secret: &str) -> WithdrawRecord {
        let now = Utc::now();
        WithdrawRecord {
            lnurl_withdraw_id: 0,
            external_id: None,
            secret_token: secret.to_string(),
            msatoshi: 50_000,
            description: None,
            expires_at: None,
            webhook_url: None,
            btc_fallback_address: None,
            batch_fallback: false,
            lnurl: "LNURL1...".to_string(),
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
        }
    }

    #[tokio::test]
    async fn test_upsert_assigns_ids() {
        let store = MemoryWithdrawStore::new();
        let a = store.upsert(new_record("a")).await.unwrap();
        let b = store.upsert(new_record("b")).await.unwrap();
        assert_eq!(a.lnurl_withdraw_id, 1);
        assert_eq!(b.lnurl_withdraw_id, 2);
    }

    #[tokio::test]
    async fn test_secret_tokens_are_unique() {
        let store = MemoryWithdrawStore::new();
        store.upsert(new_record("dup")).await.unwrap();
        assert!(store.upsert(new_record("dup")).await.is_err());
    }

    #[tokio::test]
    async fn test_lookup_by_secret_and_batch_id() {
        let store = MemoryWithdrawStore::new();
        let mut r = store.upsert(new_record("tok")).await.unwrap();
        r.batch_request_id = Some(42);
        store.upsert(r).await.unwrap();

        let by_secret = store.get_by_secret("tok").await.unwrap().unwrap();
        assert_eq!(by_secret.batch_request_id, Some(42));
        let by_batch = store.get_by_batch_request_id(42).await.unwrap().unwrap();
        assert_eq!(by_batch.secret_token, "tok");
        assert!(store.get_by_batch_request_id(43).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scans_apply_the_sweep_predicates() {
        let store = MemoryWithdrawStore::new();
        let now = Utc::now();

        let mut needs_cb = new_record("cb");
        needs_cb.paid = true;
        needs_cb.webhook_url = Some("https://example.com/hook".to_string());
        needs_cb.withdrawn_details = Some("{}".to_string());
        store.upsert(needs_cb).await.unwrap();

        let mut needs_fb = new_record("fb");
        needs_fb.expires_at = Some(now - Duration::hours(1));
        needs_fb.btc_fallback_address = Some("bc1q...".to_string());
        store.upsert(needs_fb).await.unwrap();

        store.upsert(new_record("idle")).await.unwrap();

        let callbacks = store.scan_needing_callback().await.unwrap();
        assert_eq!(callbacks.len(), 1);
        assert_eq!(callbacks[0].secret_token, "cb");

        let fallbacks = store.scan_needing_fallback(now).await.unwrap();
        assert_eq!(fallbacks.len(), 1);
        assert_eq!(fallbacks[0].secret_token, "fb");
    }
}
