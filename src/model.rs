use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One issued withdrawal. Created by the API, mutated only by the engine in
/// response to claim, reconciliation, fallback and callback operations.
/// Never physically deleted; `deleted` is a soft terminal flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRecord {
    pub lnurl_withdraw_id: i64,
    pub external_id: Option<String>,
    /// Single-use claim credential (`k1`), immutable once assigned
    pub secret_token: String,
    /// Fixed amount; min withdrawable == max withdrawable
    pub msatoshi: i64,
    pub description: Option<String>,
    /// Absent means the claim link never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub webhook_url: Option<String>,
    pub btc_fallback_address: Option<String>,
    pub batch_fallback: bool,
    /// bech32-encoded claim URL
    pub lnurl: String,
    /// Invoice submitted by the withdrawer; overwritten only while unpaid
    /// and only once the previous invoice is confirmed failed
    pub bolt11: Option<String>,
    /// Serialized result or error of the last settlement attempt
    pub withdrawn_details: Option<String>,
    pub withdrawn_at: Option<DateTime<Utc>>,
    /// Monotonic: once true, never reset
    pub paid: bool,
    /// Settlement happened over the on-chain path; implies `paid`
    pub fallback_done: bool,
    pub deleted: bool,
    pub batch_request_id: Option<i64>,
    pub paid_calledback: bool,
    pub paid_calledback_at: Option<DateTime<Utc>>,
    pub batched_calledback: bool,
    pub batched_calledback_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WithdrawRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |exp| exp < now)
    }

    /// Committed to a settlement path: the claim link is no longer usable
    pub fn is_settled_or_batched(&self) -> bool {
        self.paid || self.batch_request_id.is_some()
    }

    /// Candidate for the callback sweep
    pub fn needs_callback(&self) -> bool {
        !self.deleted
            && self.webhook_url.is_some()
            && self.withdrawn_details.is_some()
            && ((self.paid && !self.paid_calledback)
                || (self.batch_request_id.is_some() && !self.batched_calledback))
    }

    /// Candidate for the fallback sweep
    pub fn needs_fallback(&self, now: DateTime<Utc>) -> bool {
        !self.deleted
            && !self.paid
            && !self.fallback_done
            && self.btc_fallback_address.is_some()
            && self.is_expired(now)
    }

    /// Amount in BTC for the on-chain rails
    pub fn btc_amount(&self) -> f64 {
        self.msatoshi as f64 / 100_000_000_000.0
    }
}

/// Input of `createLnurlWithdraw`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawRequest {
    pub external_id: Option<String>,
    pub msatoshi: i64,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub webhook_url: Option<String>,
    pub btc_fallback_address: Option<String>,
    #[serde(default)]
    pub batch_fallback: bool,
}

/// LNURL-withdraw protocol response handed to the wallet (step 1)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequestParams {
    pub tag: &'static str,
    pub callback: String,
    pub k1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_description: Option<String>,
    pub min_withdrawable: i64,
    pub max_withdrawable: i64,
}

/// A record augmented with the decoded claim URL for convenience
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRecordView {
    #[serde(flatten)]
    pub record: WithdrawRecord,
    pub lnurl_decoded: String,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn record() -> WithdrawRecord {
        let now = Utc::now();
        WithdrawRecord {
            lnurl_withdraw_id: 1,
            external_id: None,
            secret_token: "s3cr3t".to_string(),
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

    #[test]
    fn test_expiry_requires_a_deadline() {
        let now = Utc::now();
        let mut r = record();
        assert!(!r.is_expired(now));

        r.expires_at = Some(now - Duration::hours(1));
        assert!(r.is_expired(now));

        r.expires_at = Some(now + Duration::hours(1));
        assert!(!r.is_expired(now));
    }

    #[test]
    fn test_needs_callback_predicate() {
        let mut r = record();
        assert!(!r.needs_callback());

        r.webhook_url = Some("https://example.com/hook".to_string());
        r.withdrawn_details = Some("{}".to_string());
        r.paid = true;
        assert!(r.needs_callback());

        r.paid_calledback = true;
        assert!(!r.needs_callback());

        // batched but not yet acknowledged
        r.batch_request_id = Some(77);
        assert!(r.needs_callback());
        r.batched_calledback = true;
        assert!(!r.needs_callback());

        r.deleted = true;
        r.batched_calledback = false;
        assert!(!r.needs_callback());
    }

    #[test]
    fn test_needs_fallback_predicate() {
        let now = Utc::now();
        let mut r = record();
        r.expires_at = Some(now - Duration::minutes(5));
        assert!(!r.needs_fallback(now));

        r.btc_fallback_address = Some("bc1q...".to_string());
        assert!(r.needs_fallback(now));

        r.paid = true;
        assert!(!r.needs_fallback(now));
    }

    #[test]
    fn test_btc_amount_conversion() {
        let mut r = record();
        r.msatoshi = 100_000_000_000;
        assert!((r.btc_amount() - 1.0).abs() < f64::EPSILON);
    }
}
