use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::backend::{LnPayRequest, PayAttempt, PayListEntry, PaymentBackend};
use crate::batcher::{BatchClient, BatchEnqueued, BatchRequest};
use crate::config::Config;
use crate::engine::WithdrawEngine;
use crate::router::build_router;
use crate::state::AppState;
use crate::store::MemoryWithdrawStore;
use crate::webhooks::WebhookSender;

struct HappyBackend;

#[async_trait]
impl PaymentBackend for HappyBackend {
    async fn ln_pay(&self, _req: &LnPayRequest) -> Result<Value> {
        Ok(json!({ "payment_hash": "aa11", "status": "complete" }))
    }

    async fn ln_list_pays(&self, _bolt11: &str) -> Result<Vec<PayListEntry>> {
        Ok(vec![])
    }

    async fn ln_pay_status(&self, _bolt11: &str) -> Result<Vec<PayAttempt>> {
        Err(anyhow!("pay status unavailable"))
    }

    async fn spend(&self, _address: &str, _amount_btc: f64) -> Result<Value> {
        Ok(json!({ "status": "accepted" }))
    }
}

struct NopBatcher;

#[async_trait]
impl BatchClient for NopBatcher {
    async fn queue_for_next_batch(&self, _req: &BatchRequest) -> Result<BatchEnqueued> {
        Ok(BatchEnqueued {
            batch_request_id: 1,
            raw: json!({ "batchRequestId": 1 }),
        })
    }
}

struct NopWebhooks;

#[async_trait]
impl WebhookSender for NopWebhooks {
    async fn post_json(&self, _url: &str, _payload: &Value) -> Result<bool> {
        Ok(true)
    }
}

fn app() -> Router {
    let config = Config::default();
    let engine = Arc::new(WithdrawEngine::new(
        Arc::new(MemoryWithdrawStore::new()),
        Arc::new(HappyBackend),
        Arc::new(NopBatcher),
        Arc::new(NopWebhooks),
        config.clone(),
    ));
    let state = AppState::new(engine, PathBuf::from("/tmp/lnurld-test.toml"));
    build_router(&config, state)
}

async fn rpc(app: &Router, method: &str, params: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "id": 1, "method": method, "params": params }).to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_endpoint_responds() {
    let app = app();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn rpc_create_and_get_round_trip() {
    let app = app();

    let (status, body) = rpc(
        &app,
        "createLnurlWithdraw",
        json!({ "msatoshi": 5000, "description": "beer" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let created = &body["result"];
    assert!(created["lnurl"].as_str().unwrap().starts_with("LNURL"));
    let id = created["lnurlWithdrawId"].as_i64().unwrap();

    let (status, body) = rpc(&app, "getLnurlWithdraw", json!({ "lnurlWithdrawId": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["msatoshi"], 5000);
    assert_eq!(body["result"]["lnurlDecoded"], created["lnurlDecoded"]);
}

#[tokio::test]
async fn rpc_unknown_method_is_a_validation_error() {
    let app = app();
    let (status, body) = rpc(&app, "mintCoins", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(body["id"], 1);
}

#[tokio::test]
async fn rpc_bech32_helpers_round_trip() {
    let app = app();
    let url = "https://service.example/lnservice/withdrawRequest?s=abc";

    let (status, body) = rpc(&app, "encodeBech32", json!({ "s": url })).await;
    assert_eq!(status, StatusCode::OK);
    let lnurl = body["result"]["lnurl"].as_str().unwrap().to_string();

    let (status, body) = rpc(&app, "decodeBech32", json!({ "s": lnurl })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["url"], url);
}

#[tokio::test]
async fn wallet_flow_over_http() {
    let app = app();

    let (_, body) = rpc(&app, "createLnurlWithdraw", json!({ "msatoshi": 5000 })).await;
    let token = body["result"]["secretToken"].as_str().unwrap().to_string();

    let (status, body) =
        get(&app, &format!("/lnservice/withdrawRequest?s={}", token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tag"], "withdrawRequest");
    assert_eq!(body["k1"], token);
    assert_eq!(body["minWithdrawable"], 5000);

    let (status, body) = get(
        &app,
        &format!("/lnservice/withdraw?k1={}&pr=lnbc1invoice", token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");

    // Settled: a second claim answers the LNURL error shape
    let (status, body) = get(
        &app,
        &format!("/lnservice/withdraw?k1={}&pr=lnbc1other", token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "ERROR");
    assert!(body["reason"].as_str().unwrap().contains("paid"));
}

#[tokio::test]
async fn wallet_error_uses_lnurl_shape() {
    let app = app();
    let (status, body) = get(&app, "/lnservice/withdrawRequest?s=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "ERROR");
}
