use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::error::AppError;
use crate::state::AppState;

/// Wallet step 1 query: the bech32-decoded claim URL carries `s`
#[derive(Debug, Deserialize)]
pub struct WithdrawRequestQuery {
    pub s: String,
}

/// Wallet step 2 query. `balanceNotify` is part of the LUD-14 extension;
/// accepted for compatibility, not acted on.
#[derive(Debug, Deserialize)]
pub struct WithdrawQuery {
    #[serde(default)]
    pub k1: String,
    #[serde(default)]
    pub pr: String,
    #[serde(rename = "balanceNotify")]
    pub balance_notify: Option<String>,
}

/// GET withdrawRequest?s=<token>. Answers the LNURL-withdraw parameter
/// object, or the protocol's `{"status":"ERROR"}` shape.
#[instrument(skip(state, query))]
pub async fn handle_withdraw_request(
    State(state): State<AppState>,
    Query(query): Query<WithdrawRequestQuery>,
) -> Response {
    match state.engine.process_withdraw_request(&query.s).await {
        Ok(params) => Json(params).into_response(),
        Err(e) => lnurl_error(e),
    }
}

/// GET withdraw?k1=<token>&pr=<invoice>. Pays the invoice and answers the
/// protocol's `{"status":"OK"}` on settlement.
#[instrument(skip(state, query))]
pub async fn handle_withdraw(
    State(state): State<AppState>,
    Query(query): Query<WithdrawQuery>,
) -> Response {
    if let Some(notify) = &query.balance_notify {
        debug!(balance_notify = %notify, "balanceNotify received and ignored");
    }

    match state.engine.process_withdraw(&query.k1, &query.pr).await {
        Ok(()) => Json(json!({ "status": "OK" })).into_response(),
        Err(e) => lnurl_error(e),
    }
}

/// Wallets only read the body, so protocol errors go out with the LNURL
/// error shape and the category's HTTP status.
fn lnurl_error(e: AppError) -> Response {
    let status = e.category.status_code();
    let body = json!({ "status": "ERROR", "reason": e.message });
    (status, Json(body)).into_response()
}
