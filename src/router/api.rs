use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::engine::BatchSettlementNotice;
use crate::error::AppError;
use crate::lnurl;
use crate::model::CreateWithdrawRequest;
use crate::state::AppState;

/// Envelope of one JSON-RPC request on the operator API
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Operator API entry point. Dispatches on `method`; a success answers
/// `{id, result}` with 200, a failure `{id, error}` with the category's
/// HTTP status.
#[instrument(skip(state, req), fields(method = %req.method))]
pub async fn handle_rpc(
    State(state): State<AppState>,
    Json(req): Json<RpcRequest>,
) -> Response {
    let id = req.id.clone();
    match dispatch(&state, req).await {
        Ok(result) => Json(json!({ "id": id, "result": result })).into_response(),
        Err(e) => rpc_error(id, e),
    }
}

async fn dispatch(state: &AppState, req: RpcRequest) -> Result<Value, AppError> {
    match req.method.as_str() {
        "createLnurlWithdraw" => {
            let params: CreateWithdrawRequest = parse_params(req.params)?;
            let view = state.engine.create_withdraw(params).await?;
            Ok(serde_json::to_value(view)?)
        }
        "getLnurlWithdraw" => {
            let id = id_param(&req.params)?;
            let view = state.engine.get_withdraw(id).await?;
            Ok(serde_json::to_value(view)?)
        }
        "deleteLnurlWithdraw" => {
            let id = id_param(&req.params)?;
            let record = state.engine.delete_withdraw(id).await?;
            Ok(serde_json::to_value(record)?)
        }
        "forceFallback" => {
            let id = id_param(&req.params)?;
            let record = state.engine.force_fallback(id).await?;
            Ok(serde_json::to_value(record)?)
        }
        "processCallbacks" => {
            let processed = state.engine.process_callbacks().await?;
            Ok(json!({ "processed": processed }))
        }
        "processFallbacks" => {
            let processed = state.engine.process_fallbacks().await?;
            Ok(json!({ "processed": processed }))
        }
        "processBatchWebhook" => {
            let notice: BatchSettlementNotice = parse_params(req.params)?;
            let record = state.engine.process_batch_webhook(notice).await?;
            Ok(serde_json::to_value(record)?)
        }
        "encodeBech32" => {
            let s = string_param(&req.params, "s")?;
            let encoded = lnurl::encode(&s)
                .map_err(|e| AppError::validation_error(format!("cannot encode: {}", e)))?;
            Ok(json!({ "lnurl": encoded }))
        }
        "decodeBech32" => {
            let s = string_param(&req.params, "s")?;
            let decoded = lnurl::decode(&s)
                .map_err(|e| AppError::validation_error(format!("cannot decode: {}", e)))?;
            Ok(json!({ "url": decoded }))
        }
        "reloadConfig" => {
            let config = state.engine.reload_config(&state.config_path).await?;
            Ok(serde_json::to_value(config)?)
        }
        other => Err(AppError::validation_error(format!(
            "unknown method: {}",
            other
        ))),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, AppError> {
    serde_json::from_value(params)
        .map_err(|e| AppError::validation_error(format!("invalid params: {}", e)))
}

/// Accepts `{"lnurlWithdrawId": n}` or a bare number
fn id_param(params: &Value) -> Result<i64, AppError> {
    params
        .get("lnurlWithdrawId")
        .or(Some(params))
        .and_then(Value::as_i64)
        .ok_or_else(|| AppError::validation_error("lnurlWithdrawId is required"))
}

fn string_param(params: &Value, key: &str) -> Result<String, AppError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::validation_error(format!("{} is required", key)))
}

fn rpc_error(id: Value, e: AppError) -> Response {
    let status = e.category.status_code();
    let body = json!({
        "id": id,
        "error": {
            "code": e.category.rpc_code(),
            "message": e.message,
            "data": e.details,
        }
    });
    (status, Json(body)).into_response()
}
