use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::instrument;

use crate::engine::BatchSettlementNotice;
use crate::error::AppError;
use crate::state::AppState;

/// POST webhook from the batching service once a batch containing one of
/// our fallback outputs is broadcast.
#[instrument(skip(state, notice), fields(batch_request_id = notice.batch_request_id))]
pub async fn handle_batch_webhook(
    State(state): State<AppState>,
    Json(notice): Json<BatchSettlementNotice>,
) -> Result<Json<Value>, AppError> {
    let record = state.engine.process_batch_webhook(notice).await?;
    Ok(Json(json!({
        "status": "OK",
        "lnurlWithdrawId": record.lnurl_withdraw_id,
    })))
}
