//! Batch start, status and cancellation handlers.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use gbphub_core::error::AppError;
use gbphub_core::types::BatchId;
use gbphub_entity::batch::Workload;
use gbphub_worker::StartOutcome;

use crate::dto::request::StartBatchRequest;
use crate::dto::response::{
    ApiResponse, BatchStartedResponse, BatchStatusResponse, CancelResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

fn parse_workload(raw: &str) -> Result<Workload, AppError> {
    raw.parse::<Workload>().map_err(AppError::not_found)
}

/// POST /api/batches/{workload}
pub async fn start_batch(
    State(state): State<AppState>,
    Path(workload): Path<String>,
    body: Option<Json<StartBatchRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<BatchStartedResponse>>), ApiError> {
    let workload = parse_workload(&workload)?;
    let filter = body.map(|Json(b)| b).unwrap_or_default().into_filter()?;
    let runner = state.registry.get(workload)?;

    match runner.start(filter).await? {
        StartOutcome::Started(started) => Ok((
            StatusCode::ACCEPTED,
            Json(ApiResponse::ok(started.into())),
        )),
        StartOutcome::NothingToDo => Err(AppError::not_found(format!(
            "No eligible {workload} items: nothing to update"
        ))
        .into()),
    }
}

/// GET /api/batches/{workload}/{id}
pub async fn get_batch(
    State(state): State<AppState>,
    Path((workload, id)): Path<(String, Uuid)>,
) -> Result<Json<ApiResponse<BatchStatusResponse>>, ApiError> {
    let workload = parse_workload(&workload)?;
    let runner = state.registry.get(workload)?;

    let snapshot = runner
        .status(BatchId::from_uuid(id))
        .await?
        .ok_or_else(|| AppError::not_found(format!("Batch {id} not found")))?;

    Ok(Json(ApiResponse::ok(snapshot.into())))
}

/// POST /api/batches/{workload}/{id}/cancel
pub async fn cancel_batch(
    State(state): State<AppState>,
    Path((workload, id)): Path<(String, Uuid)>,
) -> Result<(StatusCode, Json<ApiResponse<CancelResponse>>), ApiError> {
    let workload = parse_workload(&workload)?;
    let runner = state.registry.get(workload)?;

    runner.cancel(BatchId::from_uuid(id)).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(CancelResponse {
            batch_id: id,
            message: "Cancellation requested; the batch stops before its next item".to_string(),
        })),
    ))
}
