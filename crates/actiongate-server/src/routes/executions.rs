//! Execution log across all actions.

use actiongate_core::{ExecutionFilter, ExecutionId, ExecutionLog};
use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::{Value, json};

use crate::{
    error::ApiError,
    protocol::{ExecutionView, LogQuery},
    state::AppState,
};

const DEFAULT_LIMIT: usize = 50;

/// GET /api/executions?limit=50&api_key=K
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<ExecutionView>>, ApiError> {
    let filter = ExecutionFilter {
        action_id: None,
        public_key: query.api_key.filter(|k| !k.is_empty()),
        limit: Some(query.limit.unwrap_or(DEFAULT_LIMIT)),
    };
    let records = state.storage().list_executions(filter).await?;
    Ok(Json(records.into_iter().map(ExecutionView::from).collect()))
}

/// DELETE /api/executions/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ExecutionId>,
) -> Result<Json<Value>, ApiError> {
    state.storage().delete_execution(id).await?;
    tracing::info!(execution_id = id, "Deleted execution record");
    Ok(Json(json!({ "success": true, "message": "execution record deleted" })))
}
