//! Management of action definitions and their logs.

use actiongate_core::{
    ActionDefinition, ActionId, ActionStore, ExecutionFilter, ExecutionLog, StorageError,
};
use axum::{
    Form, Json,
    extract::{Path, Query, State},
};
use serde_json::{Value, json};

use crate::{
    error::ApiError,
    protocol::{
        ActionDetail, ActionForm, ActionLogs, ActionSummary, ApiInfo, CreatedAction,
        ExecutionView, LogQuery,
    },
    state::AppState,
};

const DEFAULT_LOG_LIMIT: usize = 20;

async fn load(state: &AppState, id: ActionId) -> Result<ActionDefinition, ApiError> {
    state
        .storage()
        .get(id)
        .await?
        .ok_or(ApiError::Storage(StorageError::ActionNotFound(id)))
}

/// GET /api/definitions
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ActionSummary>>, ApiError> {
    let actions = state.storage().list().await?;
    Ok(Json(actions.iter().map(ActionSummary::from).collect()))
}

/// POST /api/definitions
pub async fn create(
    State(state): State<AppState>,
    Form(form): Form<ActionForm>,
) -> Result<Json<CreatedAction>, ApiError> {
    let action = state.storage().create(form.into_new_action()?).await?;
    tracing::info!(action_id = action.id, name = %action.name, kind = %action.kind, "Created action");

    Ok(Json(CreatedAction {
        success: true,
        message: "action created".into(),
        api_key: action.public_key,
        id: action.id,
    }))
}

/// GET /api/definitions/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<ActionId>,
) -> Result<Json<ActionDetail>, ApiError> {
    let action = load(&state, id).await?;
    Ok(Json(ActionDetail::from(&action)))
}

/// PUT /api/definitions/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<ActionId>,
    Form(form): Form<ActionForm>,
) -> Result<Json<Value>, ApiError> {
    let update = form.into_new_action()?;
    let action = state.storage().update(id, update).await?;
    tracing::info!(action_id = id, name = %action.name, "Updated action");
    Ok(Json(json!({ "success": true, "message": "action updated" })))
}

/// DELETE /api/definitions/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<ActionId>,
) -> Result<Json<Value>, ApiError> {
    state.storage().delete(id).await?;
    tracing::info!(action_id = id, "Deleted action");
    Ok(Json(json!({ "success": true, "message": "action deleted" })))
}

/// PUT /api/definitions/{id}/toggle
pub async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<ActionId>,
) -> Result<Json<Value>, ApiError> {
    let is_active = state.storage().toggle_active(id).await?;
    tracing::info!(action_id = id, is_active, "Toggled action");
    Ok(Json(json!({ "success": true, "is_active": is_active })))
}

/// PUT /api/definitions/{id}/toggle-logging
pub async fn toggle_logging(
    State(state): State<AppState>,
    Path(id): Path<ActionId>,
) -> Result<Json<Value>, ApiError> {
    let enable_logging = state.storage().toggle_logging(id).await?;
    let message = if enable_logging {
        "logging enabled"
    } else {
        "logging disabled"
    };
    Ok(Json(json!({
        "success": true,
        "enable_logging": enable_logging,
        "message": message,
    })))
}

/// GET /api/definitions/{id}/logs?limit=20
pub async fn logs(
    State(state): State<AppState>,
    Path(id): Path<ActionId>,
    Query(query): Query<LogQuery>,
) -> Result<Json<ActionLogs>, ApiError> {
    let action = load(&state, id).await?;
    let records = state
        .storage()
        .list_executions(ExecutionFilter {
            action_id: Some(id),
            public_key: None,
            limit: Some(query.limit.unwrap_or(DEFAULT_LOG_LIMIT)),
        })
        .await?;

    Ok(Json(ActionLogs {
        api_info: ApiInfo {
            id: action.id,
            name: action.name,
            description: action.description,
            endpoint_path: action.endpoint_path,
        },
        logs: records.into_iter().map(ExecutionView::from).collect(),
    }))
}

/// DELETE /api/definitions/{id}/logs
pub async fn clear_logs(
    State(state): State<AppState>,
    Path(id): Path<ActionId>,
) -> Result<Json<Value>, ApiError> {
    let action = load(&state, id).await?;
    let deleted_count = state.storage().delete_executions_for(action.id).await?;
    tracing::info!(action_id = id, deleted_count, "Cleared execution logs");
    Ok(Json(json!({
        "success": true,
        "message": format!("deleted {deleted_count} log records"),
        "deleted_count": deleted_count,
    })))
}
