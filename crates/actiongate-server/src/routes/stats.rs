use actiongate_core::{ActionStore, ExecutionLog};
use axum::{Json, extract::State};

use crate::{error::ApiError, protocol::Stats, state::AppState};

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<Stats>, ApiError> {
    let storage = state.storage();
    let actions = storage.list().await?;
    let summary = storage.summary().await?;

    Ok(Json(Stats {
        total_apis: actions.len(),
        active_apis: actions.iter().filter(|a| a.is_active).count(),
        total_executions: summary.total,
        successful_executions: summary.successful,
        success_rate: summary.success_rate(),
    }))
}
