//! Public execute endpoint.

use actiongate_core::InvocationContext;
use actiongate_dispatch::DispatchResponse;
use axum::{
    Json,
    extract::{Query, State},
};

use crate::{auth::ClientIp, error::ApiError, state::AppState};

/// GET /execute?key=K&... - run the action behind `key`.
///
/// Every other query pair becomes a parameter. A failed run still answers
/// 200 with `success: false`.
pub async fn execute(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let key = pairs
        .iter()
        .find(|(name, _)| name == "key")
        .map(|(_, value)| value.clone())
        .ok_or_else(|| ApiError::bad_request("missing key"))?;

    let ctx = InvocationContext::from_query(pairs).with_request_ip(ip);
    let response = state.dispatcher.dispatch(&key, &ctx).await?;
    Ok(Json(response))
}
