//! Operator login, logout and session lookup.

use actiongate_session::Session;
use axum::{
    Extension, Form, Json,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use serde_json::json;

use crate::{
    auth::{self, ClientIp},
    error::ApiError,
    protocol::{LoginForm, SessionInfo},
    state::AppState,
};

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .authenticator
        .authenticate(&form.username, &form.password)?;

    let client = auth::client_context(&ip, &headers);
    let token = state.sessions.create(&form.username, &client)?;
    let cookie = auth::session_cookie(&token, state.sessions.idle_timeout().num_seconds());

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "message": "logged in" })),
    ))
}

/// POST /logout. Succeeds with or without a session.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = auth::session_token(&headers) {
        state.sessions.logout(token)?;
    }
    Ok((
        [(header::SET_COOKIE, auth::expired_session_cookie())],
        Json(json!({ "success": true, "message": "logged out" })),
    ))
}

/// GET /api/session
pub async fn current(Extension(session): Extension<Session>) -> Json<SessionInfo> {
    Json(SessionInfo::from(&session))
}
