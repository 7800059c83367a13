//! Operator session cookie and request origin.

use std::{convert::Infallible, net::SocketAddr};

use actiongate_core::context::UNKNOWN_IP;
use actiongate_session::ClientContext;
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::ApiError, state::AppState};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_id";

/// User agent recorded when the request sends none.
pub const UNKNOWN_AGENT: &str = "unknown";

/// Address of the peer, or `"unknown"` when the server was not started with
/// connect info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(peer_ip(&parts.extensions)))
    }
}

fn peer_ip(extensions: &axum::http::Extensions) -> String {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_IP.to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}

/// Origin details recorded on a new session.
#[must_use]
pub fn client_context(ip: &ClientIp, headers: &HeaderMap) -> ClientContext {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(UNKNOWN_AGENT);
    ClientContext::new(ip.0.clone(), user_agent)
}

/// Value of the session cookie, if the request carries one.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|part| {
            part.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
        })
        .filter(|token| !token.is_empty())
}

/// `Set-Cookie` value that installs a session token.
#[must_use]
pub fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}")
}

/// `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

/// Axum middleware that admits only requests with a live operator session.
///
/// A valid session is refreshed and made available to handlers as an
/// `Extension<Session>`. Anything else gets a 401 with the reason.
pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(token) = session_token(req.headers()).map(str::to_owned) else {
        return ApiError::NotLoggedIn.into_response();
    };
    let ip = peer_ip(req.extensions());

    match state.sessions.validate(&token, &ip) {
        Ok(session) => {
            req.extensions_mut().insert(session);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(%ip, "Rejected management request: {e}");
            ApiError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_session_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session_id=abc123; other=1"),
        );
        assert_eq!(session_token(&headers), Some("abc123"));

        headers.insert(header::COOKIE, HeaderValue::from_static("session_idx=nope"));
        assert_eq!(session_token(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("session_id="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = session_cookie("tok", 900);
        assert!(cookie.starts_with("session_id=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=900"));
        assert!(expired_session_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn test_client_context_defaults_user_agent() {
        let ip = ClientIp("10.0.0.1".into());
        let ctx = client_context(&ip, &HeaderMap::new());
        assert_eq!(ctx.ip, "10.0.0.1");
        assert_eq!(ctx.user_agent, UNKNOWN_AGENT);

        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.5"));
        assert_eq!(client_context(&ip, &headers).user_agent, "curl/8.5");
    }
}
