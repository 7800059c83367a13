use actiongate_core::StorageError;
use actiongate_dispatch::DispatchError;
use actiongate_session::SessionError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Error type for HTTP responses. Every variant renders as `{"error": msg}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotLoggedIn => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Dispatch(DispatchError::UnknownKey) => StatusCode::NOT_FOUND,
            Self::Dispatch(DispatchError::Disabled) => StatusCode::FORBIDDEN,
            Self::Dispatch(DispatchError::Storage(e)) | Self::Storage(e) => storage_status(e),
            Self::Dispatch(DispatchError::Task(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Session(e) if e.is_unauthorized() => StatusCode::UNAUTHORIZED,
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

const fn storage_status(e: &StorageError) -> StatusCode {
    match e {
        StorageError::ActionNotFound(_) | StorageError::ExecutionNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        StorageError::DuplicateKey(_) | StorageError::AlreadyFinalized(_) => {
            StatusCode::CONFLICT
        }
        StorageError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(DispatchError::UnknownKey).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DispatchError::Disabled).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(SessionError::SessionExpired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(SessionError::Internal("poisoned".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(StorageError::ActionNotFound(3)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(DispatchError::Storage(StorageError::Internal("db".into()))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_message_is_sub_reason() {
        assert_eq!(
            ApiError::from(SessionError::NoSuchSession).to_string(),
            "no such session"
        );
        assert_eq!(
            ApiError::from(DispatchError::Disabled).to_string(),
            "action is disabled"
        );
    }
}
