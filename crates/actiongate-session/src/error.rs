//! Session and credential errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no such session")]
    NoSuchSession,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid password secret: {0}")]
    InvalidSecret(String),
    #[error("session store error: {0}")]
    Internal(String),
}

impl SessionError {
    /// Whether this is a rejection of the caller rather than a server fault.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::NoSuchSession | Self::SessionExpired | Self::InvalidCredentials
        )
    }
}
