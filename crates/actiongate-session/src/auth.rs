//! Operator credential check.
//!
//! There is a single operator identity. Its password is configured either in
//! plain text (accepted for compatibility, with a warning) or as
//! `sha256:<hex digest>`. Both sides are hashed before comparison.

use std::{fmt, str::FromStr};

use constant_time_eq::constant_time_eq;
use sha2::{Digest, Sha256};

use crate::SessionError;

const SHA256_PREFIX: &str = "sha256:";

/// Lowercase hex SHA-256 digest of a password.
#[must_use]
pub fn sha256_hex(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Configured form of the operator password.
#[derive(Clone, PartialEq, Eq)]
pub enum PasswordSecret {
    Plain(String),
    /// Lowercase hex SHA-256 digest.
    Sha256(String),
}

impl PasswordSecret {
    fn digest(&self) -> String {
        match self {
            Self::Plain(password) => sha256_hex(password),
            Self::Sha256(hex) => hex.clone(),
        }
    }
}

impl fmt::Debug for PasswordSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain(***)"),
            Self::Sha256(hex) => write!(f, "Sha256({hex})"),
        }
    }
}

impl FromStr for PasswordSecret {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(hex) = s.strip_prefix(SHA256_PREFIX) else {
            return Ok(Self::Plain(s.to_string()));
        };

        let hex = hex.trim().to_ascii_lowercase();
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SessionError::InvalidSecret(
                "sha256 secret must be 64 hex characters".into(),
            ));
        }
        Ok(Self::Sha256(hex))
    }
}

/// Checks credentials against the configured operator.
#[derive(Debug, Clone)]
pub struct Authenticator {
    username: String,
    digest: String,
}

impl Authenticator {
    #[must_use]
    pub fn new(username: impl Into<String>, secret: &PasswordSecret) -> Self {
        let username = username.into();
        if matches!(secret, PasswordSecret::Plain(_)) {
            tracing::warn!(
                %username,
                "Operator password is configured in plain text; prefer sha256:<hex>"
            );
        }
        Self {
            username,
            digest: secret.digest(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Verify a username/password pair.
    ///
    /// Both parts are compared in constant time and always both checked.
    ///
    /// # Errors
    /// Returns `InvalidCredentials` if either part does not match.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<(), SessionError> {
        let password_ok = constant_time_eq(sha256_hex(password).as_bytes(), self.digest.as_bytes());
        let username_ok = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        if username_ok & password_ok {
            Ok(())
        } else {
            tracing::warn!(%username, "Rejected login attempt");
            Err(SessionError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN123_SHA256: &str =
        "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9";

    #[test]
    fn test_sha256_hex() {
        assert_eq!(sha256_hex("admin123"), ADMIN123_SHA256);
    }

    #[test]
    fn test_plain_secret() {
        let secret: PasswordSecret = "admin123".parse().unwrap();
        assert_eq!(secret, PasswordSecret::Plain("admin123".into()));
        assert_eq!(format!("{secret:?}"), "Plain(***)");

        let auth = Authenticator::new("admin", &secret);
        assert!(auth.authenticate("admin", "admin123").is_ok());
        assert_eq!(
            auth.authenticate("admin", "wrong"),
            Err(SessionError::InvalidCredentials)
        );
        assert_eq!(
            auth.authenticate("root", "admin123"),
            Err(SessionError::InvalidCredentials)
        );
    }

    #[test]
    fn test_hashed_secret() {
        let secret: PasswordSecret = format!("sha256:{}", ADMIN123_SHA256.to_uppercase())
            .parse()
            .unwrap();
        assert_eq!(secret, PasswordSecret::Sha256(ADMIN123_SHA256.into()));

        let auth = Authenticator::new("admin", &secret);
        assert_eq!(auth.username(), "admin");
        assert!(auth.authenticate("admin", "admin123").is_ok());
        // The digest itself is not a password.
        assert!(auth.authenticate("admin", ADMIN123_SHA256).is_err());
    }

    #[test]
    fn test_near_miss_credentials_rejected() {
        let auth = Authenticator::new("admin", &PasswordSecret::Sha256(ADMIN123_SHA256.into()));
        for (user, password) in [
            ("admin", "admin12"),
            ("admin", "admin1234"),
            ("Admin", "admin123"),
            ("admi", "admin123"),
            ("", ""),
        ] {
            assert_eq!(
                auth.authenticate(user, password),
                Err(SessionError::InvalidCredentials),
                "{user}/{password}"
            );
        }
    }

    #[test]
    fn test_malformed_hashed_secret() {
        assert!(matches!(
            "sha256:abc".parse::<PasswordSecret>(),
            Err(SessionError::InvalidSecret(_))
        ));
        assert!(matches!(
            format!("sha256:{}", "z".repeat(64)).parse::<PasswordSecret>(),
            Err(SessionError::InvalidSecret(_))
        ));
    }
}
