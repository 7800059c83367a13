//! In-memory session store with sliding idle expiry.
//!
//! A session stays valid while `now - last_activity_at` is at most the idle
//! timeout. Each successful validation moves `last_activity_at` to now.
//! Expired sessions are removed when next presented or by a sweep. All
//! access goes through one mutex, so a sweep can never race a validation.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use rand::RngCore;
use serde::Serialize;

use crate::{Clock, SessionError, SystemClock};

/// Idle time after which a session expires.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15 * 60);

const TOKEN_BYTES: usize = 32;

/// Where a request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub ip: String,
    pub user_agent: String,
}

impl ClientContext {
    #[must_use]
    pub fn new(ip: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: user_agent.into(),
        }
    }
}

/// A logged-in operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    #[serde(skip)]
    pub token: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub client_ip: String,
    pub user_agent: String,
}

pub struct SessionStore<C: Clock = SystemClock> {
    sessions: Mutex<HashMap<String, Session>>,
    clock: C,
    idle_timeout: TimeDelta,
}

impl SessionStore<SystemClock> {
    #[must_use]
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> SessionStore<C> {
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            idle_timeout: to_delta(DEFAULT_IDLE_TIMEOUT),
        }
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = to_delta(idle_timeout);
        self
    }

    #[must_use]
    pub const fn idle_timeout(&self) -> TimeDelta {
        self.idle_timeout
    }

    /// Start a session and return its token.
    ///
    /// # Errors
    /// Returns `Internal` if the store lock is poisoned.
    pub fn create(&self, username: &str, client: &ClientContext) -> Result<String, SessionError> {
        let now = self.clock.now();
        let mut sessions = self.lock()?;

        let mut token = generate_token();
        while sessions.contains_key(&token) {
            token = generate_token();
        }

        sessions.insert(
            token.clone(),
            Session {
                token: token.clone(),
                username: username.to_string(),
                created_at: now,
                last_activity_at: now,
                client_ip: client.ip.clone(),
                user_agent: client.user_agent.clone(),
            },
        );
        tracing::info!(%username, ip = %client.ip, "Session created");
        Ok(token)
    }

    /// Check a token and refresh its activity time.
    ///
    /// A changed client IP is logged but not rejected.
    ///
    /// # Errors
    /// Returns `NoSuchSession` for unknown tokens and `SessionExpired` (after
    /// removing the session) once the idle timeout has passed.
    pub fn validate(&self, token: &str, client_ip: &str) -> Result<Session, SessionError> {
        let now = self.clock.now();
        let mut sessions = self.lock()?;

        let session = sessions.get_mut(token).ok_or(SessionError::NoSuchSession)?;
        if now - session.last_activity_at > self.idle_timeout {
            let username = session.username.clone();
            sessions.remove(token);
            tracing::info!(%username, "Session expired");
            return Err(SessionError::SessionExpired);
        }

        if session.client_ip != client_ip {
            tracing::debug!(
                username = %session.username,
                login_ip = %session.client_ip,
                request_ip = %client_ip,
                "Session used from a different address"
            );
        }
        session.last_activity_at = now;
        Ok(session.clone())
    }

    /// End a session. Unknown tokens are ignored.
    ///
    /// # Errors
    /// Returns `Internal` if the store lock is poisoned.
    pub fn logout(&self, token: &str) -> Result<bool, SessionError> {
        let removed = self.lock()?.remove(token);
        if let Some(session) = &removed {
            tracing::info!(username = %session.username, "Session logged out");
        }
        Ok(removed.is_some())
    }

    /// Remove every expired session, returning how many were removed.
    ///
    /// # Errors
    /// Returns `Internal` if the store lock is poisoned.
    pub fn sweep_expired(&self) -> Result<usize, SessionError> {
        let now = self.clock.now();
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, s| now - s.last_activity_at <= self.idle_timeout);
        Ok(before - sessions.len())
    }

    /// Number of sessions currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map_or(0, |s| s.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>, SessionError> {
        self.sessions
            .lock()
            .map_err(|e| SessionError::Internal(e.to_string()))
    }
}

impl<C: Clock + std::fmt::Debug> std::fmt::Debug for SessionStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .field("clock", &self.clock)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
