//! Session authentication for the management API.
//!
//! Provides:
//! - `SessionStore` - in-memory sessions with sliding idle expiry
//! - `Clock` - injectable time source (`SystemClock`, `ManualClock`)
//! - `Authenticator` - the single configured operator identity
//! - `spawn_sweeper` - periodic removal of expired sessions

pub mod auth;
pub mod clock;
pub mod error;
pub mod store;
pub mod sweeper;

pub use auth::{Authenticator, PasswordSecret, sha256_hex};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use store::{ClientContext, DEFAULT_IDLE_TIMEOUT, Session, SessionStore};
pub use sweeper::{DEFAULT_SWEEP_INTERVAL, MIN_SWEEP_INTERVAL, spawn_sweeper};
