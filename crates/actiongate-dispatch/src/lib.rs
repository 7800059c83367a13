//! Action dispatch and storage for actiongate.
//!
//! Provides:
//! - `Dispatcher` - Resolve a key, run the action, record the outcome
//! - Storage implementations (memory, SQLite)

pub mod dispatcher;
pub mod storage;

pub use dispatcher::{DispatchError, DispatchResponse, Dispatcher};
