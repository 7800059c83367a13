//! Core data model and storage traits.

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::Parameters;

/// Action definition identifier.
pub type ActionId = i64;

/// Execution record identifier.
pub type ExecutionId = i64;

/// Execution strategy of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Shell command, single line or multi-line script.
    Shell,
    /// HTTP request described by a JSON config.
    Http,
    /// Snippet run under the embedded script interpreter.
    #[serde(alias = "python")]
    Script,
    /// JSON POST to a webhook URL.
    Webhook,
}

impl ActionKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 4] = [Self::Shell, Self::Http, Self::Script, Self::Webhook];

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Http => "http",
            Self::Script => "script",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A kind name that does not map to any strategy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported action kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ActionKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shell" => Ok(Self::Shell),
            "http" => Ok(Self::Http),
            "script" | "python" => Ok(Self::Script),
            "webhook" => Ok(Self::Webhook),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// A registered action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Internal identifier.
    pub id: ActionId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Caller-facing key. Unique and immutable.
    pub public_key: String,
    /// Informational endpoint path shown to operators.
    pub endpoint_path: String,
    /// Execution strategy.
    pub kind: ActionKind,
    /// Command, script or JSON config, depending on `kind`.
    pub content: String,
    /// Declared parameters (informational only).
    #[serde(default)]
    pub parameters: Parameters,
    /// Disabled actions reject invocations.
    pub is_active: bool,
    /// Whether invocations are written to the execution log.
    pub logging_enabled: bool,
    /// Completed invocations, successful or not.
    pub execution_count: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Mutable fields of an action, used for create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAction {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub endpoint_path: String,
    pub kind: ActionKind,
    pub content: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default = "default_true")]
    pub logging_enabled: bool,
}

/// Updates carry the same fields as creation; key and counters are never touched.
pub type ActionUpdate = NewAction;

const fn default_true() -> bool {
    true
}

/// Generate a fresh 32-character public key.
#[must_use]
pub fn generate_public_key() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Lifecycle state of an execution record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created before dispatch, not yet finalized.
    Running,
    /// Action completed successfully.
    Success,
    /// Action failed.
    Error,
}

impl ExecutionStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Final status for an outcome.
    #[must_use]
    pub const fn from_success(success: bool) -> Self {
        if success { Self::Success } else { Self::Error }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            other => Err(StorageError::Internal(format!("invalid execution status: {other}"))),
        }
    }
}

/// One logged invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub action_id: ActionId,
    pub public_key: String,
    pub parameters: Parameters,
    /// Strategy output; empty while running.
    pub result: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration, set on finalization.
    pub duration_ms: Option<u64>,
    pub error_message: String,
    pub request_ip: String,
}

/// Data for a new `running` execution record.
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub action_id: ActionId,
    pub public_key: String,
    pub parameters: Parameters,
    pub request_ip: String,
}

/// Final state written to an execution record.
#[derive(Debug, Clone)]
pub struct Finalization {
    pub status: ExecutionStatus,
    pub result: String,
    pub error_message: String,
    pub duration_ms: u64,
}

/// Execution record filter for queries.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    /// Filter by action.
    pub action_id: Option<ActionId>,
    /// Filter by public key.
    pub public_key: Option<String>,
    /// Limit results.
    pub limit: Option<usize>,
}

/// Aggregate counts over the execution log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total: u64,
    pub successful: u64,
}

impl ExecutionSummary {
    /// Success rate in percent, rounded to two decimals. Zero when nothing ran.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let rate = self.successful as f64 / self.total as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }
}

/// Storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Action not found: {0}")]
    ActionNotFound(ActionId),
    #[error("Execution record not found: {0}")]
    ExecutionNotFound(ExecutionId),
    #[error("Public key already in use: {0}")]
    DuplicateKey(String),
    #[error("Execution record already finalized: {0}")]
    AlreadyFinalized(ExecutionId),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Registry of action definitions.
#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Register a new action under a freshly generated public key.
    async fn create(&self, action: NewAction) -> Result<ActionDefinition, StorageError>;

    /// Get an action by ID.
    async fn get(&self, id: ActionId) -> Result<Option<ActionDefinition>, StorageError>;

    /// Get an action by public key.
    async fn find_by_key(&self, key: &str) -> Result<Option<ActionDefinition>, StorageError>;

    /// List every action, ascending by ID.
    async fn list(&self) -> Result<Vec<ActionDefinition>, StorageError>;

    /// Replace the mutable fields of an action.
    async fn update(
        &self,
        id: ActionId,
        update: ActionUpdate,
    ) -> Result<ActionDefinition, StorageError>;

    /// Delete an action.
    async fn delete(&self, id: ActionId) -> Result<(), StorageError>;

    /// Flip `is_active`, returning the new value.
    async fn toggle_active(&self, id: ActionId) -> Result<bool, StorageError>;

    /// Flip `logging_enabled`, returning the new value.
    async fn toggle_logging(&self, id: ActionId) -> Result<bool, StorageError>;

    /// Record one completed invocation.
    async fn increment_execution_count(&self, id: ActionId) -> Result<(), StorageError>;
}

/// Append-only log of invocations.
#[async_trait]
pub trait ExecutionLog: Send + Sync {
    /// Insert a `running` record.
    async fn append(&self, execution: NewExecution) -> Result<ExecutionId, StorageError>;

    /// Move a `running` record to its final state. Records are never finalized twice.
    async fn finalize(
        &self,
        id: ExecutionId,
        finalization: Finalization,
    ) -> Result<(), StorageError>;

    /// List records with optional filter, newest first.
    async fn list_executions(
        &self,
        filter: ExecutionFilter,
    ) -> Result<Vec<ExecutionRecord>, StorageError>;

    /// Delete one record.
    async fn delete_execution(&self, id: ExecutionId) -> Result<(), StorageError>;

    /// Delete every record of an action, returning how many were removed.
    async fn delete_executions_for(&self, action_id: ActionId) -> Result<u64, StorageError>;

    /// Aggregate counts.
    async fn summary(&self) -> Result<ExecutionSummary, StorageError>;
}

/// A backend that is both registry and log.
pub trait Storage: ActionStore + ExecutionLog {}

impl<T: ActionStore + ExecutionLog> Storage for T {}
