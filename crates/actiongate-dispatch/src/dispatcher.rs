//! Dispatcher: resolve a public key, run the action and record the outcome.

use std::{sync::Arc, time::Instant};

use actiongate_core::{
    ActionDefinition, ExecutionId, ExecutionStatus, Finalization, InvocationContext,
    NewExecution, Parameters, Storage, StorageError,
};
use actiongate_executor::{ActionExecutor, ExecutionOutcome};
use serde::{Deserialize, Serialize};

/// Dispatch error. Raised before any execution is attempted.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid action key")]
    UnknownKey,
    #[error("action is disabled")]
    Disabled,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("dispatch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// What a caller of the execute endpoint gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub success: bool,
    pub result: String,
    pub error_message: String,
    /// Wall-clock milliseconds from lookup to finalization.
    pub execution_time: u64,
    pub api_name: String,
}

/// Routes invocations from a public key to the executor and the execution log.
#[derive(Clone)]
pub struct Dispatcher {
    storage: Arc<dyn Storage>,
    executor: ActionExecutor,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a new dispatcher.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, executor: ActionExecutor) -> Self {
        Self { storage, executor }
    }

    /// Backing registry and log.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    #[must_use]
    pub const fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Run the action behind `key` with the caller's parameters.
    ///
    /// Lookup and activation are checked first. After that the call always
    /// produces a response: the execution count is bumped once and, when the
    /// action logs, its record is finalized, whatever the outcome.
    ///
    /// # Errors
    /// Returns `UnknownKey` or `Disabled` before anything runs, `Storage`
    /// if the lookup or the initial log write fails, and `Task` if the run
    /// panicked.
    pub async fn dispatch(
        &self,
        key: &str,
        ctx: &InvocationContext,
    ) -> Result<DispatchResponse, DispatchError> {
        let started = Instant::now();

        let action = self
            .storage
            .find_by_key(key)
            .await?
            .ok_or(DispatchError::UnknownKey)?;
        if !action.is_active {
            tracing::info!(action_id = action.id, "Rejected call to disabled action");
            return Err(DispatchError::Disabled);
        }

        // Detached from the caller: a dropped request must still count and
        // finalize its record.
        let this = self.clone();
        let parameters = ctx.parameters.clone();
        let request_ip = ctx.request_ip.clone();
        let run = tokio::spawn(async move {
            this.run(action, parameters, request_ip, started).await
        });
        run.await?
    }

    async fn run(
        &self,
        action: ActionDefinition,
        parameters: Parameters,
        request_ip: String,
        started: Instant,
    ) -> Result<DispatchResponse, DispatchError> {
        let record = if action.logging_enabled {
            Some(
                self.storage
                    .append(NewExecution {
                        action_id: action.id,
                        public_key: action.public_key.clone(),
                        parameters: parameters.clone(),
                        request_ip,
                    })
                    .await?,
            )
        } else {
            None
        };

        let outcome = self
            .executor
            .execute(action.kind, &action.content, &parameters)
            .await;
        let execution_time = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.record_completion(&action, record, &outcome, execution_time)
            .await;

        tracing::info!(
            action_id = action.id,
            name = %action.name,
            success = outcome.success,
            execution_time,
            "Dispatched action"
        );

        Ok(DispatchResponse {
            success: outcome.success,
            result: outcome.output,
            error_message: outcome.error_message,
            execution_time,
            api_name: action.name,
        })
    }

    /// Count the invocation and finalize its record.
    ///
    /// The action has already run, so bookkeeping failures are logged rather
    /// than returned.
    async fn record_completion(
        &self,
        action: &ActionDefinition,
        record: Option<ExecutionId>,
        outcome: &ExecutionOutcome,
        duration_ms: u64,
    ) {
        if let Err(e) = self.storage.increment_execution_count(action.id).await {
            tracing::error!(action_id = action.id, "Failed to count execution: {e}");
        }

        if let Some(id) = record {
            let finalization = Finalization {
                status: ExecutionStatus::from_success(outcome.success),
                result: outcome.output.clone(),
                error_message: outcome.error_message.clone(),
                duration_ms,
            };
            if let Err(e) = self.storage.finalize(id, finalization).await {
                tracing::error!(execution_id = id, "Failed to finalize execution record: {e}");
            }
        }
    }
}
