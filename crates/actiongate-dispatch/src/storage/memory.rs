//! In-memory action registry and execution log.

use std::{
    collections::BTreeMap,
    sync::{
        RwLock,
        atomic::{AtomicI64, Ordering},
    },
};

use actiongate_core::{
    ActionDefinition, ActionId, ActionStore, ActionUpdate, ExecutionFilter, ExecutionId,
    ExecutionLog, ExecutionRecord, ExecutionStatus, ExecutionSummary, Finalization, NewAction,
    NewExecution, StorageError, generate_public_key,
};
use async_trait::async_trait;
use chrono::Utc;

/// In-memory storage implementation.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart.
pub struct MemoryStorage {
    actions: RwLock<BTreeMap<ActionId, ActionDefinition>>,
    executions: RwLock<BTreeMap<ExecutionId, ExecutionRecord>>,
    next_action_id: AtomicI64,
    next_execution_id: AtomicI64,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            actions: RwLock::new(BTreeMap::new()),
            executions: RwLock::new(BTreeMap::new()),
            next_action_id: AtomicI64::new(1),
            next_execution_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Internal(e.to_string())
}

#[async_trait]
impl ActionStore for MemoryStorage {
    async fn create(&self, action: NewAction) -> Result<ActionDefinition, StorageError> {
        let mut actions = self.actions.write().map_err(poisoned)?;

        let mut public_key = generate_public_key();
        while actions.values().any(|a| a.public_key == public_key) {
            public_key = generate_public_key();
        }

        let id = self.next_action_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let definition = ActionDefinition {
            id,
            name: action.name,
            description: action.description,
            public_key,
            endpoint_path: action.endpoint_path,
            kind: action.kind,
            content: action.content,
            parameters: action.parameters,
            is_active: true,
            logging_enabled: action.logging_enabled,
            execution_count: 0,
            created_at: now,
            updated_at: now,
        };
        actions.insert(id, definition.clone());
        Ok(definition)
    }

    async fn get(&self, id: ActionId) -> Result<Option<ActionDefinition>, StorageError> {
        Ok(self.actions.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<ActionDefinition>, StorageError> {
        Ok(self
            .actions
            .read()
            .map_err(poisoned)?
            .values()
            .find(|a| a.public_key == key)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<ActionDefinition>, StorageError> {
        Ok(self
            .actions
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        id: ActionId,
        update: ActionUpdate,
    ) -> Result<ActionDefinition, StorageError> {
        let mut actions = self.actions.write().map_err(poisoned)?;
        let action = actions
            .get_mut(&id)
            .ok_or(StorageError::ActionNotFound(id))?;

        action.name = update.name;
        action.description = update.description;
        action.endpoint_path = update.endpoint_path;
        action.kind = update.kind;
        action.content = update.content;
        action.parameters = update.parameters;
        action.logging_enabled = update.logging_enabled;
        action.updated_at = Utc::now();

        Ok(action.clone())
    }

    async fn delete(&self, id: ActionId) -> Result<(), StorageError> {
        self.actions
            .write()
            .map_err(poisoned)?
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::ActionNotFound(id))
    }

    async fn toggle_active(&self, id: ActionId) -> Result<bool, StorageError> {
        let mut actions = self.actions.write().map_err(poisoned)?;
        let action = actions
            .get_mut(&id)
            .ok_or(StorageError::ActionNotFound(id))?;
        action.is_active = !action.is_active;
        action.updated_at = Utc::now();
        Ok(action.is_active)
    }

    async fn toggle_logging(&self, id: ActionId) -> Result<bool, StorageError> {
        let mut actions = self.actions.write().map_err(poisoned)?;
        let action = actions
            .get_mut(&id)
            .ok_or(StorageError::ActionNotFound(id))?;
        action.logging_enabled = !action.logging_enabled;
        action.updated_at = Utc::now();
        Ok(action.logging_enabled)
    }

    async fn increment_execution_count(&self, id: ActionId) -> Result<(), StorageError> {
        let mut actions = self.actions.write().map_err(poisoned)?;
        let action = actions
            .get_mut(&id)
            .ok_or(StorageError::ActionNotFound(id))?;
        action.execution_count += 1;
        Ok(())
    }
}

#[async_trait]
impl ExecutionLog for MemoryStorage {
    async fn append(&self, execution: NewExecution) -> Result<ExecutionId, StorageError> {
        let id = self.next_execution_id.fetch_add(1, Ordering::Relaxed);
        let record = ExecutionRecord {
            id,
            action_id: execution.action_id,
            public_key: execution.public_key,
            parameters: execution.parameters,
            result: String::new(),
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            duration_ms: None,
            error_message: String::new(),
            request_ip: execution.request_ip,
        };
        self.executions
            .write()
            .map_err(poisoned)?
            .insert(id, record);
        Ok(id)
    }

    async fn finalize(
        &self,
        id: ExecutionId,
        finalization: Finalization,
    ) -> Result<(), StorageError> {
        let mut executions = self.executions.write().map_err(poisoned)?;
        let record = executions
            .get_mut(&id)
            .ok_or(StorageError::ExecutionNotFound(id))?;
        if record.status != ExecutionStatus::Running {
            return Err(StorageError::AlreadyFinalized(id));
        }

        record.status = finalization.status;
        record.result = finalization.result;
        record.error_message = finalization.error_message;
        record.duration_ms = Some(finalization.duration_ms);
        Ok(())
    }

    async fn list_executions(
        &self,
        filter: ExecutionFilter,
    ) -> Result<Vec<ExecutionRecord>, StorageError> {
        let executions = self.executions.read().map_err(poisoned)?;

        // Ids grow with time, so descending id is newest first.
        let matching = executions.values().rev().filter(|r| {
            filter.action_id.is_none_or(|id| r.action_id == id)
                && filter
                    .public_key
                    .as_ref()
                    .is_none_or(|key| &r.public_key == key)
        });

        Ok(match filter.limit {
            Some(limit) => matching.take(limit).cloned().collect(),
            None => matching.cloned().collect(),
        })
    }

    async fn delete_execution(&self, id: ExecutionId) -> Result<(), StorageError> {
        self.executions
            .write()
            .map_err(poisoned)?
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::ExecutionNotFound(id))
    }

    async fn delete_executions_for(&self, action_id: ActionId) -> Result<u64, StorageError> {
        let mut executions = self.executions.write().map_err(poisoned)?;
        let before = executions.len();
        executions.retain(|_, r| r.action_id != action_id);
        Ok((before - executions.len()) as u64)
    }

    async fn summary(&self) -> Result<ExecutionSummary, StorageError> {
        let executions = self.executions.read().map_err(poisoned)?;
        let successful = executions
            .values()
            .filter(|r| r.status == ExecutionStatus::Success)
            .count();
        Ok(ExecutionSummary {
            total: executions.len() as u64,
            successful: successful as u64,
        })
    }
}
