//! Core abstractions for keyed remote actions.
//!
//! This crate provides the fundamental building blocks:
//! - `ActionDefinition` / `ActionKind` - What an action is and how it runs
//! - `ExecutionRecord` - One logged invocation
//! - `InvocationContext` - Caller-supplied parameters and origin
//! - Storage traits for the action registry and the execution log

pub mod context;
pub mod traits;

pub use context::{InvocationContext, Parameters};
pub use traits::{
    ActionDefinition, ActionId, ActionKind, ActionStore, ActionUpdate, ExecutionFilter,
    ExecutionId, ExecutionLog, ExecutionRecord, ExecutionStatus, ExecutionSummary, Finalization,
    NewAction, NewExecution, Storage, StorageError, UnknownKind, generate_public_key,
};
