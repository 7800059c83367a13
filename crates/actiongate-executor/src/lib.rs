//! Execution engine for keyed remote actions.
//!
//! Provides:
//! - Parameter templating for commands, URLs and JSON payloads
//! - A pluggable command safety policy (best-effort denylist, not a sandbox)
//! - Deadline-bounded process and HTTP execution
//! - `ActionExecutor` - one entry point dispatching to the four strategies

pub mod command;
pub mod error;
pub mod executor;
pub mod policy;
pub mod process;
pub mod shell;
pub mod strategy;
pub mod template;

pub use command::{CommandBuilder, CommandParts};
pub use error::{Completed, ExecutionError, ExecutionOutcome};
pub use executor::{ActionExecutor, ExecutorConfig, WebhookTemplating};
pub use policy::{AllowAllPolicy, CommandPolicy, DenyListPolicy, PolicyDecision};
pub use process::Deadline;
