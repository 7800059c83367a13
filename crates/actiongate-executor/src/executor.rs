//! `ActionExecutor` - the single entry point for running an action.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use actiongate_core::{ActionKind, Parameters};

use crate::{
    CommandPolicy, Deadline, DenyListPolicy, ExecutionError, ExecutionOutcome,
    strategy::{self, StrategyContext},
};

/// Default wall-clock budget for one execution.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interpreter for script actions.
pub const DEFAULT_SCRIPT_INTERPRETER: &str = "python3";

/// How placeholders are applied to webhook payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WebhookTemplating {
    /// Substitute inside string values only; the payload always stays valid JSON.
    #[default]
    StringLeaves,
    /// Substitute on the serialized payload text, then parse it again.
    RawText,
}

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub timeout: Duration,
    /// Interpreter command line for script actions, e.g. `python3 -u`.
    pub script_interpreter: String,
    /// Where shell and script temp files are created.
    pub scratch_dir: PathBuf,
    pub policy: Arc<dyn CommandPolicy>,
    pub webhook_templating: WebhookTemplating,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            script_interpreter: DEFAULT_SCRIPT_INTERPRETER.to_string(),
            scratch_dir: std::env::temp_dir(),
            policy: Arc::new(DenyListPolicy::default()),
            webhook_templating: WebhookTemplating::default(),
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_script_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.script_interpreter = interpreter.into();
        self
    }

    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.scratch_dir = dir.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: impl CommandPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    #[must_use]
    pub const fn with_webhook_templating(mut self, templating: WebhookTemplating) -> Self {
        self.webhook_templating = templating;
        self
    }
}

/// Runs actions of every kind.
///
/// Cheap to clone; clones share the configuration and the HTTP connection
/// pool. Calls are independent and may run concurrently.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    config: Arc<ExecutorConfig>,
    client: reqwest::Client,
}

impl ActionExecutor {
    /// Create an executor with its own HTTP client.
    ///
    /// # Errors
    /// Returns `Transport` if the HTTP client cannot be initialised.
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutionError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ExecutionError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(config, client))
    }

    /// Create an executor around an existing HTTP client.
    #[must_use]
    pub fn with_client(config: ExecutorConfig, client: reqwest::Client) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run one action.
    ///
    /// Never fails: every error is folded into the returned outcome.
    #[tracing::instrument(name = "execute_action", skip_all, fields(kind = %kind))]
    pub async fn execute(
        &self,
        kind: ActionKind,
        content: &str,
        params: &Parameters,
    ) -> ExecutionOutcome {
        let started = Instant::now();
        let ctx = StrategyContext {
            config: &self.config,
            client: &self.client,
            deadline: Deadline::after(self.config.timeout),
        };

        let result = match kind {
            ActionKind::Shell => strategy::shell::run(&ctx, content, params).await,
            ActionKind::Http => strategy::http::run(&ctx, content, params).await,
            ActionKind::Script => strategy::script::run(&ctx, content, params).await,
            ActionKind::Webhook => strategy::webhook::run(&ctx, content, params).await,
        };
        let outcome = ExecutionOutcome::from(result);

        let elapsed_ms = started.elapsed().as_millis();
        if outcome.success {
            tracing::info!(success = true, elapsed_ms, "Action executed");
        } else {
            tracing::warn!(
                success = false,
                elapsed_ms,
                error = %outcome.error_message,
                "Action failed"
            );
        }
        outcome
    }

    /// Run one action whose kind is given as text.
    ///
    /// An unrecognised kind yields an `UnsupportedKind` outcome with empty
    /// output.
    pub async fn execute_named(
        &self,
        kind: &str,
        content: &str,
        params: &Parameters,
    ) -> ExecutionOutcome {
        match kind.parse::<ActionKind>() {
            Ok(kind) => self.execute(kind, content, params).await,
            Err(unknown) => {
                let error = ExecutionError::UnsupportedKind(unknown.0);
                tracing::warn!("{error}");
                ExecutionOutcome::rejected(&error)
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::AllowAllPolicy;

    fn executor(config: ExecutorConfig) -> ActionExecutor {
        ActionExecutor::new(config).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ExecutorConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.script_interpreter, "python3");
        assert_eq!(config.webhook_templating, WebhookTemplating::StringLeaves);
        assert!(matches!(
            config.policy.evaluate("rm -rf /"),
            crate::PolicyDecision::Block { .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let outcome = executor(ExecutorConfig::default())
            .execute_named("ftp", "anything", &Parameters::new())
            .await;
        assert!(!outcome.success);
        assert!(outcome.output.is_empty());
        assert_eq!(outcome.error_message, "unsupported action kind: ftp");
    }

    #[tokio::test]
    async fn test_named_kind_is_case_insensitive() {
        let outcome = executor(ExecutorConfig::default())
            .execute_named("SHELL", "echo ok", &Parameters::new())
            .await;
        assert!(outcome.success, "{}", outcome.error_message);
        assert_eq!(outcome.output.trim(), "ok");
    }

    #[tokio::test]
    async fn test_blocked_command_outcome() {
        let outcome = executor(ExecutorConfig::default())
            .execute(ActionKind::Shell, "sudo ls", &Parameters::new())
            .await;
        assert!(!outcome.success);
        assert!(outcome.output.is_empty());
        assert_eq!(
            outcome.error_message,
            "command blocked by safety policy: sudo "
        );
    }

    #[tokio::test]
    async fn test_allow_all_policy() {
        let scratch = tempfile::tempdir().unwrap();
        let victim = scratch.path().join("victim");
        std::fs::create_dir(&victim).unwrap();

        let outcome = executor(ExecutorConfig::default().with_policy(AllowAllPolicy))
            .execute(
                ActionKind::Shell,
                &format!("rm -rf {}", victim.display()),
                &Parameters::new(),
            )
            .await;
        assert!(outcome.success, "{}", outcome.error_message);
        assert!(!victim.exists());
    }

    #[tokio::test]
    async fn test_timeout_outcome() {
        let outcome = executor(ExecutorConfig::default().with_timeout(Duration::from_millis(200)))
            .execute(ActionKind::Shell, "sleep 10", &Parameters::new())
            .await;
        assert!(!outcome.success);
        assert!(outcome.output.is_empty());
        assert_eq!(outcome.error_message, "timeout");
    }

    #[tokio::test]
    async fn test_malformed_http_content() {
        let outcome = executor(ExecutorConfig::default())
            .execute(ActionKind::Http, "{broken", &Parameters::new())
            .await;
        assert!(!outcome.success);
        assert!(outcome.error_message.starts_with("malformed action content"));
    }

    #[tokio::test]
    async fn test_concurrent_executions_are_independent() {
        let executor = executor(ExecutorConfig::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let executor = executor.clone();
                tokio::spawn(async move {
                    let params = Parameters::from([("n".to_string(), i.to_string())]);
                    executor.execute(ActionKind::Shell, "echo {n}", &params).await
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let outcome = handle.await.unwrap();
            assert!(outcome.success);
            assert_eq!(outcome.output, format!("{i}\n"));
        }
    }
}
