//! Command building utilities.

use std::{path::PathBuf, process::Stdio};

use thiserror::Error;
use tokio::process::Command;

use crate::{ExecutionError, shell::resolve_executable_path};

/// Command build error.
#[derive(Debug, Error)]
pub enum CommandBuildError {
    #[error("Base command cannot be parsed: {0}")]
    InvalidBase(String),
    #[error("Base command is empty after parsing")]
    EmptyCommand,
    #[error("Executable not found: {0}")]
    NotFound(String),
}

impl From<CommandBuildError> for ExecutionError {
    fn from(e: CommandBuildError) -> Self {
        match e {
            CommandBuildError::NotFound(program) => Self::ExecutableNotFound(program),
            other => Self::MalformedConfig(other.to_string()),
        }
    }
}

/// Parsed command parts (program + args).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandParts {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandParts {
    /// Create new command parts.
    #[must_use]
    pub const fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Resolve the program to an absolute path.
    ///
    /// # Errors
    /// Returns error if executable not found.
    pub async fn into_resolved(self) -> Result<Self, CommandBuildError> {
        let Self { program, args } = self;
        let executable: PathBuf = resolve_executable_path(&program)
            .await
            .ok_or(CommandBuildError::NotFound(program))?;
        Ok(Self::new(executable.to_string_lossy().into_owned(), args))
    }

    /// Build a process command with piped output and no stdin.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

/// Builder for interpreter command lines such as `python3 -u`.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    /// Base executable command, shell-word split on build.
    pub base: String,
    /// Optional parameters to append.
    pub params: Option<Vec<String>>,
}

impl CommandBuilder {
    /// Create a new command builder.
    #[must_use]
    pub fn new<S: Into<String>>(base: S) -> Self {
        Self {
            base: base.into(),
            params: None,
        }
    }

    /// Add parameters.
    #[must_use]
    pub fn params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.params = Some(params.into_iter().map(Into::into).collect());
        self
    }

    /// Build the command parts.
    ///
    /// # Errors
    /// Returns error if the base cannot be split or is empty.
    pub fn build(&self) -> Result<CommandParts, CommandBuildError> {
        let mut parts = split_command_line(&self.base)?;
        if let Some(ref params) = self.params {
            parts.extend(params.iter().cloned());
        }

        if parts.is_empty() {
            return Err(CommandBuildError::EmptyCommand);
        }

        let program = parts.remove(0);
        Ok(CommandParts::new(program, parts))
    }
}

fn split_command_line(input: &str) -> Result<Vec<String>, CommandBuildError> {
    let parts =
        shlex::split(input).ok_or_else(|| CommandBuildError::InvalidBase(input.to_string()))?;
    if parts.is_empty() {
        Err(CommandBuildError::EmptyCommand)
    } else {
        Ok(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_splits_base_and_appends_params() {
        let parts = CommandBuilder::new("python3 -u -X utf8")
            .params(["/tmp/a b.py"])
            .build()
            .unwrap();
        assert_eq!(parts.program, "python3");
        assert_eq!(parts.args, vec!["-u", "-X", "utf8", "/tmp/a b.py"]);
    }

    #[test]
    fn test_build_honours_quotes() {
        let parts = CommandBuilder::new("'/opt/my python/bin/python' -q")
            .build()
            .unwrap();
        assert_eq!(parts.program, "/opt/my python/bin/python");
        assert_eq!(parts.args, vec!["-q"]);
    }

    #[test]
    fn test_build_rejects_empty_and_unbalanced() {
        assert!(matches!(
            CommandBuilder::new("   ").build(),
            Err(CommandBuildError::EmptyCommand)
        ));
        assert!(matches!(
            CommandBuilder::new("python3 'oops").build(),
            Err(CommandBuildError::InvalidBase(_))
        ));
    }

    #[tokio::test]
    async fn test_into_resolved_reports_missing_program() {
        let parts = CommandParts::new("no-such-interpreter-9917".into(), vec![]);
        let err = parts.into_resolved().await.unwrap_err();
        let err: ExecutionError = err.into();
        assert_eq!(
            err.to_string(),
            "executable not found: no-such-interpreter-9917"
        );
    }
}
