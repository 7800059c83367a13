//! Shell selection and executable lookup.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

/// Returns the shell program and argument used for single-line commands.
///
/// Returns `(shell_program, shell_arg)` where:
/// - Windows: `("cmd", "/C")`
/// - Unix-like: `("/bin/sh", "-c")`
#[must_use]
pub fn get_shell_command() -> (String, &'static str) {
    if cfg!(windows) {
        ("cmd".into(), "/C")
    } else {
        UnixShell::command_shell().get_shell_command()
    }
}

/// Resolve an executable by name.
///
/// Explicit paths (absolute, pointing at a file) are returned as is; anything
/// else is looked up on the current `PATH` via `which`.
pub async fn resolve_executable_path(executable: &str) -> Option<PathBuf> {
    if executable.trim().is_empty() {
        return None;
    }

    let path = Path::new(executable);
    if path.is_absolute() && path.is_file() {
        return Some(path.to_path_buf());
    }

    which_async(executable).await
}

async fn which_async(executable: &str) -> Option<PathBuf> {
    let executable = executable.to_string();
    tokio::task::spawn_blocking(move || which::which(executable))
        .await
        .ok()
        .and_then(Result::ok)
}

/// Unix shells used to run actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnixShell {
    Bash(PathBuf),
    Sh(PathBuf),
}

impl UnixShell {
    /// Get the shell path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Bash(p) | Self::Sh(p) => p,
        }
    }

    /// Interpreter line for script files.
    #[must_use]
    pub fn shebang(&self) -> String {
        format!("#!{}", self.path().display())
    }

    /// Shell for single-line commands: `/bin/sh`.
    #[must_use]
    pub fn command_shell() -> Self {
        Self::from_path(Path::new("/bin/sh")).unwrap_or_else(|| Self::Sh(PathBuf::from("sh")))
    }

    /// Shell for multi-line scripts: bash when installed, `/bin/sh` otherwise.
    #[must_use]
    pub fn script_shell() -> Self {
        ["/bin/bash", "/usr/bin/bash"]
            .into_iter()
            .find_map(|p| Self::from_path(Path::new(p)))
            .unwrap_or_else(Self::command_shell)
    }

    /// Create from a path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        if path.is_absolute() && path.is_file() {
            let path_buf = path.to_path_buf();
            if path.file_name() == Some(OsStr::new("bash")) {
                Some(Self::Bash(path_buf))
            } else {
                Some(Self::Sh(path_buf))
            }
        } else {
            None
        }
    }

    /// Get shell command tuple.
    #[must_use]
    pub fn get_shell_command(&self) -> (String, &'static str) {
        (self.path().to_string_lossy().into_owned(), "-c")
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_command_shell_is_sh() {
        let (program, arg) = get_shell_command();
        assert!(program.ends_with("sh"));
        assert_eq!(arg, "-c");
    }

    #[test]
    fn test_script_shell_shebang() {
        let shell = UnixShell::script_shell();
        assert!(shell.shebang().starts_with("#!"));
        assert!(shell.shebang().ends_with("sh"));
    }

    #[test]
    fn test_from_path_rejects_relative() {
        assert_eq!(UnixShell::from_path(Path::new("bash")), None);
    }

    #[tokio::test]
    async fn test_resolve_executable_path() {
        assert!(resolve_executable_path("sh").await.is_some());
        assert!(resolve_executable_path("   ").await.is_none());
        assert!(
            resolve_executable_path("definitely-not-a-real-binary-4821")
                .await
                .is_none()
        );
    }
}
