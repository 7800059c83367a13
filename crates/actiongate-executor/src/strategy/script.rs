//! Script actions run under an external Python interpreter.
//!
//! Parameters become variable assignments ahead of the snippet:
//!
//! ```text
//! name = 'world'
//! print(f"hello {name}")
//! ```

use std::path::Path;

use actiongate_core::Parameters;

use super::{StrategyContext, remove_scratch, scratch_file};
use crate::{
    CommandBuilder, Completed, ExecutionError,
    process::{CapturedOutput, run_captured},
};

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Run a snippet with the call's parameters bound as variables.
///
/// # Errors
/// Returns `ExecutableNotFound` if the interpreter is missing, `Timeout` on
/// expiry and spawn/IO errors. A non-zero exit is a completed run with a
/// failure.
pub async fn run(
    ctx: &StrategyContext<'_>,
    code: &str,
    params: &Parameters,
) -> Result<Completed, ExecutionError> {
    let source = format!("{}{code}\n", assignments(params));
    let path = scratch_file(&ctx.config.scratch_dir, ".py", &source, false)?;

    let result = run_file(ctx, &path).await;
    remove_scratch(path);

    Ok(result?.into_completed())
}

/// Interpreter argv (which may carry its own flags) followed by the script.
async fn run_file(ctx: &StrategyContext<'_>, path: &Path) -> Result<CapturedOutput, ExecutionError> {
    let parts = CommandBuilder::new(ctx.config.script_interpreter.as_str())
        .params([path.to_string_lossy()])
        .build()?;
    let parts = ctx.deadline.bound(parts.into_resolved()).await??;
    run_captured(&parts, &ctx.deadline).await
}

/// One `name = 'value'` line per parameter with a usable name.
fn assignments(params: &Parameters) -> String {
    let mut out = String::new();
    for (name, value) in params {
        if !is_identifier(name) {
            tracing::warn!(parameter = %name, "Skipping script parameter that is not a valid identifier");
            continue;
        }
        out.push_str(name);
        out.push_str(" = ");
        out.push_str(&quote(value));
        out.push('\n');
    }
    out
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !KEYWORDS.contains(&name)
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\x00"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{Deadline, ExecutorConfig};

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn python_available() -> bool {
        which::which("python3").is_ok()
    }

    async fn run_with(
        config: &ExecutorConfig,
        code: &str,
        params: &Parameters,
    ) -> Result<Completed, ExecutionError> {
        let client = reqwest::Client::new();
        let ctx = StrategyContext {
            config,
            client: &client,
            deadline: Deadline::after(config.timeout),
        };
        run(&ctx, code, params).await
    }

    #[test]
    fn test_assignments_quote_and_skip_bad_names() {
        let p = params(&[
            ("name", "it's"),
            ("path", "C:\\tmp\nx"),
            ("1bad", "x"),
            ("has-dash", "x"),
            ("class", "x"),
        ]);
        assert_eq!(
            assignments(&p),
            "name = 'it\\'s'\npath = 'C:\\\\tmp\\nx'\n"
        );
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("_private"));
        assert!(is_identifier("x1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("9x"));
        assert!(!is_identifier("é"));
        assert!(!is_identifier("None"));
    }

    #[tokio::test]
    async fn test_script_sees_parameters_and_cleans_up() {
        if !python_available() {
            eprintln!("skipping: python3 not on PATH");
            return;
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = ExecutorConfig::default().with_scratch_dir(scratch.path());

        let completed = run_with(
            &config,
            "print('hello ' + name)\nprint(len(quote))",
            &params(&[("name", "world"), ("quote", "a'b\"c")]),
        )
        .await
        .unwrap();

        assert!(completed.failure.is_none(), "{}", completed.output);
        assert_eq!(completed.output, "hello world\n5\n");
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_interpreter_flags_come_before_script() {
        if !python_available() {
            eprintln!("skipping: python3 not on PATH");
            return;
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = ExecutorConfig::default()
            .with_scratch_dir(scratch.path())
            .with_script_interpreter("python3 -I");

        let completed = run_with(
            &config,
            "import sys\nprint(sys.flags.isolated)",
            &Parameters::new(),
        )
        .await
        .unwrap();
        assert!(completed.failure.is_none(), "{}", completed.output);
        assert_eq!(completed.output, "1\n");
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_script_failure_keeps_output() {
        if !python_available() {
            eprintln!("skipping: python3 not on PATH");
            return;
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = ExecutorConfig::default().with_scratch_dir(scratch.path());

        let completed = run_with(&config, "print('partial')\nraise SystemExit(4)", &Parameters::new())
            .await
            .unwrap();
        assert!(completed.output.starts_with("partial\n"));
        assert!(matches!(
            completed.failure,
            Some(ExecutionError::NonZeroExit(4))
        ));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_script_timeout() {
        if !python_available() {
            eprintln!("skipping: python3 not on PATH");
            return;
        }
        let scratch = tempfile::tempdir().unwrap();
        let config = ExecutorConfig::default()
            .with_scratch_dir(scratch.path())
            .with_timeout(Duration::from_millis(500));

        let err = run_with(&config, "import time\ntime.sleep(20)", &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Timeout));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let scratch = tempfile::tempdir().unwrap();
        let config = ExecutorConfig::default()
            .with_scratch_dir(scratch.path())
            .with_script_interpreter("no-such-python-3141");

        let err = run_with(&config, "print(1)", &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::ExecutableNotFound(_)));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
