//! Shell actions: a single command line or a multi-line script.

use actiongate_core::Parameters;

use super::{StrategyContext, remove_scratch, scratch_file};
use crate::{
    CommandParts, Completed, ExecutionError, PolicyDecision,
    process::run_captured,
    shell::{UnixShell, get_shell_command},
    template::substitute,
};

/// Substitute parameters, check the policy and run the command.
///
/// # Errors
/// Returns `SafetyBlocked` before anything is spawned when the policy rejects
/// the substituted command, `Timeout` on deadline expiry, or a spawn/IO error.
pub async fn run(
    ctx: &StrategyContext<'_>,
    command: &str,
    params: &Parameters,
) -> Result<Completed, ExecutionError> {
    let command = substitute(command, params);

    if let PolicyDecision::Block { pattern } = ctx.config.policy.evaluate(&command) {
        tracing::warn!(%pattern, "Shell command blocked by safety policy");
        return Err(ExecutionError::SafetyBlocked { pattern });
    }

    if command.trim().contains('\n') {
        run_script(ctx, &command).await
    } else {
        run_line(ctx, &command).await
    }
}

async fn run_line(ctx: &StrategyContext<'_>, command: &str) -> Result<Completed, ExecutionError> {
    let (shell, arg) = get_shell_command();
    let parts = CommandParts::new(shell, vec![arg.to_string(), command.to_string()]);
    Ok(run_captured(&parts, &ctx.deadline).await?.into_completed())
}

async fn run_script(ctx: &StrategyContext<'_>, script: &str) -> Result<Completed, ExecutionError> {
    if cfg!(windows) {
        return Err(ExecutionError::MalformedConfig(
            "multi-line shell scripts require a Unix shell".into(),
        ));
    }

    let shell = UnixShell::script_shell();
    let source = format!("{}\nset -e\n{script}\n", shell.shebang());
    let path = scratch_file(&ctx.config.scratch_dir, ".sh", &source, true)?;
    tracing::debug!(script = %path.display(), shell = %shell.path().display(), "Running shell script");

    let parts = CommandParts::new(
        shell.path().to_string_lossy().into_owned(),
        vec![path.to_string_lossy().into_owned()],
    );
    let result = run_captured(&parts, &ctx.deadline).await;
    remove_scratch(path);

    Ok(result?.into_completed())
}
