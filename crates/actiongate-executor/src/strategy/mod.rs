//! One execution strategy per action kind.

pub mod http;
pub mod script;
pub mod shell;
pub mod webhook;

use std::{io::Write, path::Path};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tempfile::TempPath;

use crate::{Deadline, ExecutionError, ExecutorConfig};

const SCRATCH_PREFIX: &str = "actiongate-";

/// Everything a strategy needs for one call.
#[derive(Debug)]
pub struct StrategyContext<'a> {
    pub config: &'a ExecutorConfig,
    pub client: &'a reqwest::Client,
    pub deadline: Deadline,
}

/// Parse JSON action content into a strategy config.
pub(crate) fn parse_content<T: DeserializeOwned>(content: &str) -> Result<T, ExecutionError> {
    serde_json::from_str(content)
        .map_err(|e| ExecutionError::MalformedConfig(format!("content is not valid JSON: {e}")))
}

pub(crate) fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Write `contents` to a fresh file in `dir`.
///
/// The returned path deletes the file when dropped.
pub(crate) fn scratch_file(
    dir: &Path,
    suffix: &str,
    contents: &str,
    executable: bool,
) -> Result<TempPath, ExecutionError> {
    let mut file = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .suffix(suffix)
        .tempfile_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;

    #[cfg(unix)]
    if executable {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    let _ = executable;

    Ok(file.into_temp_path())
}

/// Delete a scratch file now, logging rather than failing on error.
pub(crate) fn remove_scratch(path: TempPath) {
    let shown = path.display().to_string();
    if let Err(e) = path.close() {
        tracing::warn!(path = %shown, "Failed to remove scratch file: {e}");
    }
}

/// Whether a status code is in `[200, 300)`.
pub(crate) const fn is_success_status(status: u16) -> bool {
    200 <= status && status < 300
}
