//! Shared process-invocation helper for tool adapters.

use crate::error::EngineError;
use std::io::ErrorKind;
use std::process::Command;

/// Run a tool to completion, mapping exit status and a missing binary to
/// typed errors. Stdout is discarded; stderr is captured for diagnostics.
pub(crate) fn run_tool(mut command: Command, tool: &str) -> Result<(), EngineError> {
    tracing::debug!(tool, ?command, "invoking external tool");
    let output = command.output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            EngineError::tool_not_found(tool)
        } else {
            EngineError::Io(e)
        }
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(5)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join(" | ");
        return Err(EngineError::invocation_failed(
            tool,
            output.status.code().unwrap_or(-1),
            tail,
        ));
    }
    Ok(())
}
