//! External program execution shared by updaters and the ACME client.

use tokio::process::Command;
use tracing::{debug, trace};

use crate::errors::CommandError;

/// Run `command` to completion, failing on a non-zero exit.
///
/// Returns captured stdout.
pub(crate) async fn run(mut command: Command, program: &str) -> Result<String, CommandError> {
    trace!(program = %program, command = ?command, "Running external command");

    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(CommandError::Failed {
            program: program.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    debug!(program = %program, "External command succeeded");
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `sh -c <script>`
pub(crate) fn shell(script: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = run(shell("echo renewed"), "sh").await.unwrap();
        assert_eq!(out.trim(), "renewed");
    }

    #[tokio::test]
    async fn test_run_reports_status_and_stderr() {
        let err = run(shell("echo nope >&2; exit 3"), "sh").await.unwrap_err();
        match err {
            CommandError::Failed { status, stderr, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "nope");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = run(Command::new("/nonexistent/certkeeper-tool"), "tool")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
