use service_core::error::AppError;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Command timed out after {} seconds", .0.as_secs())]
    TimedOut(Duration),

    /// The program ran and exited non-zero.
    #[error("Command failed: {stderr}")]
    Failed { program: String, stderr: String },
}

impl From<CommandError> for AppError {
    fn from(err: CommandError) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

/// Runs external tools with a hard timeout.
#[derive(Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn execute(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
    ) -> Result<Output, CommandError> {
        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        tracing::debug!(
            program = %program,
            args = ?args,
            timeout_secs = %self.timeout.as_secs(),
            "Executing command"
        );

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| CommandError::TimedOut(self.timeout))?
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                program = %program,
                args = ?args,
                stderr = %stderr,
                "Command failed"
            );
            return Err(CommandError::Failed {
                program: program.to_string(),
                stderr,
            });
        }

        tracing::debug!(
            program = %program,
            output_size = output.stdout.len(),
            "Command succeeded"
        );

        Ok(output)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let executor = CommandExecutor::new(Duration::from_secs(5));
        let output = executor.execute("echo", &["hello"], None).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn non_zero_exit_is_failed() {
        let executor = CommandExecutor::new(Duration::from_secs(5));
        let err = executor
            .execute("sh", &["-c", "echo broken >&2; exit 3"], None)
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Failed { ref stderr, .. } if stderr == "broken"));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let executor = CommandExecutor::new(Duration::from_secs(5));
        let err = executor
            .execute("definitely-not-a-real-binary-7f3a", &[], None)
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let executor = CommandExecutor::new(Duration::from_millis(100));
        let err = executor.execute("sleep", &["5"], None).await.unwrap_err();
        assert!(matches!(err, CommandError::TimedOut(_)));
    }
}
