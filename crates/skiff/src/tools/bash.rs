use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use super::{parse_input, ToolContext, ToolExecutor};
use crate::config::MAX_BASH_TIMEOUT_SECS;
use crate::errors::ToolError;
use crate::models::tool::Tool;
use crate::security::{check_command_safety, check_read_only_command};

#[derive(Deserialize)]
struct BashInput {
    command: String,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

pub struct BashTool;

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    match (stdout.trim_end().is_empty(), stderr.trim_end().is_empty()) {
        (true, true) => String::new(),
        (false, true) => stdout.trim_end().to_string(),
        (true, false) => stderr.trim_end().to_string(),
        (false, false) => format!("{}\n{}", stdout.trim_end(), stderr.trim_end()),
    }
}

#[async_trait]
impl ToolExecutor for BashTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "bash",
            "Run a shell command in the workspace root with sh -c. Output is stdout followed by stderr.",
            json!({
                "type": "object",
                "required": ["command"],
                "properties": {
                    "command": {"type": "string", "description": "The shell command to run."},
                    "timeout_secs": {"type": "integer", "description": "Timeout in seconds, at most 600."}
                }
            }),
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let input: BashInput = parse_input(input)?;
        if input.command.trim().is_empty() {
            return Err(ToolError::InvalidParameters(
                "command must not be empty".to_string(),
            ));
        }

        check_command_safety(&input.command)?;
        if ctx.capability.read_only_shell() {
            check_read_only_command(&input.command)?;
        }

        let timeout = input
            .timeout_secs
            .unwrap_or(ctx.config.bash_timeout_secs)
            .clamp(1, MAX_BASH_TIMEOUT_SECS);

        debug!(command = %input.command, timeout, "running shell command");
        let child = Command::new("sh")
            .arg("-c")
            .arg(&input.command)
            .current_dir(ctx.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionError(format!("Failed to start shell: {}", e)))?;

        // Dropping the wait future on timeout kills the child
        let output = tokio::time::timeout(Duration::from_secs(timeout), child.wait_with_output())
            .await
            .map_err(|_| ToolError::ExecutionError(format!("Command timed out after {}s", timeout)))?
            .map_err(|e| ToolError::ExecutionError(e.to_string()))?;

        let combined = combine_output(&output.stdout, &output.stderr);
        if output.status.success() {
            if combined.is_empty() {
                Ok("(no output)".to_string())
            } else {
                Ok(combined)
            }
        } else {
            let status = match output.status.code() {
                Some(code) => format!("exit code {}", code),
                None => "terminated by signal".to_string(),
            };
            Err(ToolError::ExecutionError(format!(
                "Command failed with {}\n{}",
                status, combined
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;
    use crate::state::SessionState;
    use crate::subagent::AgentType;
    use crate::tools::Capability;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context(dir: &TempDir, capability: Capability) -> ToolContext {
        let config = AgentConfig::default();
        let state = Arc::new(SessionState::new(&config));
        ToolContext {
            capability,
            ..ToolContext::new(dir.path(), config, state)
        }
    }

    #[tokio::test]
    async fn test_runs_in_sandbox_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let ctx = context(&dir, Capability::Main);

        let output = BashTool
            .execute(json!({"command": "ls; echo oops >&2"}), &ctx)
            .await
            .unwrap();
        assert_eq!(output, "marker.txt\noops");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error_with_output() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, Capability::Main);
        let err = BashTool
            .execute(json!({"command": "echo partial; exit 3"}), &ctx)
            .await
            .unwrap_err();
        let rendered = err.render();
        assert!(rendered.contains("exit code 3"));
        assert!(rendered.contains("partial"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, Capability::Main);
        let err = BashTool
            .execute(json!({"command": "sleep 5", "timeout_secs": 1}), &ctx)
            .await
            .unwrap_err();
        assert!(err.render().contains("timed out after 1s"));
    }

    #[tokio::test]
    async fn test_dangerous_command_refused() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, Capability::Main);
        let err = BashTool
            .execute(json!({"command": "rm -rf /"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Security(_)));
    }

    #[tokio::test]
    async fn test_explore_agent_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir, Capability::Subagent(AgentType::Explore));
        let err = BashTool
            .execute(json!({"command": "touch new.txt"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.render().contains("not allowed in read-only mode"));
        assert!(!dir.path().join("new.txt").exists());

        let output = BashTool
            .execute(json!({"command": "pwd"}), &ctx)
            .await
            .unwrap();
        assert!(!output.is_empty());
    }
}
