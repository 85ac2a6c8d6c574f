//! Shell tool — execute system commands.
//!
//! Output is stdout, then stderr under a separator, then the exit code when
//! non-zero, capped at a configured number of characters. Failures are
//! reported as text so the agent can read them.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use cogloop_config::ShellConfig;
use cogloop_core::error::ToolError;
use cogloop_core::tool::{Tool, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

/// Execution limits for one command.
#[derive(Debug, Clone)]
pub struct ShellOptions {
    pub timeout: Duration,
    pub max_output_chars: usize,
    pub working_dir: Option<PathBuf>,
}

impl From<&ShellConfig> for ShellOptions {
    fn from(config: &ShellConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_chars: config.max_output_chars,
            working_dir: config.working_dir.clone(),
        }
    }
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self::from(&ShellConfig::default())
    }
}

/// Run `command` with `sh -c` and render the outcome as text.
///
/// Never fails: spawn errors and timeouts come back as messages. The child
/// is killed when the timeout fires.
pub async fn run_shell(command: &str, options: &ShellOptions) -> String {
    debug!(command = %command, "Executing shell command");

    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]).kill_on_drop(true);
    if let Some(dir) = &options.working_dir {
        cmd.current_dir(dir);
    }

    let output = match tokio::time::timeout(options.timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(command = %command, error = %e, "Failed to spawn command");
            return format!("Error executing command: {e}");
        }
        Err(_) => {
            warn!(command = %command, timeout_secs = options.timeout.as_secs(), "Command timed out");
            return format!(
                "Command timed out after {} seconds",
                options.timeout.as_secs()
            );
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    let mut text = stdout.into_owned();
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push_str("\n--- STDERR ---\n");
        }
        text.push_str(&stderr);
    }

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        debug!(command = %command, exit_code = code, "Command exited non-zero");
        text.push_str(&format!("\n[Exit code: {code}]"));
    }

    let text = truncate_chars(text, options.max_output_chars);
    if text.is_empty() {
        "(no output)".into()
    } else {
        text
    }
}

fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}\n...[output truncated at {max} chars]", &text[..cut]),
        None => text,
    }
}

/// Execute shell commands on behalf of the agent.
pub struct ShellTool {
    options: ShellOptions,
}

impl ShellTool {
    pub fn new(options: ShellOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its stdout and stderr. Use this for running programs, inspecting files, installing packages and checking system state."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Maximum time to wait for the command",
                    "default": self.options.timeout.as_secs()
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        let mut options = self.options.clone();
        if let Some(secs) = arguments["timeout_seconds"].as_u64() {
            options.timeout = Duration::from_secs(secs);
        }

        Ok(ToolResult::ok(run_shell(command, &options).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ShellOptions {
        ShellOptions::default()
    }

    #[tokio::test]
    async fn execute_echo() {
        let tool = ShellTool::new(options());
        let result = tool
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello\n");
    }

    #[tokio::test]
    async fn stderr_follows_separator() {
        let output = run_shell("echo out; echo err >&2", &options()).await;
        assert_eq!(output, "out\n\n--- STDERR ---\nerr\n");
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let output = run_shell("exit 3", &options()).await;
        assert_eq!(output, "\n[Exit code: 3]");
    }

    #[tokio::test]
    async fn empty_output_placeholder() {
        assert_eq!(run_shell("true", &options()).await, "(no output)");
    }

    #[tokio::test]
    async fn long_output_is_truncated() {
        let opts = ShellOptions {
            max_output_chars: 10,
            ..options()
        };
        let output = run_shell("printf 'abcdefghijklmnop'", &opts).await;
        assert_eq!(output, "abcdefghij\n...[output truncated at 10 chars]");
    }

    #[tokio::test]
    async fn timeout_message() {
        let opts = ShellOptions {
            timeout: Duration::from_secs(1),
            ..options()
        };
        let output = run_shell("sleep 5", &opts).await;
        assert_eq!(output, "Command timed out after 1 seconds");
    }

    #[tokio::test]
    async fn working_dir_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let opts = ShellOptions {
            working_dir: Some(dir.path().to_path_buf()),
            ..options()
        };
        assert_eq!(run_shell("ls", &opts).await, "marker.txt\n");
    }

    #[tokio::test]
    async fn missing_command_is_invalid() {
        let tool = ShellTool::new(options());
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "ééééé".to_string();
        assert_eq!(
            truncate_chars(text, 2),
            "éé\n...[output truncated at 2 chars]"
        );
        assert_eq!(truncate_chars("abc".into(), 3), "abc");
    }
}
