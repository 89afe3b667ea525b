//! The `bash` tool. Despite the API name the model expects, it runs
//! PowerShell on Windows hosts; non-Windows hosts fall back to `sh` so
//! the tool stays exercisable in development.

use super::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default command timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Output beyond this many bytes is truncated with a system note.
const MAX_OUTPUT_BYTES: usize = 16_384;

pub struct ShellTool {
    timeout: Duration,
}

impl Default for ShellTool {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ShellTool {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run_command(&self, command: &str) -> ToolResult {
        debug!(command, "shell tool call");
        let mut child = match shell_command(command).spawn() {
            Ok(child) => child,
            Err(e) => {
                return ToolResult::error(format!("Failed to run shell command: {e}"));
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ToolResult::error(format!("Failed to run shell command: {e}"));
            }
            Err(_) => {
                // wait_with_output consumed the child; the kill-on-drop
                // flag set in shell_command reaps the process.
                warn!(command, "shell command timed out");
                return ToolResult::error(format!(
                    "Command timed out after {} seconds",
                    self.timeout.as_secs()
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let (stdout, truncated_out) = truncate(&stdout);
        let (stderr, _) = truncate(&stderr);

        let mut result = ToolResult {
            output: (!stdout.is_empty()).then_some(stdout),
            error: (!stderr.is_empty()).then_some(stderr),
            ..Default::default()
        };
        if truncated_out {
            result.system = Some(format!(
                "output truncated to {MAX_OUTPUT_BYTES} bytes"
            ));
        }
        result
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &'static str {
        "bash"
    }

    fn api_params(&self) -> Value {
        json!({
            "type": "bash_20250124",
            "name": self.name(),
        })
    }

    async fn call(&self, input: Value) -> ToolResult {
        if input.get("restart").and_then(|v| v.as_bool()) == Some(true) {
            return ToolResult::system("Shell tool has been restarted.");
        }
        let Some(command) = input.get("command").and_then(|v| v.as_str()) else {
            return ToolResult::error("No command provided");
        };
        self.run_command(command).await
    }
}

#[cfg(target_os = "windows")]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("powershell.exe");
    cmd.args(["-NoProfile", "-Command", command])
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);
    cmd
}

#[cfg(not(target_os = "windows"))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command])
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);
    cmd
}

fn truncate(s: &str) -> (String, bool) {
    if s.len() <= MAX_OUTPUT_BYTES {
        return (s.to_string(), false);
    }
    let mut end = MAX_OUTPUT_BYTES;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    (s[..end].to_string(), true)
}
