use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use agent_provider::{ToolCall, ToolDefinition, EXECUTE_SHELL_COMMAND, PERFORM_WEB_SEARCH};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use wait_timeout::ChildExt;

pub const DENIED_RESULT: &str = "User denied command execution.";
pub const ADVICE_RESULT: &str =
    "User has stopped the execution and requested advice on the command.";
pub const CANCELLED_RESULT: &str = "Command execution cancelled by user.";
pub const SKIPPED_RESULT: &str =
    "Tool call skipped: execution paused for user approval of an earlier command.";

/// The two host-mediated tools advertised on tool-enabled exchanges.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: EXECUTE_SHELL_COMMAND.to_string(),
            description: Some(
                "Executes a shell command in the current directory and returns the output."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to execute."
                    }
                },
                "required": ["command"]
            }),
        },
        ToolDefinition {
            name: PERFORM_WEB_SEARCH.to_string(),
            description: Some(
                "Signals the need to perform a web search by specifying the topic of information needed."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "topic": {
                        "type": "string",
                        "description": "A brief description of the topic or information needed to answer the user's question."
                    }
                },
                "required": ["topic"]
            }),
        },
    ]
}

#[derive(Debug, Error)]
#[error("invalid arguments for tool '{tool}': {source}")]
pub struct ToolArgumentsError {
    pub tool: String,
    #[source]
    pub source: serde_json::Error,
}

/// A model tool call resolved against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    Shell { command: String },
    WebSearch { topic: String },
    Unknown { name: String },
}

#[derive(Deserialize)]
struct ShellArguments {
    command: String,
}

#[derive(Deserialize)]
struct WebSearchArguments {
    topic: String,
}

impl ToolInvocation {
    /// Decodes the call's argument payload. Unknown tools are not decoded.
    pub fn from_call(call: &ToolCall) -> Result<Self, ToolArgumentsError> {
        let invalid = |source| ToolArgumentsError {
            tool: call.name().to_string(),
            source,
        };

        match call.name() {
            EXECUTE_SHELL_COMMAND => {
                let args: ShellArguments =
                    serde_json::from_value(call.parse_arguments().map_err(invalid)?)
                        .map_err(invalid)?;
                Ok(Self::Shell {
                    command: args.command,
                })
            }
            PERFORM_WEB_SEARCH => {
                let args: WebSearchArguments =
                    serde_json::from_value(call.parse_arguments().map_err(invalid)?)
                        .map_err(invalid)?;
                Ok(Self::WebSearch { topic: args.topic })
            }
            name => Ok(Self::Unknown {
                name: name.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn is_web_search(&self) -> bool {
        matches!(self, Self::WebSearch { .. })
    }
}

#[must_use]
pub fn web_search_result(topic: &str) -> String {
    format!("Proceeding with web search for topic: {topic}")
}

#[must_use]
pub fn unknown_tool_result(name: &str) -> String {
    format!("Unknown tool '{name}'. The call was not executed; only execute_shell_command and perform_web_search are available.")
}

/// Captured output of one finished command, regardless of exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Tool-result text handed back to the model.
    #[must_use]
    pub fn to_tool_result(&self) -> String {
        format!("Stdout:\n{}\nStderr:\n{}", self.stdout, self.stderr)
    }
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        }
    }
}

/// Runs an approved shell command. Errors mean the command could not be
/// spawned or waited on.
pub trait CommandExecutor: Send {
    fn run(&mut self, command: &str) -> io::Result<CommandOutput>;
}

/// Executes commands through the platform shell.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor {
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ShellExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn shell_command(&self, command: &str) -> Command {
        let mut builder = if cfg!(windows) {
            let mut builder = Command::new("cmd");
            builder.arg("/C");
            builder
        } else {
            let mut builder = Command::new("sh");
            builder.arg("-c");
            builder
        };
        builder
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            builder.current_dir(dir);
        }
        builder
    }

    fn run_with_timeout(&self, command: &str, timeout: Duration) -> io::Result<CommandOutput> {
        let mut child = self.shell_command(command).spawn()?;
        let stdout = drain_pipe(child.stdout.take());
        let stderr = drain_pipe(child.stderr.take());

        let status = match child.wait_timeout(timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("command timed out after {}s", timeout.as_secs()),
                ));
            }
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&join_pipe(stdout)).into_owned(),
            stderr: String::from_utf8_lossy(&join_pipe(stderr)).into_owned(),
            exit_code: status.code(),
        })
    }
}

impl CommandExecutor for ShellExecutor {
    fn run(&mut self, command: &str) -> io::Result<CommandOutput> {
        tracing::info!(command, "executing approved shell command");
        let output = match self.timeout {
            Some(timeout) => self.run_with_timeout(command, timeout)?,
            None => self.shell_command(command).output()?.into(),
        };
        tracing::debug!(exit_code = ?output.exit_code, "shell command finished");
        Ok(output)
    }
}

// Pipes are drained on their own threads so a chatty command cannot fill the
// pipe buffer and stall while we wait on it.
fn drain_pipe(pipe: Option<impl Read + Send + 'static>) -> Option<thread::JoinHandle<Vec<u8>>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        bytes
    }))
}

fn join_pipe(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn exactly_two_tools_are_advertised() {
        let names = tool_definitions()
            .into_iter()
            .map(|tool| tool.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec![EXECUTE_SHELL_COMMAND, PERFORM_WEB_SEARCH]);
    }

    #[test]
    fn invocations_decode_known_tools() {
        let shell = ToolCall::function("c1", EXECUTE_SHELL_COMMAND, r#"{"command":"ls -la"}"#);
        let search = ToolCall::function("c2", PERFORM_WEB_SEARCH, r#"{"topic":"weather"}"#);
        let other = ToolCall::function("c3", "read_file", "not even json");

        assert_eq!(
            ToolInvocation::from_call(&shell).expect("shell decodes"),
            ToolInvocation::Shell {
                command: "ls -la".to_string()
            }
        );
        assert_eq!(
            ToolInvocation::from_call(&search).expect("search decodes"),
            ToolInvocation::WebSearch {
                topic: "weather".to_string()
            }
        );
        assert_eq!(
            ToolInvocation::from_call(&other).expect("unknown is not decoded"),
            ToolInvocation::Unknown {
                name: "read_file".to_string()
            }
        );
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let broken = ToolCall::function("c1", EXECUTE_SHELL_COMMAND, r#"{"command": "#);
        let missing = ToolCall::function("c2", PERFORM_WEB_SEARCH, r#"{"query":"x"}"#);

        let error = ToolInvocation::from_call(&broken).expect_err("broken JSON");
        assert_eq!(error.tool, EXECUTE_SHELL_COMMAND);
        assert!(ToolInvocation::from_call(&missing).is_err());
    }

    #[test]
    fn command_output_formats_both_streams() {
        let output = CommandOutput {
            stdout: "hi\n".to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        };
        assert_eq!(output.to_tool_result(), "Stdout:\nhi\n\nStderr:\n");
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_captures_output_and_ignores_exit_status() {
        let mut executor = ShellExecutor::new();
        let output = executor
            .run("echo out; echo err 1>&2; exit 3")
            .expect("command runs");

        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_runs_in_working_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("marker.txt"), "x").expect("write marker");

        let mut executor = ShellExecutor::new().with_working_dir(dir.path());
        let output = executor.run("ls").expect("command runs");

        assert!(output.stdout.contains("marker.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_times_out_when_configured() {
        let mut executor = ShellExecutor::new().with_timeout(Some(Duration::from_millis(200)));
        let error = executor.run("sleep 5").expect_err("must time out");

        assert_eq!(error.kind(), io::ErrorKind::TimedOut);
    }

    #[cfg(unix)]
    #[test]
    fn shell_executor_with_timeout_returns_output_of_fast_command() {
        let mut executor = ShellExecutor::new().with_timeout(Some(Duration::from_secs(10)));
        let output = executor.run("echo hi").expect("command runs");

        assert_eq!(output.to_tool_result(), "Stdout:\nhi\n\nStderr:\n");
    }
}
