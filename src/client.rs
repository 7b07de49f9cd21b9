//! Invocation of the Claude CLI as a subprocess.
//!
//! Two capabilities are exposed: a cheap reachability probe (`claude --help`)
//! and a one-shot prompt whose structured reply is checked for errors.

use crate::config::{OutputFormat, Settings};
use crate::error::{Result, SessionError};
use serde_json::{Map, Value};
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// Structured reply of a prompt call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    fields: Map<String, Value>,
}

impl ToolResponse {
    pub fn is_error(&self) -> bool {
        self.fields
            .get("is_error")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn result(&self) -> Option<&str> {
        self.fields.get("result").and_then(Value::as_str)
    }
}

/// What the session manager needs from the external tool
pub trait ToolClient {
    /// Never fails: any problem reaching the tool reads as `false`
    fn probe(&self) -> bool;

    fn send(&self, message: &str) -> Result<ToolResponse>;
}

/// Client for the `claude` executable
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    command: String,
    timeout: Duration,
    probe_timeout: Duration,
    max_turns: i64,
    output_format: OutputFormat,
}

struct CommandOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl ClaudeCli {
    pub fn new(settings: &Settings) -> Self {
        Self {
            command: settings.claude_command.clone(),
            timeout: settings.claude_timeout(),
            probe_timeout: settings.probe_timeout(),
            max_turns: settings.max_turns,
            output_format: settings.output_format,
        }
    }

    fn prompt_args(&self, message: &str) -> Vec<String> {
        vec![
            "-p".to_string(),
            message.to_string(),
            "--max-turns".to_string(),
            self.max_turns.to_string(),
            "--output-format".to_string(),
            self.output_format.as_str().to_string(),
        ]
    }

    /// Run the CLI with captured output, killing it once `timeout` elapses.
    /// The deadline also covers collecting output, since a background
    /// process may keep the pipes open after the CLI itself exits.
    fn run(&self, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        let deadline = Instant::now() + timeout;
        let mut child = Command::new(&self.command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SessionError::Tool(format!("failed to run {}: {}", self.command, e))
            })?;

        // Drain pipes on helper threads so a chatty child cannot block on a full pipe
        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        if let Some(out) = child.stdout.take() {
            drain(out, Pipe::Stdout, tx.clone());
            pending += 1;
        }
        if let Some(err) = child.stderr.take() {
            drain(err, Pipe::Stderr, tx.clone());
            pending += 1;
        }
        drop(tx);

        let status = match child.wait_timeout(timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.timed_out(timeout));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SessionError::Tool(format!(
                    "failed waiting for Claude CLI: {}",
                    e
                )));
            }
        };

        let mut output = CommandOutput {
            status,
            stdout: String::new(),
            stderr: String::new(),
        };
        for _ in 0..pending {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((Pipe::Stdout, text)) => output.stdout = text,
                Ok((Pipe::Stderr, text)) => output.stderr = text,
                // Reader threads left behind exit once the pipe holder does
                Err(_) => return Err(self.timed_out(timeout)),
            }
        }
        Ok(output)
    }

    fn timed_out(&self, timeout: Duration) -> SessionError {
        tracing::warn!(command = %self.command, ?timeout, "Claude CLI timed out");
        SessionError::Tool(format!(
            "Claude CLI timed out after {}s",
            timeout.as_secs()
        ))
    }
}

#[derive(Debug, Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(mut reader: R, pipe: Pipe, tx: Sender<(Pipe, String)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        let _ = tx.send((pipe, String::from_utf8_lossy(&buf).into_owned()));
    });
}

impl ToolClient for ClaudeCli {
    fn probe(&self) -> bool {
        let spawned = Command::new(&self.command)
            .arg("--help")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(command = %self.command, error = %e, "probe spawn failed");
                return false;
            }
        };

        match child.wait_timeout(self.probe_timeout) {
            Ok(Some(status)) => status.success(),
            Ok(None) | Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                tracing::debug!(command = %self.command, "probe timed out");
                false
            }
        }
    }

    fn send(&self, message: &str) -> Result<ToolResponse> {
        tracing::debug!(command = %self.command, format = self.output_format.as_str(), "sending prompt");
        let output = self.run(&self.prompt_args(message), self.timeout)?;
        let raw = output.stdout.trim();

        if raw.is_empty() {
            let stderr = output.stderr.trim();
            return Err(SessionError::Tool(if stderr.is_empty() {
                "Empty response from Claude CLI".to_string()
            } else {
                format!("Empty response from Claude CLI ({})", stderr)
            }));
        }

        if self.output_format == OutputFormat::Text && !output.status.success() {
            return Err(SessionError::Tool(format!(
                "Claude CLI exited with {}: {}",
                output.status, raw
            )));
        }

        parse_response(raw, self.output_format)
    }
}

/// Interpret CLI output. JSON output must be an object whose `is_error` is not set;
/// text output is wrapped as a successful `result`.
pub fn parse_response(raw: &str, format: OutputFormat) -> Result<ToolResponse> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SessionError::Tool("Empty response from Claude CLI".to_string()));
    }

    let fields = match format {
        OutputFormat::Text => {
            let mut fields = Map::new();
            fields.insert("is_error".to_string(), Value::Bool(false));
            fields.insert("result".to_string(), Value::String(raw.to_string()));
            fields
        }
        OutputFormat::Json => {
            let value: Value = serde_json::from_str(raw).map_err(|e| {
                SessionError::Tool(format!("Invalid JSON response from Claude CLI: {}", e))
            })?;
            match value {
                Value::Object(fields) => fields,
                _ => {
                    return Err(SessionError::Tool(
                        "Invalid response format from Claude CLI".to_string(),
                    ))
                }
            }
        }
    };

    let response = ToolResponse { fields };
    if response.is_error() {
        return Err(SessionError::Tool(format!(
            "Claude returned error: {}",
            response.result().unwrap_or("Unknown error")
        )));
    }
    Ok(response)
}
