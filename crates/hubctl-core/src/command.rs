//! Execution of external command-line tools
//!
//! `aws`, `kubectl` and `helm` are driven through [`CommandRunner`]. A runner
//! never fails because a command exited non-zero: callers inspect
//! [`CommandOutput::exit_code`] themselves. Only a failure to start the
//! process is an error.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;

use crate::error::{CoreError, Result};

/// Arguments, optional stdin and `--key=value` flags for one command run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub flags: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            flags: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn flag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(key.into(), value.into());
        self
    }

    /// Full argument vector: positional args followed by `--key=value` flags
    pub fn argv(&self) -> Vec<String> {
        self.args
            .iter()
            .cloned()
            .chain(self.flags.iter().map(|(k, v)| format!("--{}={}", k, v)))
            .collect()
    }
}

/// Captured result of a command run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external programs
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, invocation: &Invocation) -> Result<CommandOutput>;
}

/// Runs programs as child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, invocation: &Invocation) -> Result<CommandOutput> {
        let spawn_error = |source| CoreError::CommandSpawn {
            program: program.to_string(),
            source,
        };

        let mut command = tokio::process::Command::new(program);
        command
            .args(invocation.argv())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let mut child = command.spawn().map_err(spawn_error)?;

        // stdin is fed while the output pipes drain, the pipe closes when `feed` ends
        let stdin = child.stdin.take();
        let feed = async move {
            match (&invocation.stdin, stdin) {
                (Some(input), Some(mut stdin)) => stdin.write_all(input.as_bytes()).await,
                _ => Ok(()),
            }
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output.map_err(spawn_error)?;
        if let Err(e) = fed
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(spawn_error(e));
        }

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// A program bound to the runner that executes it
#[derive(Clone)]
pub struct Tool {
    program: String,
    runner: Arc<dyn CommandRunner>,
}

impl Tool {
    pub fn new(program: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub async fn run(&self, invocation: Invocation) -> Result<CommandOutput> {
        tracing::debug!("running {} {}", self.program, invocation.argv().join(" "));
        self.runner.run(&self.program, &invocation).await
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("program", &self.program).finish()
    }
}

/// A recorded call made through a [`ScriptedRunner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub program: String,
    pub argv: Vec<String>,
    pub stdin: Option<String>,
}

impl RecordedCall {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.argv.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

struct ScriptedResponse {
    program: String,
    prefix: Vec<String>,
    output: CommandOutput,
    once: bool,
}

/// In-memory runner for tests
///
/// Responses are matched by program and argument prefix, first match wins;
/// unmatched calls succeed with empty output. One-shot responses are used up
/// by the call they answer.
#[derive(Clone, Default)]
pub struct ScriptedRunner {
    responses: Arc<Mutex<Vec<ScriptedResponse>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls to `program` whose arguments start with `prefix`
    pub fn respond(&self, program: &str, prefix: &[&str], output: CommandOutput) -> &Self {
        self.push_response(program, prefix, output, false)
    }

    /// Answer the next matching call only
    pub fn respond_once(&self, program: &str, prefix: &[&str], output: CommandOutput) -> &Self {
        self.push_response(program, prefix, output, true)
    }

    fn push_response(
        &self,
        program: &str,
        prefix: &[&str],
        output: CommandOutput,
        once: bool,
    ) -> &Self {
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        responses.push(ScriptedResponse {
            program: program.to_string(),
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            output,
            once,
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Calls rendered as command lines, in call order
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(RecordedCall::command_line).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, invocation: &Invocation) -> Result<CommandOutput> {
        let argv = invocation.argv();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                program: program.to_string(),
                argv: argv.clone(),
                stdin: invocation.stdin.clone(),
            });

        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        let Some(idx) = responses
            .iter()
            .position(|r| r.program == program && argv.starts_with(&r.prefix))
        else {
            return Ok(CommandOutput::default());
        };
        if responses[idx].once {
            Ok(responses.remove(idx).output)
        } else {
            Ok(responses[idx].output.clone())
        }
    }
}
