//! Local execution backend.
//!
//! [`LocalBackend`] drives an [`Interpreter`]. The provided interpreter,
//! [`PythonInterpreter`], keeps one Python process alive for the session:
//!
//! - isolated mode (`-I`): no user site-packages, no `PYTHON*` variables
//! - cleared environment except `PATH`
//! - a scratch directory as working directory
//! - one namespace shared by every request, so later cells see earlier names
//! - killed when a request exceeds its timeout, then respawned on the next call
//!
//! Requests and replies are exchanged as one JSON object per line over the
//! child's stdin and a private duplicate of its stdout.

use std::process::Stdio;
use std::time::{Duration, Instant};

use academy_core::ExecutionConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::{ExecutionBackend, ExecutionResult, RuntimeError};

/// How long warm-up may take, including preload imports.
const WARMUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Request loop run inside the interpreter.
///
/// User code writing to file descriptors 1 or 2 directly lands in
/// `/dev/null`; replies go through a duplicate of the original stdout.
const DRIVER: &str = r#"
import io, json, os, sys, traceback
_requests = io.TextIOWrapper(sys.stdin.buffer, encoding="utf-8")
_channel = os.fdopen(os.dup(1), "w", encoding="utf-8")
_null = os.open(os.devnull, os.O_WRONLY)
os.dup2(_null, 1)
os.dup2(_null, 2)
_namespace = {"__name__": "__main__", "__builtins__": __builtins__}
for _line in _requests:
    _code = json.loads(_line)["code"]
    _out, _err = io.StringIO(), io.StringIO()
    sys.stdin, sys.stdout, sys.stderr = io.StringIO(), _out, _err
    _ok = True
    try:
        exec(compile(_code, "<cell>", "exec"), _namespace)
    except BaseException as _e:
        _ok = False
        _tb = _e.__traceback__.tb_next if _e.__traceback__ else None
        traceback.print_exception(type(_e), _e, _tb, file=_err)
    finally:
        sys.stdout, sys.stderr = sys.__stdout__, sys.__stderr__
    _channel.write(json.dumps({"stdout": _out.getvalue(), "stderr": _err.getvalue(), "success": _ok}) + "\n")
    _channel.flush()
"#;

/// Captured outcome of one interpreter run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Whether the code finished without an uncaught fault.
    pub success: bool,
    /// Whether the run was killed for exceeding its time limit.
    pub timed_out: bool,
}

/// A sandboxed interpreter the local backend can drive.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Loads and warms the interpreter. Returns a version string for logs.
    async fn start(&self) -> Result<String, RuntimeError>;

    /// Runs `code`, giving up after `timeout`.
    async fn run(&self, code: &str, timeout: Duration) -> Result<RunOutput, RuntimeError>;
}

/// Last non-empty line of a fault trace, e.g. `ZeroDivisionError: division by zero`.
fn final_trace_line(stderr: &str) -> Option<&str> {
    stderr.lines().map(str::trim).rfind(|line| !line.is_empty())
}

// ============================================================================
// Backend
// ============================================================================

/// Runs code with a process-managed interpreter.
#[derive(Debug)]
pub struct LocalBackend<I> {
    interpreter: I,
    timeout: Duration,
}

impl<I: Interpreter> LocalBackend<I> {
    /// Creates a backend with a per-call timeout.
    pub const fn new(interpreter: I, timeout: Duration) -> Self {
        Self {
            interpreter,
            timeout,
        }
    }
}

#[async_trait]
impl<I: Interpreter> ExecutionBackend for LocalBackend<I> {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn initialize(&self) -> Result<(), RuntimeError> {
        let version = self.interpreter.start().await?;
        info!(version = %version, "Local interpreter warmed up");
        Ok(())
    }

    async fn execute(&self, code: &str) -> ExecutionResult {
        let started = Instant::now();
        let outcome = self.interpreter.run(code, self.timeout).await;
        let elapsed = started.elapsed();

        let result = match outcome {
            Err(e) => ExecutionResult::failed(e.to_string()),
            Ok(run) if run.timed_out => ExecutionResult::failed(format!(
                "Execution timed out after {}s",
                self.timeout.as_secs()
            ))
            .with_output(run.stdout, run.stderr),
            Ok(run) if run.success => ExecutionResult::succeeded(run.stdout, run.stderr),
            Ok(run) => {
                let error = final_trace_line(&run.stderr)
                    .unwrap_or("Execution failed")
                    .to_string();
                ExecutionResult::failed(error).with_output(run.stdout, run.stderr)
            }
        };
        debug!(
            success = result.success,
            elapsed_ms = elapsed.as_millis(),
            "Local execution finished"
        );
        result.with_elapsed(elapsed)
    }
}

// ============================================================================
// Python
// ============================================================================

#[derive(Serialize)]
struct CellRequest<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
struct CellReply {
    stdout: String,
    stderr: String,
    success: bool,
}

/// A live interpreter process and its request channel.
#[derive(Debug)]
struct Session {
    child: Child,
    stdin: ChildStdin,
    replies: Lines<BufReader<ChildStdout>>,
    version: String,
    _scratch: TempDir,
}

impl Session {
    async fn exchange(&mut self, program: &str, code: &str) -> Result<RunOutput, RuntimeError> {
        let mut request = serde_json::to_string(&CellRequest { code })
            .map_err(|e| RuntimeError::interpreter_unavailable(program, e.to_string()))?;
        request.push('\n');
        self.stdin.write_all(request.as_bytes()).await?;
        self.stdin.flush().await?;

        let Some(line) = self.replies.next_line().await? else {
            let status = self.child.try_wait().ok().flatten();
            return Err(RuntimeError::interpreter_unavailable(
                program,
                format!("interpreter exited unexpectedly ({status:?})"),
            ));
        };
        let reply: CellReply = serde_json::from_str(&line).map_err(|e| {
            RuntimeError::interpreter_unavailable(program, format!("unreadable reply: {e}"))
        })?;

        Ok(RunOutput {
            stdout: reply.stdout,
            stderr: reply.stderr,
            success: reply.success,
            timed_out: false,
        })
    }
}

/// A CPython process kept alive across requests.
#[derive(Debug)]
pub struct PythonInterpreter {
    program: String,
    preload_modules: Vec<String>,
    session: Mutex<Option<Session>>,
}

impl PythonInterpreter {
    /// Creates an interpreter for `program` (e.g. `python3`).
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            preload_modules: Vec::new(),
            session: Mutex::new(None),
        }
    }

    /// Creates an interpreter from the execution settings.
    #[must_use]
    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(&config.interpreter).with_preload(config.preload_modules.iter().cloned())
    }

    /// Modules to import during warm-up.
    #[must_use]
    pub fn with_preload(mut self, modules: impl IntoIterator<Item = String>) -> Self {
        self.preload_modules.extend(modules);
        self
    }

    /// Executable name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, scratch: &TempDir) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-I")
            .arg("-c")
            .arg(DRIVER)
            .env_clear()
            .current_dir(scratch.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }
        cmd
    }

    fn warmup_script(&self) -> String {
        let mut script = String::new();
        for module in &self.preload_modules {
            script.push_str("import ");
            script.push_str(module);
            script.push('\n');
        }
        script.push_str("import sys\nprint(sys.version.split()[0])\n");
        script
    }

    /// Spawns a process and runs the warm-up script in its namespace.
    async fn spawn_session(&self) -> Result<Session, RuntimeError> {
        let scratch = tempfile::tempdir()?;
        let mut child = self
            .command(&scratch)
            .spawn()
            .map_err(|e| RuntimeError::interpreter_unavailable(&self.program, e.to_string()))?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(RuntimeError::interpreter_unavailable(
                &self.program,
                "interpreter pipes were not captured",
            ));
        };
        let mut session = Session {
            child,
            stdin,
            replies: BufReader::new(stdout).lines(),
            version: String::new(),
            _scratch: scratch,
        };

        let warmup = self.warmup_script();
        let Ok(run) = tokio::time::timeout(WARMUP_TIMEOUT, session.exchange(&self.program, &warmup)).await
        else {
            return Err(RuntimeError::WarmupFailed(format!(
                "timed out after {}s",
                WARMUP_TIMEOUT.as_secs()
            )));
        };
        let run = run?;
        if !run.success {
            let reason = final_trace_line(&run.stderr).unwrap_or("interpreter exited with an error");
            return Err(RuntimeError::WarmupFailed(reason.to_string()));
        }

        session.version = run.stdout.trim().to_string();
        debug!(version = %session.version, pid = ?session.child.id(), "Interpreter process started");
        Ok(session)
    }
}

#[async_trait]
impl Interpreter for PythonInterpreter {
    #[instrument(skip(self), fields(program = %self.program))]
    async fn start(&self) -> Result<String, RuntimeError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.version.clone());
        }
        let session = self.spawn_session().await?;
        let version = session.version.clone();
        *guard = Some(session);
        Ok(version)
    }

    async fn run(&self, code: &str, timeout: Duration) -> Result<RunOutput, RuntimeError> {
        let mut guard = self.session.lock().await;
        let mut session = match guard.take() {
            Some(session) => session,
            None => self.spawn_session().await?,
        };

        match tokio::time::timeout(timeout, session.exchange(&self.program, code)).await {
            Ok(Ok(run)) => {
                *guard = Some(session);
                Ok(run)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Interpreter session lost; it will be respawned");
                Err(e)
            }
            Err(_) => {
                // Dropping the session kills the process (kill_on_drop).
                debug!(timeout_secs = timeout.as_secs(), "Interpreter timed out");
                Ok(RunOutput {
                    timed_out: true,
                    ..RunOutput::default()
                })
            }
        }
    }
}
