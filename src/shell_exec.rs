//! Process execution for git invocations.
//!
//! Every external command goes through [`Cmd`], which provides:
//! - argument arrays only (no shell interpolation)
//! - a global semaphore limiting concurrent processes
//! - a wall-clock timeout that kills the child
//! - a bound on captured output, enforced while reading
//! - debug logging with timing for every invocation

use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::sync::Semaphore;

/// Semaphore to limit concurrent command execution.
static CMD_SEMAPHORE: OnceLock<Semaphore> = OnceLock::new();

/// Default concurrent external commands. Tuned to avoid hitting OS limits
/// (file descriptors, process limits) while maintaining good parallelism.
const DEFAULT_CONCURRENT_COMMANDS: usize = 32;

/// Default cap on combined stdout + stderr bytes.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// How often the waiting thread re-checks the output bound.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

fn max_concurrent_commands() -> usize {
    std::env::var("WORKTREE_HUB_MAX_CONCURRENT_COMMANDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n: &usize| *n > 0)
        .unwrap_or(DEFAULT_CONCURRENT_COMMANDS)
}

fn get_semaphore() -> &'static Semaphore {
    CMD_SEMAPHORE.get_or_init(|| Semaphore::new(max_concurrent_commands()))
}

/// Builder for executing commands with logging, limits and timeouts.
///
/// ```ignore
/// let output = Cmd::new("git")
///     .args(["worktree", "list", "--porcelain"])
///     .current_dir(&repo_root)
///     .timeout(Duration::from_secs(30))
///     .run()?;
/// ```
///
/// Errors use [`std::io::ErrorKind`] to tell failures apart:
/// `TimedOut` when the timeout elapsed, `FileTooLarge` when the output bound
/// was exceeded; anything else is a spawn or I/O failure.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    context: Option<String>,
    timeout: Option<Duration>,
    max_output: usize,
    envs: Vec<(String, String)>,
}

impl Cmd {
    /// Create a new command builder for the given program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            context: None,
            timeout: None,
            max_output: DEFAULT_MAX_OUTPUT_BYTES,
            envs: Vec::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory for the command.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set the logging context (typically the repository or worktree name).
    pub fn context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Set a timeout for command execution.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set the maximum number of combined stdout/stderr bytes to capture.
    pub fn max_output(mut self, bytes: usize) -> Self {
        self.max_output = bytes;
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        self.envs.push((key.into(), val.into()));
        self
    }

    /// The command line as it appears in logs and error messages.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    /// Execute the command and return its output.
    ///
    /// A non-zero exit status is not an error at this level; callers inspect
    /// `output.status`.
    pub fn run(self) -> std::io::Result<Output> {
        let cmd_str = self.display();

        match &self.context {
            Some(ctx) => log::debug!("$ {} [{}]", cmd_str, ctx),
            None => log::debug!("$ {}", cmd_str),
        }

        let _guard = get_semaphore().acquire();
        let t0 = Instant::now();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        for (key, val) in &self.envs {
            cmd.env(key, val);
        }
        // Never block on credential or editor prompts
        cmd.env("GIT_TERMINAL_PROMPT", "0");

        let result = run_bounded(&mut cmd, self.timeout, self.max_output);

        let dur_ms = t0.elapsed().as_millis();
        match &result {
            Ok(output) => log::debug!(
                "[wth-trace] cmd=\"{}\" dur_ms={} ok={}",
                cmd_str,
                dur_ms,
                output.status.success()
            ),
            Err(e) => log::debug!(
                "[wth-trace] cmd=\"{}\" dur_ms={} err=\"{}\"",
                cmd_str,
                dur_ms,
                e
            ),
        }

        result
    }
}

/// Spawn, capture both pipes on reader threads, and wait with limits.
fn run_bounded(
    cmd: &mut Command,
    timeout: Option<Duration>,
    max_output: usize,
) -> std::io::Result<Output> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let captured = Arc::new(AtomicUsize::new(0));
    let overflow = Arc::new(AtomicBool::new(false));

    // Reading on separate threads prevents deadlock when pipe buffers fill up
    let stdout_thread = spawn_reader(child.stdout.take(), &captured, &overflow, max_output);
    let stderr_thread = spawn_reader(child.stderr.take(), &captured, &overflow, max_output);

    let deadline = timeout.map(|t| Instant::now() + t);
    let status = loop {
        if overflow.load(Ordering::SeqCst) {
            abort(&mut child, stdout_thread, stderr_thread);
            return Err(std::io::Error::new(
                ErrorKind::FileTooLarge,
                format!("command output exceeded {max_output} bytes"),
            ));
        }

        let slice = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    abort(&mut child, stdout_thread, stderr_thread);
                    return Err(std::io::Error::new(
                        ErrorKind::TimedOut,
                        "command timed out",
                    ));
                }
                (deadline - now).min(POLL_INTERVAL)
            }
            None => POLL_INTERVAL,
        };

        if let Some(status) = child.wait_timeout(slice)? {
            break status;
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    // The child may have exited right after the last chunk pushed us over
    if overflow.load(Ordering::SeqCst) {
        return Err(std::io::Error::new(
            ErrorKind::FileTooLarge,
            format!("command output exceeded {max_output} bytes"),
        ));
    }

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn spawn_reader<R>(
    handle: Option<R>,
    captured: &Arc<AtomicUsize>,
    overflow: &Arc<AtomicBool>,
    limit: usize,
) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    let captured = Arc::clone(captured);
    let overflow = Arc::clone(overflow);
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let Some(mut handle) = handle else {
            return buf;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match handle.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let total = captured.fetch_add(n, Ordering::SeqCst) + n;
                    if total > limit {
                        overflow.store(true, Ordering::SeqCst);
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        buf
    })
}

/// Kill and reap the child. The readers are detached, not joined: a
/// grandchild (credential helper, ssh) can keep the pipes open after the
/// child dies, and they finish on their own once it lets go.
fn abort(child: &mut Child, stdout: JoinHandle<Vec<u8>>, stderr: JoinHandle<Vec<u8>>) {
    let _ = child.kill();
    let _ = child.wait();
    drop(stdout);
    drop(stderr);
}
