/// Sandboxed command runner
///
/// Spawns one external program directly (never through a shell), applies
/// resource ceilings in the child before exec, drains both pipes under a
/// byte cap and enforces a wall-clock budget with SIGKILL. Each child leads
/// its own process group so a timeout also takes down its descendants.
use crate::config::settings::WorkerSettings;
use crate::config::types::{ProbeError, Result};
use crate::exec::limits::ResourceCeilings;
use crate::observability::events;
use crate::utils::output::{collect_optional, OutputIntegrity};
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{setpgid, Pid};
use std::collections::BTreeMap;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};

/// Exit code reported for a command killed by the wall-clock budget
pub const TIMEOUT_EXIT_CODE: i32 = 137;
pub const TIMEOUT_STDERR: &[u8] = b"timeout";

static CEILINGS_REPORTED: AtomicBool = AtomicBool::new(false);

/// One command to run
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    argv: Vec<String>,
    timeout: Option<Duration>,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
    max_output_bytes: Option<usize>,
}

impl Invocation {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Split a command line with POSIX shell-word rules. Nothing is
    /// expanded: `$HOME`, globs and pipes stay literal arguments.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let argv = shell_words::split(line)
            .map_err(|e| ProbeError::Config(format!("cannot split command line: {}", e)))?;
        Ok(Self::new(argv))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add one variable on top of the inherited environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn max_output_bytes(mut self, limit: usize) -> Self {
        self.max_output_bytes = Some(limit);
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

/// Result of one sandboxed invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Real exit code, `-signal` when the child died from a signal,
    /// 137 on timeout
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    pub stdout_integrity: OutputIntegrity,
    pub stderr_integrity: OutputIntegrity,
    pub wall_time_ms: u64,
}

impl CommandResult {
    fn timeout(wall_time: Duration) -> Self {
        CommandResult {
            exit_code: TIMEOUT_EXIT_CODE,
            stdout: Vec::new(),
            stderr: TIMEOUT_STDERR.to_vec(),
            timed_out: true,
            stdout_integrity: OutputIntegrity::Complete,
            stderr_integrity: OutputIntegrity::Complete,
            wall_time_ms: wall_time.as_millis() as u64,
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs commands with worker-wide defaults
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
    max_output_bytes: usize,
    ceilings: ResourceCeilings,
}

impl CommandRunner {
    pub fn new(settings: &WorkerSettings) -> Self {
        CommandRunner {
            timeout: settings.subprocess_timeout,
            max_output_bytes: settings.subprocess_max_output_bytes,
            ceilings: ResourceCeilings::default(),
        }
    }

    pub fn with_ceilings(mut self, ceilings: ResourceCeilings) -> Self {
        self.ceilings = ceilings;
        self
    }

    pub fn ceilings(&self) -> &ResourceCeilings {
        &self.ceilings
    }

    pub async fn run(&self, invocation: Invocation) -> Result<CommandResult> {
        let (program, args) = invocation
            .argv
            .split_first()
            .ok_or_else(|| ProbeError::Config("command argv is empty".to_string()))?;
        let budget = invocation.timeout.unwrap_or(self.timeout);
        let limit = invocation.max_output_bytes.unwrap_or(self.max_output_bytes);

        self.report_unavailable_ceilings();

        let mut command = Command::new(program);
        command
            .args(args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let ceilings = self.ceilings;
        // SAFETY: the hook only calls setpgid and setrlimit, both
        // async-signal-safe.
        unsafe {
            command.pre_exec(move || {
                let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
                let _ = ceilings.apply();
                Ok(())
            });
        }

        let started = Instant::now();
        let mut child = command
            .spawn()
            .map_err(|e| ProbeError::Process(format!("failed to spawn {}: {}", program, e)))?;
        let pid = child.id();
        let mut group = GroupKillGuard::new(pid);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let completed = tokio::time::timeout(budget, async {
            tokio::join!(
                collect_optional(stdout, limit),
                collect_optional(stderr, limit),
                child.wait()
            )
        })
        .await;

        match completed {
            Ok((stdout, stderr, status)) => {
                group.disarm();
                let status = status?;
                let exit_code = status
                    .code()
                    .unwrap_or_else(|| -status.signal().unwrap_or(0));
                log::debug!(
                    "{} exited with {} after {}ms",
                    program,
                    exit_code,
                    started.elapsed().as_millis()
                );
                Ok(CommandResult {
                    exit_code,
                    stdout: stdout.data,
                    stderr: stderr.data,
                    timed_out: false,
                    stdout_integrity: stdout.integrity,
                    stderr_integrity: stderr.integrity,
                    wall_time_ms: started.elapsed().as_millis() as u64,
                })
            }
            Err(_) => {
                events::subprocess_timeout(program, pid, budget);
                force_kill(&mut child, pid).await;
                group.disarm();
                Ok(CommandResult::timeout(started.elapsed()))
            }
        }
    }

    fn report_unavailable_ceilings(&self) {
        let unavailable = self.ceilings.probe();
        if !unavailable.is_empty() && !CEILINGS_REPORTED.swap(true, Ordering::Relaxed) {
            events::ceilings_unavailable(&unavailable);
        }
    }
}

/// Kills the child's process group when `run` is dropped before the child
/// was reaped, e.g. when a caller's own timeout cancels the future.
/// `kill_on_drop` alone only reaches the direct child.
struct GroupKillGuard {
    pgid: Option<Pid>,
}

impl GroupKillGuard {
    fn new(pid: Option<u32>) -> Self {
        GroupKillGuard {
            pgid: pid.map(|pid| Pid::from_raw(pid as i32)),
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKillGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            match killpg(pgid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => log::warn!("failed to kill process group {}: {}", pgid, e),
            }
        }
    }
}

/// SIGKILL the child's process group (or the child alone when it never got
/// its own group) and reap it. A child that is already gone is fine.
async fn force_kill(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        let pid = Pid::from_raw(pid as i32);
        let result = match killpg(pid, Signal::SIGKILL) {
            Err(Errno::ESRCH) => kill(pid, Signal::SIGKILL),
            other => other,
        };
        match result {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => log::warn!("failed to kill pid {}: {}", pid, e),
        }
    }
    if let Err(e) = child.wait().await {
        log::debug!("reaping killed child failed: {}", e);
    }
}
