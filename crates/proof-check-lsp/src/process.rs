//! Checker process spawning and supervised shutdown.
//!
//! The checker runs in its own process group. Shutdown escalates in three tiers: wait for a
//! natural exit, then `SIGTERM` to the group, then `SIGKILL` to the group followed by an
//! unconditional reap.

use std::ffi::OsString;
use std::io::{self, BufRead, BufReader};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Build manifests whose presence selects `lake serve` over `lean --server`.
pub const MANIFEST_FILES: [&str; 2] = ["lakefile.lean", "lakefile.toml"];

/// How to launch the checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    /// Executable name or path.
    pub program: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<OsString>,
}

impl ServerCommand {
    /// An arbitrary command.
    pub fn new(
        program: impl Into<PathBuf>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `<lake> serve`
    pub fn lake_serve(lake: impl Into<PathBuf>) -> Self {
        Self::new(lake, ["serve"])
    }

    /// `<lean> --server`
    pub fn lean_server(lean: impl Into<PathBuf>) -> Self {
        Self::new(lean, ["--server"])
    }

    /// Pick the invocation variant for `workspace` from its build manifest.
    pub fn for_workspace(workspace: &Path, lake: &Path, lean: &Path) -> Self {
        if has_build_manifest(workspace) {
            Self::lake_serve(lake)
        } else {
            Self::lean_server(lean)
        }
    }
}

/// Returns `true` if `workspace` contains a Lake build manifest.
pub fn has_build_manifest(workspace: &Path) -> bool {
    MANIFEST_FILES
        .iter()
        .any(|name| workspace.join(name).is_file())
}

/// Termination signals sent to the checker's process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// `SIGTERM`
    Terminate,
    /// `SIGKILL`
    Kill,
}

/// The process operations shutdown escalation needs.
pub trait ProcessControl {
    /// Returns `true` once the process has exited (reaping it).
    fn has_exited(&mut self) -> io::Result<bool>;
    /// Send `signal` to the whole process group. A group that no longer exists is not an error.
    fn signal_group(&mut self, signal: StopSignal) -> io::Result<()>;
    /// Block until the process exits.
    fn wait(&mut self) -> io::Result<()>;
}

/// Grace periods of the escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownTimings {
    /// Time allowed for a natural exit before `SIGTERM`.
    pub exit_grace: Duration,
    /// Time allowed after `SIGTERM` before `SIGKILL`.
    pub terminate_grace: Duration,
    /// Interval between liveness checks.
    pub poll_interval: Duration,
}

impl Default for ShutdownTimings {
    fn default() -> Self {
        Self {
            exit_grace: Duration::from_secs(2),
            terminate_grace: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Which tier of the escalation ended the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Exited on its own within the first grace period.
    Exited,
    /// Exited after `SIGTERM`.
    Terminated,
    /// Needed `SIGKILL`.
    Killed,
}

/// Wait for `process` to exit, escalating through `SIGTERM` and `SIGKILL`.
///
/// Always returns within `exit_grace + terminate_grace` plus the time the kernel needs to
/// deliver `SIGKILL`. A failed liveness check counts as "still running", so it only moves
/// the escalation along; the only error returned is from the final reap.
pub fn escalate_shutdown<P: ProcessControl>(
    process: &mut P,
    timings: ShutdownTimings,
) -> io::Result<ShutdownOutcome> {
    if exited_within(process, timings.exit_grace, timings.poll_interval) {
        return Ok(ShutdownOutcome::Exited);
    }

    log::debug!("checker still running after {:?}; sending SIGTERM", timings.exit_grace);
    if let Err(err) = process.signal_group(StopSignal::Terminate) {
        log::warn!("failed to send SIGTERM to checker group: {err}");
    }
    if exited_within(process, timings.terminate_grace, timings.poll_interval) {
        return Ok(ShutdownOutcome::Terminated);
    }

    log::warn!("checker ignored SIGTERM; sending SIGKILL");
    if let Err(err) = process.signal_group(StopSignal::Kill) {
        log::warn!("failed to send SIGKILL to checker group: {err}");
    }
    process.wait()?;
    Ok(ShutdownOutcome::Killed)
}

fn exited_within<P: ProcessControl>(
    process: &mut P,
    timeout: Duration,
    poll_interval: Duration,
) -> bool {
    wait_for_exit(process, timeout, poll_interval).unwrap_or_else(|err| {
        log::warn!("could not check whether the checker exited: {err}");
        false
    })
}

/// Poll `process` until it exits or `timeout` elapses. Returns whether it exited.
pub fn wait_for_exit<P: ProcessControl>(
    process: &mut P,
    timeout: Duration,
    poll_interval: Duration,
) -> io::Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if process.has_exited()? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        thread::sleep(poll_interval.min(deadline - now));
    }
}

/// A spawned checker that leads its own process group.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    exited: bool,
}

/// The pipes of a freshly spawned checker.
pub struct SpawnedServer {
    /// Process handle for supervision.
    pub process: ProcessHandle,
    /// Checker stdin.
    pub stdin: ChildStdin,
    /// Checker stdout.
    pub stdout: ChildStdout,
}

impl ProcessHandle {
    /// Spawn `command` in `cwd` with inherited environment and its own process group.
    ///
    /// Stdin and stdout are piped for the protocol. Stderr is forwarded line by line to the
    /// log at `warn` level from a detached thread.
    pub fn spawn(command: &ServerCommand, cwd: &Path) -> io::Result<SpawnedServer> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);

        let mut child = cmd.spawn()?;
        let pid = child.id();
        log::info!(
            "spawned checker `{}` (pid {pid}) in {}",
            command.program.display(),
            cwd.display()
        );

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        if let Some(stderr) = child.stderr.take() {
            forward_stderr(pid, stderr)?;
        }

        Ok(SpawnedServer {
            process: Self {
                child,
                exited: false,
            },
            stdin,
            stdout,
        })
    }

    /// Wrap an already-spawned child. It must lead its own process group.
    pub fn from_child(child: Child) -> Self {
        Self {
            child,
            exited: false,
        }
    }

    /// OS process id (and process group id).
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl ProcessControl for ProcessHandle {
    fn has_exited(&mut self) -> io::Result<bool> {
        if !self.exited {
            self.exited = self.child.try_wait()?.is_some();
        }
        Ok(self.exited)
    }

    fn signal_group(&mut self, signal: StopSignal) -> io::Result<()> {
        let signo = match signal {
            StopSignal::Terminate => libc::SIGTERM,
            StopSignal::Kill => libc::SIGKILL,
        };
        let pgid = libc::pid_t::try_from(self.child.id())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

        // SAFETY: killpg has no memory-safety preconditions.
        let rc = unsafe { libc::killpg(pgid, signo) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(err)
    }

    fn wait(&mut self) -> io::Result<()> {
        if !self.exited {
            self.child.wait()?;
            self.exited = true;
        }
        Ok(())
    }
}

fn missing_pipe(name: &str) -> io::Error {
    io::Error::other(format!("checker {name} was not piped"))
}

fn forward_stderr(pid: u32, stderr: ChildStderr) -> io::Result<()> {
    thread::Builder::new()
        .name(format!("checker-stderr-{pid}"))
        .spawn(move || {
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) => log::warn!("checker {pid} stderr: {line}"),
                    Err(_) => break,
                }
            }
        })
        .map(drop)
}
