//! External process runner.
//!
//! Spawns one child per handle, merges its stdout and stderr into a
//! single line channel via reader threads, and terminates it gracefully
//! first, forcibly second. The child environment always forces
//! unbuffered UTF-8 text output so line streaming stays timely.

use std::{
    ffi::OsString,
    io::{self, BufRead, BufReader, ErrorKind, Read},
    path::PathBuf,
    process::{Child, Command, Stdio},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use flume::{Receiver, Sender};

use crate::error::Error;

/// Environment forced onto every child for timely line streaming.
const CHILD_ENV: &[(&str, &str)] = &[("PYTHONUNBUFFERED", "1"), ("PYTHONIOENCODING", "utf-8")];

/// Bound on the wait after the hard kill.
const KILL_WAIT: Duration = Duration::from_secs(1);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Everything needed to launch one external command.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Full command line for audit log lines.
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

/// Exclusive owner of one spawned child process.
pub struct ProcessHandle {
    child: Child,
    lines_rx: Receiver<String>,
    readers: Vec<JoinHandle<()>>,
}

impl ProcessHandle {
    /// Spawn the command. Fails with [`Error::Spawn`] when the program
    /// path does not exist or the OS refuses the launch.
    pub fn spawn(spec: ProcessSpec) -> Result<Self, Error> {
        if !spec.program.exists() {
            return Err(Error::Spawn {
                program: spec.program.clone(),
                source: io::Error::new(ErrorKind::NotFound, "executable not found"),
            });
        }

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in CHILD_ENV {
            command.env(key, value);
        }
        for (key, value) in &spec.envs {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| Error::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        log::info!(
            "spawned {} (pid={})",
            spec.program.display(),
            child.id()
        );

        // Both streams feed one channel; within each stream line order is
        // preserved, and the channel closes once both readers hit EOF.
        let (tx, rx) = flume::unbounded();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, tx.clone(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, tx, "stderr"));
        }

        Ok(Self {
            child,
            lines_rx: rx,
            readers,
        })
    }

    /// Operating-system process id.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Merged stdout+stderr line stream. Disconnects after the child
    /// exits and both pipes reach EOF.
    pub fn lines(&self) -> &Receiver<String> {
        &self.lines_rx
    }

    /// Non-blocking liveness probe.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Graceful-then-forceful termination: soft interrupt, wait up to
    /// `grace`, escalate to kill, wait one more short bound. Ok when the
    /// child already exited.
    pub fn terminate(&mut self, grace: Duration) -> Result<(), Error> {
        if !self.is_alive() {
            return Ok(());
        }

        self.send_soft_interrupt();
        if self.wait_for_exit(grace) {
            return Ok(());
        }

        if let Err(err) = self.child.kill() {
            // InvalidInput means the child is already gone.
            if err.kind() != ErrorKind::InvalidInput {
                log::warn!("kill on pid {} failed: {err}", self.child.id());
            }
        }
        if self.wait_for_exit(KILL_WAIT) {
            return Ok(());
        }

        Err(Error::TerminationFailed {
            pid: self.child.id(),
        })
    }

    /// Block until the child exits and the readers drain; returns the
    /// exit code, `-1` when killed by a signal.
    pub fn wait(&mut self) -> i32 {
        let code = match self.child.wait() {
            Ok(status) => status.code().unwrap_or(-1),
            Err(err) => {
                log::warn!("wait on pid {} failed: {err}", self.child.id());
                -1
            }
        };
        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }
        code
    }

    #[cfg(unix)]
    fn send_soft_interrupt(&mut self) {
        let pid = self.child.id() as libc::pid_t;
        // Level-equivalent of the platform "soft stop"; errors here only
        // mean the child raced us to exit.
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        if rc != 0 {
            log::warn!(
                "SIGTERM to pid {pid} failed: {}",
                io::Error::last_os_error()
            );
        }
    }

    #[cfg(not(unix))]
    fn send_soft_interrupt(&mut self) {
        // No portable soft signal through std; fall straight to kill and
        // let the escalation bounds apply unchanged.
        if let Err(err) = self.child.kill() {
            if err.kind() != ErrorKind::InvalidInput {
                log::warn!("kill on pid {} failed: {err}", self.child.id());
            }
        }
    }

    fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return true,
                Ok(None) => {}
                Err(err) => {
                    log::warn!("poll on pid {} failed: {err}", self.child.id());
                    return false;
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.is_alive() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn spawn_line_reader<R>(stream: R, tx: Sender<String>, label: &'static str) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim_end_matches(['\r', '\n']);
                    if tx.send(trimmed.to_string()).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    log::warn!("child {label} reader error: {err}");
                    break;
                }
            }
        }
    })
}
