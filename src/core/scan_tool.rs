//! Shelf-scan tool subprocess worker.
//!
//! Launches `<interpreter> <tool_path> <mode>` with the project root as
//! working directory and streams every output line to the observer.
//! `setup` is a one-shot run that exits on its own; `service` runs until
//! a stop is requested, at which point forwarding stops and the child is
//! terminated gracefully-then-forcibly.

use std::{fmt, path::PathBuf, time::Duration};

use anyhow::Result;
use flume::RecvTimeoutError;

use super::{
    process::{ProcessHandle, ProcessSpec},
    worker::{spawn_worker, WorkerContext, WorkerHandle, STOP_POLL_INTERVAL},
};

/// Grace given to the scan tool between soft interrupt and hard kill.
const SCAN_STOP_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// One-shot shelf setup; the process exits on its own.
    Setup,
    /// Long-running scan service; runs until stopped.
    Service,
}

impl ScanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanMode::Setup => "setup",
            ScanMode::Service => "service",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ScanToolConfig {
    /// Interpreter that runs the tool (the venv python in production).
    pub interpreter: PathBuf,
    /// Path to the scan tool script/executable.
    pub tool_path: PathBuf,
    /// Working directory for the child; the project root.
    pub project_root: PathBuf,
    pub mode: ScanMode,
}

pub fn spawn_scan_tool(config: ScanToolConfig) -> WorkerHandle {
    spawn_worker("scan-tool", move |ctx| run(config, ctx))
}

fn run(config: ScanToolConfig, ctx: &WorkerContext) -> Result<()> {
    // Preflight before Running: a missing tool is a reported no-op, not
    // a fault.
    if !config.tool_path.is_file() {
        ctx.log(format!("Not found: {}", config.tool_path.display()));
        return Ok(());
    }

    let spec = ProcessSpec::new(&config.interpreter)
        .arg(&config.tool_path)
        .arg(config.mode.as_str())
        .current_dir(&config.project_root);

    ctx.log(format!(
        "Executing with interpreter: {}",
        config.interpreter.display()
    ));
    ctx.log(format!("Command: {}", spec.command_line()));
    ctx.mark_running();

    let mut handle = match ProcessHandle::spawn(spec) {
        Ok(handle) => handle,
        Err(err) => {
            ctx.log_error(format!("Error running scan tool ({}): {err}", config.mode));
            return Ok(());
        }
    };
    ctx.log(format!(
        "scan tool ({}) started (pid={})",
        config.mode,
        handle.id()
    ));

    let mut terminated = false;
    loop {
        if ctx.stop_requested() && !terminated {
            if let Err(err) = handle.terminate(SCAN_STOP_GRACE) {
                ctx.log_warning(err.to_string());
            }
            terminated = true;
        }

        match handle.lines().recv_timeout(STOP_POLL_INTERVAL) {
            Ok(line) => {
                // Service mode stops forwarding once a stop is requested;
                // buffered output past that point is discarded, the exit
                // code is still reported below.
                if !(config.mode == ScanMode::Service && ctx.stop_requested()) {
                    ctx.log(line);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let code = handle.wait();
    ctx.log(format!("scan tool ({}) exited with code {code}", config.mode));
    Ok(())
}
