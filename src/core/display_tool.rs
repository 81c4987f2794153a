//! Camera display tool subprocess worker.
//!
//! Launches `<interpreter> <tool_path> --root-dir <path> --title <title>`
//! and streams its output. The display tool is expected to close
//! promptly on a soft stop, so the termination grace is short.

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use flume::RecvTimeoutError;

use super::{
    process::{ProcessHandle, ProcessSpec},
    worker::{spawn_worker, WorkerContext, WorkerHandle, STOP_POLL_INTERVAL},
};

/// Grace given to the display tool between soft interrupt and hard kill.
const DISPLAY_STOP_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct DisplayToolConfig {
    pub interpreter: PathBuf,
    /// Path to the display tool script/executable.
    pub tool_path: PathBuf,
    /// Working directory for the child; the project root.
    pub project_root: PathBuf,
    /// Directory of rendered output frames the tool displays.
    pub root_dir: PathBuf,
    /// Window title shown by the tool.
    pub title: String,
}

pub fn spawn_display_tool(config: DisplayToolConfig) -> WorkerHandle {
    spawn_worker("display-tool", move |ctx| run(config, ctx))
}

fn run(config: DisplayToolConfig, ctx: &WorkerContext) -> Result<()> {
    if !config.tool_path.is_file() {
        ctx.log(format!("Not found: {}", config.tool_path.display()));
        return Ok(());
    }

    let spec = ProcessSpec::new(&config.interpreter)
        .arg(&config.tool_path)
        .arg("--root-dir")
        .arg(&config.root_dir)
        .arg("--title")
        .arg(&config.title)
        .current_dir(&config.project_root);

    ctx.log(format!("Executing cam display: {}", spec.command_line()));
    ctx.mark_running();

    let mut handle = match ProcessHandle::spawn(spec) {
        Ok(handle) => handle,
        Err(err) => {
            ctx.log_error(format!("Error running cam display: {err}"));
            return Ok(());
        }
    };
    ctx.log(format!("cam display started (pid={})", handle.id()));

    let mut terminated = false;
    loop {
        if ctx.stop_requested() && !terminated {
            if let Err(err) = handle.terminate(DISPLAY_STOP_GRACE) {
                ctx.log_warning(err.to_string());
            }
            terminated = true;
        }

        match handle.lines().recv_timeout(STOP_POLL_INTERVAL) {
            Ok(line) => ctx.log(line),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let code = handle.wait();
    ctx.log(format!("cam display exited with code {code}"));
    Ok(())
}
