//! Cooperative worker runtime.
//!
//! A worker is a unit of background work on its own OS thread with a
//! level-triggered stop flag, a log-emission channel, and lifecycle
//! events consumed by the controlling thread. The run body polls the
//! stop flag at a bounded interval instead of being interrupted, so stop
//! latency is bounded without busy-spinning.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::Result;
use parking_lot::Mutex;

use super::{
    bus::{EventReceiver, EventSender, LogReceiver, LogSender, WorkerEvent},
    logs::{LogEntry, LogLevel},
};

/// Upper bound on stop-flag polling latency inside run loops.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle state of one worker slot occupant.
///
/// `Finished` and `Failed` are terminal; restarting means constructing a
/// new worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    StopRequested,
    Finished,
    Failed,
}

impl WorkerState {
    /// Terminal states re-enable the slot for a new start request.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Finished | WorkerState::Failed)
    }
}

/// Capabilities handed to a worker run body.
pub struct WorkerContext {
    name: String,
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<WorkerState>>,
    log_tx: LogSender,
    event_tx: EventSender,
}

impl WorkerContext {
    /// Worker name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emit an info-level line to the observer.
    pub fn log(&self, message: impl Into<String>) {
        self.log_level(LogLevel::Info, message);
    }

    /// Emit a warning-level line to the observer.
    pub fn log_warning(&self, message: impl Into<String>) {
        self.log_level(LogLevel::Warning, message);
    }

    /// Emit an error-level line to the observer.
    pub fn log_error(&self, message: impl Into<String>) {
        self.log_level(LogLevel::Error, message);
    }

    pub fn log_level(&self, level: LogLevel, message: impl Into<String>) {
        // A dropped handle means nobody is observing; losing lines is fine.
        let _ = self.log_tx.send(LogEntry::new(message.into(), level));
    }

    /// Level-triggered stop flag; set once, never cleared.
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Flip the worker into the Running state and notify the controller.
    ///
    /// Run bodies that perform a preflight check (e.g. tool path lookup)
    /// call this only once the check passed, so a preflight failure
    /// finishes the worker without it ever reaching Running.
    pub fn mark_running(&self) {
        {
            let mut state = self.state.lock();
            if *state == WorkerState::Idle {
                *state = WorkerState::Running;
            }
        }
        let _ = self.event_tx.send(WorkerEvent::RunningChanged(true));
    }

    /// Stop-polling loop: park the thread until a stop is requested.
    pub fn idle_until_stopped(&self) {
        while !self.stop_requested() {
            thread::sleep(STOP_POLL_INTERVAL);
        }
    }
}

/// Controller-side handle to one spawned worker.
pub struct WorkerHandle {
    name: String,
    stop: Arc<AtomicBool>,
    state: Arc<Mutex<WorkerState>>,
    log_rx: LogReceiver,
    event_rx: EventReceiver,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// True until the worker reaches a terminal state.
    pub fn is_active(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Request a cooperative stop. Idempotent; a no-op once the worker is
    /// in a terminal state.
    pub fn request_stop(&self) {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return;
        }
        self.stop.store(true, Ordering::Release);
        if *state == WorkerState::Running {
            *state = WorkerState::StopRequested;
        }
    }

    /// Collect every log line emitted since the last drain, in emission
    /// order.
    pub fn drain_logs(&self) -> Vec<LogEntry> {
        self.log_rx.try_iter().collect()
    }

    /// Collect pending lifecycle events, in emission order.
    pub fn drain_events(&self) -> Vec<WorkerEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Block until the worker reaches a terminal state or the timeout
    /// elapses. Returns whether it finished in time.
    pub fn wait_finished(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state().is_terminal() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Wait for completion and reap the thread. Returns `false` when the
    /// worker outlived the timeout; the thread is left running and will
    /// be detached on drop.
    pub fn join(&mut self, timeout: Duration) -> bool {
        if !self.wait_finished(timeout) {
            return false;
        }
        if let Some(handle) = self.join.take() {
            // Thread body never unwinds past the fault boundary.
            let _ = handle.join();
        }
        true
    }
}

/// Spawn a cooperative worker running `body` on a dedicated thread.
///
/// The fault boundary converts both `Err` returns and panics into a
/// logged diagnostic plus the `Failed` terminal state; nothing propagates
/// into the controlling thread, and the `Finished` event fires exactly
/// once per lifecycle.
pub fn spawn_worker<F>(name: impl Into<String>, body: F) -> WorkerHandle
where
    F: FnOnce(&WorkerContext) -> Result<()> + Send + 'static,
{
    let name = name.into();
    let stop = Arc::new(AtomicBool::new(false));
    let state = Arc::new(Mutex::new(WorkerState::Idle));
    let (log_tx, log_rx) = flume::unbounded();
    let (event_tx, event_rx) = flume::unbounded();

    let ctx = WorkerContext {
        name: name.clone(),
        stop: stop.clone(),
        state: state.clone(),
        log_tx,
        event_tx,
    };

    let join = thread::spawn(move || {
        let outcome = catch_unwind(AssertUnwindSafe(|| body(&ctx)));

        let was_running = matches!(
            *ctx.state.lock(),
            WorkerState::Running | WorkerState::StopRequested
        );

        let final_state = match outcome {
            Ok(Ok(())) => WorkerState::Finished,
            Ok(Err(err)) => {
                log::error!("worker {} failed: {err:?}", ctx.name);
                ctx.log_error(format!("FATAL ERROR in {}:\n{err:?}", ctx.name));
                WorkerState::Failed
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("worker {} panicked: {message}", ctx.name);
                ctx.log_error(format!("FATAL ERROR in {}: panic: {message}", ctx.name));
                WorkerState::Failed
            }
        };

        *ctx.state.lock() = final_state;
        if was_running {
            let _ = ctx.event_tx.send(WorkerEvent::RunningChanged(false));
        }
        let _ = ctx.event_tx.send(WorkerEvent::Finished);
    });

    WorkerHandle {
        name,
        stop,
        state,
        log_rx,
        event_rx,
        join: Some(join),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
