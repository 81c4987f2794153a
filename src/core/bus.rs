//! Worker-to-controller event delivery.
//!
//! All cross-thread communication is one-directional event emission over
//! flume channels: workers send, the controlling thread drains. Workers
//! never read controller state back.

use flume::{Receiver, Sender};

use super::logs::LogEntry;

/// Lifecycle events emitted from a worker thread back to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Worker entered (`true`) or left (`false`) the Running state.
    RunningChanged(bool),
    /// Fired exactly once per worker lifecycle, whatever the outcome.
    Finished,
}

/// Sending half handed to a worker thread.
pub type LogSender = Sender<LogEntry>;
/// Draining half kept by the controller.
pub type LogReceiver = Receiver<LogEntry>;

pub type EventSender = Sender<WorkerEvent>;
pub type EventReceiver = Receiver<WorkerEvent>;
