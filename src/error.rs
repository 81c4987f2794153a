use std::{io, path::PathBuf};

use thiserror::Error;

use crate::core::orchestrator::Slot;

/// Failures surfaced by the orchestration core.
///
/// Worker-internal faults never appear here; they are converted to log
/// entries plus a terminal worker state at the worker boundary. This enum
/// covers the conditions a caller can react to synchronously.
#[derive(Debug, Error)]
pub enum Error {
    /// The executable is missing or the OS refused to launch it.
    #[error("failed to spawn {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A start request was made while the slot already holds an active worker.
    #[error("{0} slot already has an active worker")]
    SlotBusy(Slot),

    /// The child survived both the soft interrupt and the kill escalation.
    #[error("process {pid} is still alive after kill escalation")]
    TerminationFailed { pid: u32 },
}
