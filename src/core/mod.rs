//! Worker and subprocess orchestration core.
//!
//! This package contains the UI-independent orchestration logic:
//! - Cooperative worker runtime (stop flag, log channel, fault boundary)
//! - External process runner with merged line streaming and
//!   graceful-then-forceful termination
//! - Capture service supervisor and passive image source
//! - Scan/display tool subprocess workers
//! - Slot exclusivity and bounded best-effort shutdown
//!
//! This separation allows any frontend (GUI, TUI, headless runner) to
//! drive the same workers.

pub mod bus;
pub mod capture;
pub mod display_tool;
pub mod images;
pub mod logs;
pub mod orchestrator;
pub mod process;
pub mod scan_tool;
pub mod worker;

// Re-export commonly used types
pub use bus::WorkerEvent;
pub use capture::{CaptureConfig, CaptureService, CaptureServiceFactory, CameraScanner};
pub use display_tool::DisplayToolConfig;
pub use logs::{LogBuffer, LogEntry, LogLevel};
pub use orchestrator::{Orchestrator, ShutdownPolicy, Slot};
pub use process::{ProcessHandle, ProcessSpec};
pub use scan_tool::{ScanMode, ScanToolConfig};
pub use worker::{spawn_worker, WorkerContext, WorkerHandle, WorkerState};
