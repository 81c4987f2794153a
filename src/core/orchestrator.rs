//! Slot exclusivity and ordered shutdown across workers.
//!
//! The orchestrator owns at most one worker per slot (source, scan tool,
//! display). It is the single consumer of every worker's log and event
//! channels; the excluded UI frontend drives it from the controlling
//! thread and never touches worker state directly.

use std::{fmt, path::PathBuf, thread, time::Duration};

use crate::error::Error;

use super::{
    bus::WorkerEvent,
    capture::{spawn_capture_supervisor, CaptureConfig, CaptureServiceFactory},
    display_tool::{spawn_display_tool, DisplayToolConfig},
    images::spawn_image_source,
    logs::{LogBuffer, LogEntry},
    scan_tool::{spawn_scan_tool, ScanToolConfig},
    worker::{WorkerHandle, WorkerState},
};

/// Named exclusivity bucket holding at most one active worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Capture supervisor or passive image source.
    Source,
    ScanTool,
    Display,
}

impl Slot {
    const ALL: [Slot; 3] = [Slot::Source, Slot::ScanTool, Slot::Display];
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Slot::Source => "source",
            Slot::ScanTool => "scan-tool",
            Slot::Display => "display",
        })
    }
}

/// Bounds for the best-effort shutdown loop. Intervals of roughly one
/// second; the scan tool gets a larger budget since service-mode cleanup
/// can take longer.
#[derive(Debug, Clone)]
pub struct ShutdownPolicy {
    pub poll_interval: Duration,
    pub source_budget: usize,
    pub scan_tool_budget: usize,
    pub display_budget: usize,
}

impl ShutdownPolicy {
    fn budget(&self, slot: Slot) -> usize {
        match slot {
            Slot::Source => self.source_budget,
            Slot::ScanTool => self.scan_tool_budget,
            Slot::Display => self.display_budget,
        }
    }
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            source_budget: 20,
            scan_tool_budget: 60,
            display_budget: 20,
        }
    }
}

/// Controller for the three worker slots.
pub struct Orchestrator {
    source: Option<WorkerHandle>,
    scan_tool: Option<WorkerHandle>,
    display: Option<WorkerHandle>,
    log_buffer: LogBuffer,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            source: None,
            scan_tool: None,
            display: None,
            log_buffer: LogBuffer::default(),
        }
    }

    /// Start the capture supervisor in the source slot.
    pub fn start_capture(
        &mut self,
        config: CaptureConfig,
        factory: CaptureServiceFactory,
    ) -> Result<(), Error> {
        self.claim(Slot::Source)?;
        *self.slot_mut(Slot::Source) = Some(spawn_capture_supervisor(config, factory));
        Ok(())
    }

    /// Start the passive image source in the source slot.
    pub fn start_image_source(
        &mut self,
        devices_dir: PathBuf,
        images: Vec<PathBuf>,
    ) -> Result<(), Error> {
        self.claim(Slot::Source)?;
        *self.slot_mut(Slot::Source) = Some(spawn_image_source(devices_dir, images));
        Ok(())
    }

    /// Start the scan tool (setup or service mode) in its slot.
    pub fn start_scan_tool(&mut self, config: ScanToolConfig) -> Result<(), Error> {
        self.claim(Slot::ScanTool)?;
        *self.slot_mut(Slot::ScanTool) = Some(spawn_scan_tool(config));
        Ok(())
    }

    /// Start the display tool in its slot.
    pub fn start_display_tool(&mut self, config: DisplayToolConfig) -> Result<(), Error> {
        self.claim(Slot::Display)?;
        *self.slot_mut(Slot::Display) = Some(spawn_display_tool(config));
        Ok(())
    }

    /// Request a cooperative stop of the slot's worker. Returns whether
    /// an active worker was asked to stop; a vacant or already-terminal
    /// slot is a no-op.
    pub fn request_stop(&mut self, slot: Slot) -> bool {
        match self.slot_ref(slot) {
            Some(handle) if handle.is_active() => {
                log::info!("stop requested for {slot} worker");
                handle.request_stop();
                true
            }
            _ => false,
        }
    }

    /// Current state of the slot's worker, if one was ever started.
    pub fn state(&self, slot: Slot) -> Option<WorkerState> {
        self.slot_ref(slot).map(WorkerHandle::state)
    }

    pub fn is_active(&self, slot: Slot) -> bool {
        self.slot_ref(slot)
            .map(WorkerHandle::is_active)
            .unwrap_or(false)
    }

    /// Drain pending log lines from every slot, in per-worker emission
    /// order, appending each to the retained buffer.
    pub fn drain_logs(&mut self) -> Vec<(Slot, LogEntry)> {
        let mut drained = Vec::new();
        for slot in Slot::ALL {
            let entries = match self.slot_ref(slot) {
                Some(handle) => handle.drain_logs(),
                None => continue,
            };
            for entry in entries {
                self.log_buffer.push(entry.clone());
                drained.push((slot, entry));
            }
        }
        drained
    }

    /// Drain pending lifecycle events from every slot.
    pub fn drain_events(&mut self) -> Vec<(Slot, WorkerEvent)> {
        let mut drained = Vec::new();
        for slot in Slot::ALL {
            if let Some(handle) = self.slot_ref(slot) {
                for event in handle.drain_events() {
                    drained.push((slot, event));
                }
            }
        }
        drained
    }

    /// Retained log history across worker lifetimes.
    pub fn log_buffer(&self) -> &LogBuffer {
        &self.log_buffer
    }

    /// Best-effort ordered shutdown of every occupied slot: request stop,
    /// poll within the slot's budget while keeping log delivery flowing,
    /// then move on regardless. Never blocks forever.
    pub fn shutdown(&mut self, policy: &ShutdownPolicy) {
        for slot in Slot::ALL {
            self.request_stop(slot);

            let budget = policy.budget(slot);
            for _ in 0..budget {
                self.drain_logs();
                if !self.is_active(slot) {
                    break;
                }
                thread::sleep(policy.poll_interval);
            }

            self.drain_logs();
            if let Some(mut handle) = self.slot_mut(slot).take() {
                if handle.join(Duration::ZERO) {
                    self.drain_from(slot, &handle);
                } else {
                    log::warn!("{slot} worker still running after shutdown budget, proceeding");
                }
            }
        }
    }

    /// Reject when the slot is occupied by an active worker; otherwise
    /// flush and discard the previous terminal occupant.
    fn claim(&mut self, slot: Slot) -> Result<(), Error> {
        if let Some(handle) = self.slot_ref(slot) {
            if handle.is_active() {
                return Err(Error::SlotBusy(slot));
            }
        }
        if let Some(mut handle) = self.slot_mut(slot).take() {
            handle.join(Duration::ZERO);
            self.drain_from(slot, &handle);
        }
        Ok(())
    }

    /// Absorb leftover log lines of a handle being retired.
    fn drain_from(&mut self, slot: Slot, handle: &WorkerHandle) {
        for entry in handle.drain_logs() {
            log::debug!("[{slot}] {}", entry.message);
            self.log_buffer.push(entry);
        }
    }

    fn slot_ref(&self, slot: Slot) -> Option<&WorkerHandle> {
        match slot {
            Slot::Source => self.source.as_ref(),
            Slot::ScanTool => self.scan_tool.as_ref(),
            Slot::Display => self.display.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<WorkerHandle> {
        match slot {
            Slot::Source => &mut self.source,
            Slot::ScanTool => &mut self.scan_tool,
            Slot::Display => &mut self.display,
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
