//! Capture service supervisor.
//!
//! Builds and starts one externally-implemented capture service per
//! selected camera, staggering startups to avoid simultaneous camera
//! acquisition, then idles until a stop is requested. Stop and join
//! failures of individual services are logged and isolated; they never
//! abort the siblings.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use rand::Rng;

use crate::paths::{camera_frame_file, camera_label, normalize_devices_dir};

use super::worker::{spawn_worker, WorkerContext, WorkerHandle};

/// Bound on joining one capture service thread during shutdown.
pub const SERVICE_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-camera background capture task, implemented outside this crate.
///
/// Continuously writes the latest captured frame to the file it was
/// constructed with. `stop` and `join` failures are reported to the
/// supervisor log, never propagated.
pub trait CaptureService: Send {
    /// Label the service was constructed with, e.g. `camera_003`.
    fn camera_label(&self) -> &str;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Wait for the service's thread to end, bounded by `timeout`.
    fn join(&mut self, timeout: Duration) -> Result<()>;
}

/// Camera discovery, implemented outside this crate. Called on demand
/// for a rescan; results are not cached here.
pub trait CameraScanner {
    /// Ordered indices of usable cameras up to `max_index`.
    fn scan(&mut self, max_index: u32) -> Vec<u32>;
}

/// Constructor seam for capture services: `(label, index, frame_path)`.
pub type CaptureServiceFactory =
    Box<dyn Fn(&str, u32, &Path) -> Box<dyn CaptureService> + Send>;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Root of the shared device directory; normalized on start.
    pub devices_dir: PathBuf,
    /// Selected camera indices; order defines startup order.
    pub cameras: Vec<u32>,
    /// Base delay between consecutive service startups. Jittered by up
    /// to ±50%. Zero disables staggering (tests).
    pub stagger: Duration,
}

impl CaptureConfig {
    pub fn new(devices_dir: impl Into<PathBuf>, cameras: Vec<u32>) -> Self {
        Self {
            devices_dir: devices_dir.into(),
            cameras,
            stagger: Duration::from_secs(1),
        }
    }
}

/// Start the supervisor on its own thread and hand back the handle.
pub fn spawn_capture_supervisor(
    config: CaptureConfig,
    factory: CaptureServiceFactory,
) -> WorkerHandle {
    spawn_worker("capture-supervisor", move |ctx| run(config, factory, ctx))
}

fn run(config: CaptureConfig, factory: CaptureServiceFactory, ctx: &WorkerContext) -> Result<()> {
    let devices_dir = normalize_devices_dir(&config.devices_dir);

    ctx.log("Background Camera Server System");
    ctx.mark_running();

    // Destructive clear + recreate. Only this worker may do this, and
    // only while it holds the source slot. A missing directory is fine.
    ctx.log(format!("Preparing directory: {}", devices_dir.display()));
    if let Err(err) = fs::remove_dir_all(&devices_dir) {
        if err.kind() != ErrorKind::NotFound {
            log::warn!("clearing {} failed: {err}", devices_dir.display());
        }
    }
    fs::create_dir_all(&devices_dir)
        .with_context(|| format!("creating devices directory {}", devices_dir.display()))?;

    ctx.log("Searching For Valid Cameras...");
    if config.cameras.is_empty() {
        ctx.log("No cameras selected.");
        return Ok(());
    }

    ctx.log(format!("Found {} Cameras", config.cameras.len()));
    ctx.log("Starting Background Services...");

    let mut services = Vec::with_capacity(config.cameras.len());
    for &camera_id in &config.cameras {
        let label = camera_label(camera_id);
        let frame_file = camera_frame_file(&devices_dir, camera_id);
        services.push(factory(&label, camera_id, &frame_file));
    }

    // Start in selection order with a jittered gap so cameras are not
    // acquired simultaneously. A start fault is fatal to the group.
    let mut rng = rand::rng();
    let total = services.len();
    for (index, service) in services.iter_mut().enumerate() {
        ctx.log(format!("Starting {} ...", service.camera_label()));
        service
            .start()
            .with_context(|| format!("starting {}", service.camera_label()))?;
        if index + 1 < total && !config.stagger.is_zero() {
            thread::sleep(config.stagger.mul_f64(rng.random_range(0.5..=1.5)));
        }
    }

    ctx.log("All Service Is Running");
    ctx.idle_until_stopped();

    // Stop everything in start order, continuing past failures, then
    // join in the same order with a bounded wait each.
    ctx.log("Stopping all services...");
    for service in services.iter_mut() {
        ctx.log(format!("Stopping {} ...", service.camera_label()));
        if let Err(err) = service.stop() {
            ctx.log_warning(format!(
                "Error during stop() on {}: {err}",
                service.camera_label()
            ));
        }
    }
    for service in services.iter_mut() {
        match service.join(SERVICE_JOIN_TIMEOUT) {
            Ok(()) => ctx.log(format!("Joined {}", service.camera_label())),
            Err(err) => ctx.log_warning(format!(
                "Error during join() on {}: {err}",
                service.camera_label()
            )),
        }
    }

    ctx.log("All Services are Finished.");
    Ok(())
}
