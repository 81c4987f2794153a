//! Passive "existing images" source worker.
//!
//! Heartbeat-only counterpart to the capture supervisor: it logs what it
//! was configured with and then idles until stopped. It never writes to,
//! clears, or recreates the device directory, which is what makes it
//! safe to run concurrently with tools reading the same folder.

use std::path::PathBuf;

use super::worker::{spawn_worker, WorkerHandle};

pub fn spawn_image_source(devices_dir: PathBuf, images: Vec<PathBuf>) -> WorkerHandle {
    spawn_worker("image-source", move |ctx| {
        ctx.mark_running();
        ctx.log("Image Source Mode (no camera capture)");
        ctx.log(format!("Devices folder: {}", devices_dir.display()));

        if images.is_empty() {
            ctx.log("No images selected.");
        } else {
            ctx.log(format!("Using {} image(s):", images.len()));
            for path in &images {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                ctx.log(format!(" - {name}"));
            }
        }

        ctx.idle_until_stopped();
        ctx.log("Image source stopped.");
        Ok(())
    })
}
