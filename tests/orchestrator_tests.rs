//! Slot exclusivity and best-effort shutdown sequencing.

use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use shelfcam::{
    core::{Orchestrator, ShutdownPolicy, Slot, WorkerState},
    Error,
};

const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fast_policy() -> ShutdownPolicy {
    ShutdownPolicy {
        poll_interval: Duration::from_millis(20),
        source_budget: 100,
        scan_tool_budget: 100,
        display_budget: 100,
    }
}

fn wait_until_inactive(orchestrator: &mut Orchestrator, slot: Slot, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        orchestrator.drain_logs();
        if !orchestrator.is_active(slot) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn second_start_in_occupied_slot_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut orchestrator = Orchestrator::new();

    orchestrator
        .start_image_source(dir.path().to_path_buf(), Vec::new())
        .expect("first start");
    assert!(orchestrator.is_active(Slot::Source));

    let second = orchestrator.start_image_source(dir.path().to_path_buf(), Vec::new());
    match second {
        Err(Error::SlotBusy(Slot::Source)) => {}
        Err(other) => panic!("expected SlotBusy, got {other}"),
        Ok(()) => panic!("expected SlotBusy, got Ok"),
    }

    // The active worker was not disturbed by the rejected request.
    assert!(orchestrator.is_active(Slot::Source));

    orchestrator.request_stop(Slot::Source);
    assert!(wait_until_inactive(&mut orchestrator, Slot::Source, WAIT));
}

#[test]
fn slot_reopens_after_the_worker_finishes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut orchestrator = Orchestrator::new();

    orchestrator
        .start_image_source(dir.path().to_path_buf(), Vec::new())
        .expect("first start");
    orchestrator.request_stop(Slot::Source);
    assert!(wait_until_inactive(&mut orchestrator, Slot::Source, WAIT));
    assert_eq!(orchestrator.state(Slot::Source), Some(WorkerState::Finished));

    orchestrator
        .start_image_source(dir.path().to_path_buf(), Vec::new())
        .expect("restart after finish");
    orchestrator.request_stop(Slot::Source);
    assert!(wait_until_inactive(&mut orchestrator, Slot::Source, WAIT));
}

#[test]
fn slots_are_independent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut orchestrator = Orchestrator::new();

    orchestrator
        .start_image_source(dir.path().to_path_buf(), Vec::new())
        .expect("source start");

    // A scan tool with a missing path occupies its own slot and finishes
    // on its own; the source slot is unaffected.
    orchestrator
        .start_scan_tool(shelfcam::core::ScanToolConfig {
            interpreter: PathBuf::from("/bin/sh"),
            tool_path: dir.path().join("missing_tool.sh"),
            project_root: dir.path().to_path_buf(),
            mode: shelfcam::core::ScanMode::Setup,
        })
        .expect("scan tool start");

    assert!(wait_until_inactive(&mut orchestrator, Slot::ScanTool, WAIT));
    assert!(orchestrator.is_active(Slot::Source));

    orchestrator.request_stop(Slot::Source);
    assert!(wait_until_inactive(&mut orchestrator, Slot::Source, WAIT));
}

#[test]
fn stop_on_vacant_slot_is_a_noop() {
    let mut orchestrator = Orchestrator::new();
    assert!(!orchestrator.request_stop(Slot::Source));
    assert!(!orchestrator.request_stop(Slot::ScanTool));
    assert!(!orchestrator.request_stop(Slot::Display));
    assert_eq!(orchestrator.state(Slot::Display), None);
}

#[test]
fn drained_logs_are_slot_tagged_and_retained() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut orchestrator = Orchestrator::new();

    orchestrator
        .start_image_source(dir.path().to_path_buf(), Vec::new())
        .expect("source start");

    let deadline = Instant::now() + WAIT;
    let mut tagged = Vec::new();
    while tagged.is_empty() && Instant::now() < deadline {
        tagged = orchestrator.drain_logs();
        thread::sleep(Duration::from_millis(10));
    }

    assert!(tagged.iter().all(|(slot, _)| *slot == Slot::Source));
    assert!(tagged
        .iter()
        .any(|(_, entry)| entry.message.contains("Image Source Mode")));
    assert!(!orchestrator.log_buffer().is_empty());

    orchestrator.request_stop(Slot::Source);
    assert!(wait_until_inactive(&mut orchestrator, Slot::Source, WAIT));
}

#[test]
fn shutdown_stops_every_occupied_slot() {
    init_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let mut orchestrator = Orchestrator::new();

    orchestrator
        .start_image_source(dir.path().to_path_buf(), Vec::new())
        .expect("source start");

    orchestrator.shutdown(&fast_policy());

    assert!(!orchestrator.is_active(Slot::Source));
    // The slot was vacated, so a new start is accepted immediately.
    orchestrator
        .start_image_source(dir.path().to_path_buf(), Vec::new())
        .expect("restart after shutdown");
    orchestrator.shutdown(&fast_policy());

    // The retained buffer kept the workers' final lines.
    assert!(orchestrator
        .log_buffer()
        .entries()
        .iter()
        .any(|e| e.message == "Image source stopped."));
}

#[cfg(unix)]
#[test]
fn shutdown_terminates_a_live_display_tool() {
    init_logging();
    let dir = tempfile::tempdir().expect("tempdir");
    let script = dir.path().join("display_camera.sh");
    std::fs::write(
        &script,
        "trap 'exit 0' TERM\necho ready\nwhile :; do sleep 1; done\n",
    )
    .expect("write script");

    let mut orchestrator = Orchestrator::new();
    orchestrator
        .start_display_tool(shelfcam::core::DisplayToolConfig {
            interpreter: PathBuf::from("/bin/sh"),
            tool_path: script,
            project_root: dir.path().to_path_buf(),
            root_dir: dir.path().join("product_visual"),
            title: "Product Detection".to_string(),
        })
        .expect("display start");

    // Let the child come up before asking everything to wind down.
    let deadline = Instant::now() + WAIT;
    loop {
        let logs = orchestrator.drain_logs();
        if logs.iter().any(|(_, e)| e.message == "ready") {
            break;
        }
        assert!(Instant::now() < deadline, "display tool never came up");
        thread::sleep(Duration::from_millis(10));
    }

    orchestrator.shutdown(&fast_policy());
    assert!(!orchestrator.is_active(Slot::Display));
    assert!(orchestrator
        .log_buffer()
        .entries()
        .iter()
        .any(|e| e.message == "cam display exited with code 0"));
}
