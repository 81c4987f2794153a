//! Path conventions for the shared device directory.
//!
//! Downstream tools (scan tool, display tool) read per-camera frame files
//! out of one canonical `devices` folder. Everything here is pure path
//! manipulation plus read-only filesystem probing; the destructive
//! clear/recreate of the directory belongs to the capture supervisor.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Canonical final segment of every device directory.
pub const DEVICES_DIR_NAME: &str = "devices";

/// Install root probed first by [`default_devices_root`].
const PREFERRED_INSTALL_ROOT: &str = "E:/Projects/retrux-shelf-components-main";

/// Normalize a user-supplied root so its final segment is the canonical
/// devices folder name. Accepts either `.../active_state` or
/// `.../active_state/devices` (any case) and is idempotent.
pub fn normalize_devices_dir(path: &Path) -> PathBuf {
    let already_devices = path
        .file_name()
        .map(|name| name.to_string_lossy().eq_ignore_ascii_case(DEVICES_DIR_NAME))
        .unwrap_or(false);

    if already_devices {
        path.to_path_buf()
    } else {
        path.join(DEVICES_DIR_NAME)
    }
}

/// The `active_state` directory that owns the devices folder.
pub fn active_state_dir(devices_dir: &Path) -> PathBuf {
    let normalized = normalize_devices_dir(devices_dir);
    match normalized.parent() {
        Some(parent) => parent.to_path_buf(),
        None => normalized,
    }
}

/// Frame file written by the capture service for one camera,
/// `camera_<id>_frame.jpg` with a zero-padded 3-digit id.
pub fn camera_frame_file(devices_dir: &Path, camera_index: u32) -> PathBuf {
    devices_dir.join(format!("camera_{camera_index:03}_frame.jpg"))
}

/// Display label for one camera, `camera_<id>` with a zero-padded id.
pub fn camera_label(camera_index: u32) -> String {
    format!("camera_{camera_index:03}")
}

/// Absolute paths of `*.jpg` files directly inside `dir`, sorted by name.
/// A missing or unreadable directory yields an empty list.
pub fn find_jpg_images(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut images: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("jpg"))
                    .unwrap_or(false)
        })
        .collect();
    images.sort();
    images
}

/// Default devices directory, resolved through an ordered fallback chain:
/// the preferred install root when it (or its parent) exists on this
/// machine, otherwise the per-user location under the home directory.
pub fn default_devices_root() -> PathBuf {
    let preferred = Path::new(PREFERRED_INSTALL_ROOT)
        .join("retruxosaproject")
        .join("app_root")
        .join("active_state")
        .join(DEVICES_DIR_NAME);

    let parent_exists = preferred
        .parent()
        .map(Path::is_dir)
        .unwrap_or(false);
    if preferred.is_dir() || parent_exists {
        return preferred;
    }

    home_dir()
        .join("retruxosaproject")
        .join("app_root")
        .join("active_state")
        .join(DEVICES_DIR_NAME)
}

fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_appends_canonical_segment() {
        let root = Path::new("/data/active_state");
        assert_eq!(
            normalize_devices_dir(root),
            PathBuf::from("/data/active_state/devices")
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let devices = Path::new("/data/active_state/devices");
        let once = normalize_devices_dir(devices);
        let twice = normalize_devices_dir(&once);
        assert_eq!(once, twice);
        assert_eq!(
            normalize_devices_dir(Path::new("/data/active_state")),
            once
        );
    }

    #[test]
    fn normalize_matches_case_insensitively() {
        assert_eq!(
            normalize_devices_dir(Path::new("/data/Devices")),
            PathBuf::from("/data/Devices")
        );
    }

    #[test]
    fn active_state_is_parent_of_devices() {
        assert_eq!(
            active_state_dir(Path::new("/data/active_state")),
            PathBuf::from("/data/active_state")
        );
        assert_eq!(
            active_state_dir(Path::new("/data/active_state/devices")),
            PathBuf::from("/data/active_state")
        );
    }

    #[test]
    fn frame_file_uses_zero_padded_id() {
        assert_eq!(
            camera_frame_file(Path::new("/dev"), 7),
            PathBuf::from("/dev/camera_007_frame.jpg")
        );
        assert_eq!(camera_label(42), "camera_042");
    }

    #[test]
    fn find_jpg_images_filters_and_sorts() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.jpg", "a.JPG", "c.png", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").expect("write fixture");
        }

        let found = find_jpg_images(dir.path());
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.jpg"]);
    }

    #[test]
    fn find_jpg_images_tolerates_missing_dir() {
        assert!(find_jpg_images(Path::new("/definitely/not/here")).is_empty());
    }
}
