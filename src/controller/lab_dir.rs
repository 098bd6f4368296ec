//! Lab working directory cleanup, including the directory heuristic used
//! when no container metadata points at a lab.

use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

const LAB_DIR_PREFIX: &str = "clab-";

/// Directories named `clab-*` directly under `dir`, sorted by name.
pub fn find_lab_dirs(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(LAB_DIR_PREFIX))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    dirs
}

/// Best-effort cleanup when no lab container was found.
///
/// Looks for `clab-*` next to the topology file when one is given, in the
/// current directory otherwise, and removes only the first match. This is a
/// guess: with several matches the others are left in place.
pub fn fallback_cleanup(topology: Option<&Path>) -> Option<PathBuf> {
    let search_dir = match topology.and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    debug!("Looking for lab directories in {}", search_dir.display());

    let matches = find_lab_dirs(&search_dir);
    let first = matches.first()?;
    if matches.len() > 1 {
        warn!(
            "Found {} lab directories in {}, removing only {}",
            matches.len(),
            search_dir.display(),
            first.display()
        );
    }
    remove_lab_dir(first).then(|| first.clone())
}

/// Recursively removes `dir`. Failures are logged, never returned.
pub fn remove_lab_dir(dir: &Path) -> bool {
    if dir.as_os_str().is_empty() {
        return false;
    }
    info!("Removing lab directory: {}", dir.display());
    match fs::remove_dir_all(dir) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Lab directory {} does not exist", dir.display());
            false
        }
        Err(e) => {
            error!("Error deleting lab directory {}: {}", dir.display(), e);
            false
        }
    }
}
