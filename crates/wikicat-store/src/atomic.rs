//! Atomic file replacement
//!
//! Content goes to a sibling temp file first and is renamed over the target,
//! so readers never observe a half-written rules file or page.

use crate::errors::{io_error, Result};
use std::fs;
use std::path::{Path, PathBuf};

fn temp_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Atomically replace `target_path` with `content`, creating parent directories
pub fn atomic_write(target_path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| io_error("create_parent_dir", e))?;
    }

    let temp = temp_path(target_path);
    fs::write(&temp, content).map_err(|e| io_error("write_temp", e))?;
    fs::rename(&temp, target_path).map_err(|e| {
        let _ = fs::remove_file(&temp);
        io_error("rename_temp", e)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("rules.json");

        atomic_write(&target, b"first").unwrap();
        atomic_write(&target, b"second").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"second");
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("deeper").join("rules.json");

        atomic_write(&target, b"{}").unwrap();

        assert!(target.exists());
    }

    #[test]
    fn test_no_temp_files_left() {
        let dir = TempDir::new().unwrap();
        atomic_write(&dir.path().join("a.json"), b"{}").unwrap();

        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_temp_path_keeps_extension() {
        let p = temp_path(Path::new("/x/rules.json"));
        assert_eq!(p, PathBuf::from("/x/rules.json.tmp"));
    }
}
