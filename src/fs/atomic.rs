//! Atomic filesystem operations.
//!
//! Every write follows the same pattern:
//! 1. Write content to a temporary sibling file
//! 2. Sync it to disk
//! 3. Rename it over the target
//!
//! `rename` is atomic when source and destination share a filesystem, which
//! holds because the temp file lives next to the target. On crash a stale
//! `.{filename}.{pid}.tmp` may remain; it is never read.

use crate::error::{Result, TierwatchError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Atomically write bytes to a file, creating parent directories as needed.
///
/// # Returns
///
/// * `Ok(())` - The target now holds exactly `content`
/// * `Err(TierwatchError::Store)` - On create, write, sync or rename failure
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            TierwatchError::Store(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = temp_path_for(path)?;
    write_and_sync(&temp_path, content)?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        TierwatchError::Store(format!(
            "failed to atomically replace '{}': {}",
            path.display(),
            e
        ))
    })?;

    #[cfg(unix)]
    if let Some(parent) = path.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn atomic_write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let mut json = serde_json::to_vec_pretty(value).map_err(|e| {
        TierwatchError::Store(format!("failed to serialize '{}': {}", path.display(), e))
    })?;
    json.push(b'\n');
    atomic_write(path, &json)
}

/// Read a JSON file, returning `T::default()` when it does not exist yet.
pub fn read_json_or_default<P: AsRef<Path>, T: DeserializeOwned + Default>(path: P) -> Result<T> {
    let path = path.as_ref();
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(TierwatchError::Store(format!(
                "failed to read '{}': {}",
                path.display(),
                e
            )));
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes).map_err(|e| {
        TierwatchError::Store(format!("failed to parse '{}': {}", path.display(), e))
    })
}

/// Temp file next to the target, unique per process and call.
fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            TierwatchError::Store(format!("invalid file path '{}'", target.display()))
        })?;
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let temp_name = format!(".{}.{}.{}.tmp", filename, std::process::id(), seq);
    Ok(match target.parent() {
        Some(parent) => parent.join(temp_name),
        None => PathBuf::from(temp_name),
    })
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        TierwatchError::Store(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let written = file.write_all(content).and_then(|_| file.sync_all());
    if let Err(e) = written {
        let _ = fs::remove_file(path);
        return Err(TierwatchError::Store(format!(
            "failed to write temporary file '{}': {}",
            path.display(),
            e
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("usage.json");
        fs::write(&path, "old").unwrap();

        atomic_write(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("nested").join("tasks.json");

        atomic_write(&path, b"{}").unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tasks.json");

        atomic_write(&path, b"[]").unwrap();
        atomic_write(&path, b"[1]").unwrap();

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_json_helpers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("map.json");

        let missing: BTreeMap<String, u32> = read_json_or_default(&path).unwrap();
        assert!(missing.is_empty());

        let mut map = BTreeMap::new();
        map.insert("A".to_string(), 3u32);
        atomic_write_json(&path, &map).unwrap();

        let loaded: BTreeMap<String, u32> = read_json_or_default(&path).unwrap();
        assert_eq!(loaded, map);
    }

    #[test]
    fn test_corrupt_json_is_store_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();

        let err = read_json_or_default::<_, BTreeMap<String, u32>>(&path).unwrap_err();
        assert!(matches!(err, TierwatchError::Store(_)));
    }

    #[test]
    fn test_concurrent_writers_to_distinct_files() {
        let temp_dir = TempDir::new().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = temp_dir.path().join(format!("file_{}.json", i));
                std::thread::spawn(move || {
                    atomic_write(&path, format!("{}", i).as_bytes()).unwrap();
                    (path, i)
                })
            })
            .collect();

        for handle in handles {
            let (path, i) = handle.join().unwrap();
            assert_eq!(fs::read_to_string(&path).unwrap(), i.to_string());
        }
    }
}
