//! Exclusive run locks
//!
//! One lock file per module under `{data-dir}/locks/`. A lock is taken with
//! `create_new`, so a second harvester touching the same module fails fast
//! instead of interleaving writes. Locks are released when the guard drops.
//!
//! A lock file records the owner's pid. A lock whose owner is no longer
//! running (crash, kill, forced exit) is taken over with a warning.

use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Subdirectory of the data directory holding lock files
pub const LOCK_DIR: &str = "locks";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock {path} is held by another run (use --break-locks if it is stale)")]
    Held { path: PathBuf },

    #[error("Failed to manage lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Guard over the lock files of every module in a run
#[derive(Debug)]
pub struct RunLock {
    paths: Vec<PathBuf>,
}

impl RunLock {
    /// Takes the lock of every listed module, or none of them
    pub fn acquire(data_dir: &Path, module_ids: &[String]) -> Result<Self, LockError> {
        let dir = data_dir.join(LOCK_DIR);
        fs::create_dir_all(&dir).map_err(|source| LockError::Io {
            path: dir.clone(),
            source,
        })?;

        // Pushed as we go so an early return releases what was taken
        let mut guard = Self { paths: Vec::new() };
        for module_id in module_ids {
            let path = lock_path(data_dir, module_id);
            let mut file = match create_lock_file(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    take_over_stale(&path)?
                }
                Err(source) => return Err(LockError::Io { path, source }),
            };
            guard.paths.push(path.clone());

            writeln!(file, "pid={}", std::process::id())
                .and_then(|_| writeln!(file, "started={}", Utc::now().to_rfc3339()))
                .map_err(|source| LockError::Io { path, source })?;
        }

        tracing::debug!("Acquired {} run lock(s)", guard.paths.len());
        Ok(guard)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!("Failed to release lock {}: {}", path.display(), e);
            }
        }
    }
}

fn create_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Replaces a lock left behind by a process that is gone
///
/// Locks with a live, unreadable or missing owner pid stay held.
fn take_over_stale(path: &Path) -> Result<File, LockError> {
    let held = || LockError::Held {
        path: path.to_path_buf(),
    };
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        // Released between our create and read; try once more
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(LockError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if !content.is_empty() {
        let pid = owner_pid(&content).ok_or_else(held)?;
        if pid == std::process::id() || process_alive(pid) {
            return Err(held());
        }
        tracing::warn!(
            "Taking over stale lock {} (owner pid {} is not running)",
            path.display(),
            pid
        );
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(LockError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    // Another run may win the race for the freed lock
    create_lock_file(path).map_err(|e| {
        if e.kind() == io::ErrorKind::AlreadyExists {
            held()
        } else {
            LockError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

fn owner_pid(content: &str) -> Option<u32> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("pid="))
        .and_then(|pid| pid.trim().parse().ok())
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn process_alive(pid: u32) -> bool {
    // `kill -0` sends no signal; it fails when no such process exists
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

pub fn lock_path(data_dir: &Path, module_id: &str) -> PathBuf {
    data_dir.join(LOCK_DIR).join(format!("{}.lock", module_id))
}

/// Removes stale locks of the listed modules; returns how many existed
pub fn break_locks(data_dir: &Path, module_ids: &[String]) -> Result<usize, LockError> {
    let mut removed = 0;
    for module_id in module_ids {
        let path = lock_path(data_dir, module_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::warn!("Removed stale lock {}", path.display());
                removed += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(LockError::Io { path, source }),
        }
    }
    Ok(removed)
}
