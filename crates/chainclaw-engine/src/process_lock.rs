//! Single-instance advisory lock (spec.md §6 "only one live process may
//! hold the data directory"): a `chainclaw.lock` file recording the owning
//! PID and acquisition time, reclaimed at startup if that PID is no longer
//! alive or the file has aged past a staleness threshold.
//!
//! The liveness check is grounded on `lanegrid-agtrace`'s
//! `libc::kill(pid, 0)` pattern for probing whether a recorded PID is still
//! running (`examples/lanegrid-agtrace/crates/agtrace-cli/src/intervention.rs`),
//! generalized from a send-signal-to-intervene use to a pure liveness
//! probe (signal `0` sends nothing, it only checks permission/existence).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A lock file older than this is reclaimed even if its PID happens to
/// still resolve to a live process (e.g. PID reuse after a hard crash).
const STALE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
struct LockContents {
    pid: u32,
    acquired_at_unix_ms: i64,
}

/// Held for the process's lifetime; the lock file is removed on `Drop` so a
/// clean shutdown always leaves the data directory unlocked.
pub struct ProcessLock {
    path: PathBuf,
}

impl ProcessLock {
    /// Acquires the lock in `data_dir`, reclaiming a stale one in place.
    /// Fails if a live, non-stale process already holds it.
    pub fn acquire(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join("chainclaw.lock");

        if let Some(existing) = read_lock(&path)? {
            if !is_stale(&existing) && is_pid_alive(existing.pid) {
                anyhow::bail!(
                    "data directory is locked by pid {} (acquired at {}); \
                     another chainclaw-engine instance appears to be running",
                    existing.pid,
                    existing.acquired_at_unix_ms
                );
            }
            tracing::warn!(
                stale_pid = existing.pid,
                "process_lock: reclaiming stale lock file"
            );
        }

        let contents = LockContents {
            pid: std::process::id(),
            acquired_at_unix_ms: now_unix_ms(),
        };
        let serialized = serde_json::to_string_pretty(&contents)?;
        fs::write(&path, serialized)?;
        Ok(Self { path })
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %err, path = %self.path.display(), "process_lock: failed to remove lock file on drop");
            }
        }
    }
}

fn read_lock(path: &Path) -> anyhow::Result<Option<LockContents>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(serde_json::from_str(&raw).ok()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn is_stale(lock: &LockContents) -> bool {
    let age_ms = now_unix_ms() - lock.acquired_at_unix_ms;
    age_ms > STALE_AGE.as_millis() as i64
}

fn is_pid_alive(pid: u32) -> bool {
    // Signal 0 performs no signal delivery, only existence/permission
    // checks, so this is a pure liveness probe.
    let result = unsafe { libc::kill(pid as i32, 0) };
    result == 0
}

fn now_unix_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquiring_twice_in_the_same_directory_fails_while_the_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let first = ProcessLock::acquire(dir.path()).unwrap();
        let second = ProcessLock::acquire(dir.path());
        assert!(second.is_err());
        first.release();
    }

    #[test]
    fn lock_is_reclaimable_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let first = ProcessLock::acquire(dir.path()).unwrap();
        first.release();
        let second = ProcessLock::acquire(dir.path());
        assert!(second.is_ok());
    }

    #[test]
    fn a_lock_file_from_a_dead_pid_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chainclaw.lock");
        // PID 1 exists as init but very large PIDs are never assigned on
        // a normal Linux host; used here as a "definitely dead" stand-in.
        let dead = LockContents { pid: 999_999, acquired_at_unix_ms: now_unix_ms() };
        fs::write(&path, serde_json::to_string(&dead).unwrap()).unwrap();
        let acquired = ProcessLock::acquire(dir.path());
        assert!(acquired.is_ok());
    }
}
