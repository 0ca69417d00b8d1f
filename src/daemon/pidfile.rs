//! PID lockfile: filesystem mutual exclusion for the daemon singleton

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{debug, warn};

use super::DaemonError;

/// Lockfile holding the owning daemon's PID. First writer wins; a lock left
/// behind by a dead process is reclaimable.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID recorded in the lockfile, provided that process is still alive.
    /// Unreadable, unparseable, or dead-owner locks all read as `None`.
    pub fn read_owner(&self) -> Option<Pid> {
        let text = fs::read_to_string(&self.path).ok()?;
        let raw: i32 = text.trim().parse().ok()?;
        if raw <= 0 {
            return None;
        }
        let pid = Pid::from_raw(raw);
        match kill(pid, None) {
            Ok(()) => Some(pid),
            // Not ours to signal, but alive.
            Err(Errno::EPERM) => Some(pid),
            Err(_) => None,
        }
    }

    /// Take the lock for the calling process. A stale lock is broken and
    /// acquisition retried once; a live owner wins.
    pub fn acquire(&self) -> Result<(), DaemonError> {
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&self.path) {
                Ok(mut file) => {
                    writeln!(file, "{}", std::process::id())?;
                    debug!("acquired pid lock {}", self.path.display());
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if let Some(owner) = self.read_owner() {
                        return Err(DaemonError::AlreadyRunning(owner));
                    }
                    warn!("breaking stale pid lock {}", self.path.display());
                    let _ = fs::remove_file(&self.path);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(DaemonError::LockContended)
    }

    /// Release an acquired lock.
    pub fn release(&self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("could not release pid lock {}: {e}", self.path.display());
        }
    }

    /// Remove the lock with prejudice, whoever holds it.
    pub fn break_lock(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fadestick-pidfile-{tag}-{}.pid", std::process::id()))
    }

    #[test]
    fn test_acquire_records_own_pid() {
        let lock = PidFile::new(lock_path("own"));
        lock.acquire().unwrap();
        let text = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(text.trim().parse::<u32>().unwrap(), std::process::id());
        assert_eq!(lock.read_owner(), Some(Pid::from_raw(std::process::id() as i32)));
        lock.release();
        assert!(lock.read_owner().is_none());
    }

    #[test]
    fn test_live_owner_refuses_second_acquire() {
        let lock = PidFile::new(lock_path("live"));
        lock.acquire().unwrap();
        assert!(matches!(lock.acquire(), Err(DaemonError::AlreadyRunning(_))));
        lock.release();
    }

    #[test]
    fn test_stale_lock_is_reclaimed() {
        let path = lock_path("stale");
        // A child that has already been reaped leaves a dead pid behind.
        let dead = std::process::Command::new("true")
            .spawn()
            .and_then(|mut c| c.wait().map(|_| c.id()))
            .unwrap();
        fs::write(&path, format!("{dead}\n")).unwrap();

        let lock = PidFile::new(&path);
        lock.acquire().unwrap();
        assert_eq!(lock.read_owner(), Some(Pid::from_raw(std::process::id() as i32)));
        lock.release();
    }

    #[test]
    fn test_garbage_lock_is_reclaimed() {
        let path = lock_path("garbage");
        fs::write(&path, "not a pid\n").unwrap();
        let lock = PidFile::new(&path);
        assert!(lock.read_owner().is_none());
        lock.acquire().unwrap();
        lock.release();
    }
}
