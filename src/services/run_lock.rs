//! Per-repository run lock.
//!
//! A lock file created with `create_new` keeps two passes from working on
//! the same repository at once. The file is removed when the guard drops.
//! A process killed before that leaves the file behind; its recorded PID no
//! longer names a live process, so the next pass takes the lock over.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunLockError {
    #[error("another pass is already running for {repository} (lock file {})", .path.display())]
    Held { repository: String, path: PathBuf },

    #[error("failed to create run lock {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How long a lock file may go without a readable PID before it counts as
/// abandoned. Covers the gap between creating the file and writing to it.
const UNWRITTEN_LOCK_GRACE: Duration = Duration::from_secs(30);

/// Held for the duration of a pass.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock for `repository` in `dir`, failing fast if it is held.
    pub fn acquire(dir: &Path, repository: &str) -> Result<Self, RunLockError> {
        let path = dir.join(lock_file_name(repository));
        let io_err = |source| RunLockError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_err)?;
        let mut file = match create_lock_file(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && is_abandoned(&path) => {
                tracing::warn!(path = %path.display(), "taking over abandoned run lock");
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(io_err(e)),
                }
                create_lock_file(&path).map_err(|e| held_or_io(e, repository, &path))?
            }
            Err(e) => return Err(held_or_io(e, repository, &path)),
        };
        writeln!(file, "{}", std::process::id()).map_err(io_err)?;

        tracing::debug!(path = %path.display(), "run lock acquired");
        Ok(Self { path })
    }

    /// Default lock directory
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("stale-reaper")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove run lock");
        }
    }
}

fn create_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

fn held_or_io(err: io::Error, repository: &str, path: &Path) -> RunLockError {
    if err.kind() == io::ErrorKind::AlreadyExists {
        RunLockError::Held {
            repository: repository.to_string(),
            path: path.to_path_buf(),
        }
    } else {
        RunLockError::Io {
            path: path.to_path_buf(),
            source: err,
        }
    }
}

/// Whether the lock at `path` was left behind by a process that is gone.
fn is_abandoned(path: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    match contents.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => !process_alive(pid),
        _ => fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > UNWRITTEN_LOCK_GRACE),
    }
}

#[cfg(unix)]
fn process_alive(pid: i32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Signal 0 only checks existence; EPERM means it exists under another user.
    !matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
fn process_alive(_pid: i32) -> bool {
    true
}

/// `owner/repo` becomes `owner__repo.lock`.
fn lock_file_name(repository: &str) -> String {
    let safe: String = repository
        .chars()
        .map(|c| match c {
            '/' => "__".to_string(),
            c if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' => c.to_string(),
            _ => "-".to_string(),
        })
        .collect();
    format!("{safe}.lock")
}
