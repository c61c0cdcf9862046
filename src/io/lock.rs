use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Lock file name inside the data directory.
pub const LOCK_FILE: &str = ".lock";

/// How long a command waits for another `nw` process to finish writing.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const FIRST_RETRY: Duration = Duration::from_millis(5);
const MAX_RETRY: Duration = Duration::from_millis(100);

/// Advisory lock serializing writes to a vault's data directory.
///
/// Held for the duration of a command that touches notes, settings or the
/// width database, so a `watch` loop and a one-shot command never interleave.
/// The holder writes its pid and subcommand into the file so a waiting
/// process can say who it is waiting on. The file is never unlinked.
pub struct FileLock {
    file: File,
}

/// Error type for lock operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not create lock file at {path}: {source}")]
    CreateError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("vault is busy: {holder} still holds {path}")]
    Timeout { path: PathBuf, holder: String },
}

impl FileLock {
    /// Acquire the lock, retrying with backoff for up to `timeout`.
    pub fn acquire(data_dir: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = data_dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LockError::CreateError {
                path: path.clone(),
                source: e,
            })?;

        let start = Instant::now();
        let mut retry = FIRST_RETRY;
        while try_lock(&file).is_err() {
            if start.elapsed() >= timeout {
                let holder = read_holder(&path);
                return Err(LockError::Timeout { path, holder });
            }
            std::thread::sleep(retry);
            retry = (retry * 2).min(MAX_RETRY);
        }

        let mut lock = FileLock { file };
        lock.record_holder();
        Ok(lock)
    }

    pub fn acquire_default(data_dir: &Path) -> Result<Self, LockError> {
        Self::acquire(data_dir, DEFAULT_LOCK_TIMEOUT)
    }

    /// Best effort; the lock holds even if the holder line can't be written.
    fn record_holder(&mut self) {
        let command = std::env::args().nth(1).unwrap_or_default();
        let line = format!("pid {} (nw {})", std::process::id(), command.trim());
        if self.file.set_len(0).is_ok() {
            let _ = self.file.write_all(line.as_bytes());
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // flock is released with the file handle
        let _ = self.file.set_len(0);
    }
}

fn read_holder(path: &Path) -> String {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "another nw process".to_string())
}

#[cfg(unix)]
fn try_lock(file: &File) -> Result<(), std::io::Error> {
    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn try_lock(_file: &File) -> Result<(), std::io::Error> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn holder_is_recorded_and_cleared() {
        let tmp = TempDir::new().unwrap();
        let lock = FileLock::acquire_default(tmp.path()).unwrap();
        let held = fs::read_to_string(tmp.path().join(LOCK_FILE)).unwrap();
        assert!(held.starts_with(&format!("pid {} ", std::process::id())));

        drop(lock);
        assert!(tmp.path().join(LOCK_FILE).exists());
        assert_eq!(fs::read_to_string(tmp.path().join(LOCK_FILE)).unwrap(), "");
        assert!(FileLock::acquire_default(tmp.path()).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn second_writer_times_out_naming_the_holder() {
        let tmp = TempDir::new().unwrap();
        let _held = FileLock::acquire_default(tmp.path()).unwrap();
        let second = FileLock::acquire(tmp.path(), Duration::from_millis(50));
        match second {
            Err(LockError::Timeout { holder, .. }) => assert!(holder.starts_with("pid ")),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("lock acquired twice"),
        }
    }

    #[test]
    fn missing_data_dir_is_a_create_error() {
        let tmp = TempDir::new().unwrap();
        let result = FileLock::acquire_default(&tmp.path().join("absent"));
        assert!(matches!(result, Err(LockError::CreateError { .. })));
    }

    #[test]
    fn empty_lock_file_names_a_generic_holder() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(LOCK_FILE), "").unwrap();
        assert_eq!(read_holder(&tmp.path().join(LOCK_FILE)), "another nw process");
    }
}
