//! Advisory lock on the data directory.
//!
//! The store keeps its tables in memory and rewrites whole files, so only one
//! process may write a data directory at a time. `serve` holds the lock for
//! its lifetime; `add` and `trash` hold it for one operation.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

const LOCK_FILE_NAME: &str = "shelf.lock";

/// Exclusive lock released on drop.
pub struct DataLock {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

impl DataLock {
    /// Fails with `WouldBlock` when another process holds the lock.
    pub fn try_acquire(base_path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(base_path.join(LOCK_FILE_NAME))?;

        try_lock_exclusive(&file)?;

        Ok(DataLock { file })
    }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
    let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if result == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        return Err(io::Error::new(
            io::ErrorKind::WouldBlock,
            "data directory is in use by another shelf process",
        ));
    }
    Err(err)
}

// no locking outside unix
#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
impl Drop for DataLock {
    fn drop(&mut self) {
        unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
    }
}
