//! Per-file lock serializing mapping-object teardown against new mappings.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Shared lock handed to every [`Mapping`](crate::Mapping) of one underlying file.
///
/// On handle-based platforms (Windows) closing a file-mapping object while
/// another thread creates a new one for the same file can fail transiently.
/// Every mapping of a file takes this lock while creating its mapping object
/// and again while closing it, so the two never overlap.
///
/// The lock belongs to whoever tracks open files: create one per file and
/// clone it into each mapping of that file. On POSIX it is accepted and ignored.
///
/// # Examples
///
/// ```no_run
/// use std::fs::OpenOptions;
/// use mmap_view::{Mapping, MmapMode, UnmapLock};
///
/// let lock = UnmapLock::new();
/// let file = OpenOptions::new().read(true).write(true).open("data.bin")?;
/// let len = file.metadata()?.len();
/// let mapping = Mapping::new(file, MmapMode::ReadWrite, len, &lock)?;
/// # Ok::<(), mmap_view::MmapViewError>(())
/// ```
#[derive(Clone, Default)]
pub struct UnmapLock {
    inner: Arc<Mutex<()>>,
}

impl UnmapLock {
    /// Create a fresh lock for one underlying file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both handles refer to the same lock.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[cfg_attr(not(windows), allow(dead_code))]
    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.inner.lock()
    }
}

impl fmt::Debug for UnmapLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnmapLock")
            .field("locked", &self.inner.is_locked())
            .finish()
    }
}
