//! The owning side of a file mapping.

use std::fmt;
use std::fs::File;
use std::ptr::NonNull;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::errors::{MmapViewError, Result};
use crate::lock::UnmapLock;
use crate::sys::RawMapping;
use crate::view::View;

/// Access mode for a file mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmapMode {
    /// Read-only mapping.
    ReadOnly,
    /// Read-write shared mapping; writes reach the underlying file.
    ReadWrite,
}

impl MmapMode {
    /// Whether writes through the mapping are allowed.
    #[must_use]
    pub fn is_writable(self) -> bool {
        self == MmapMode::ReadWrite
    }
}

/// State shared between a [`Mapping`] and all of its [`View`]s.
///
/// Dropping the last reference releases the OS mapping.
pub(crate) struct Inner {
    pub(crate) size: u64,
    pub(crate) mode: MmapMode,
    // Serializes the safe copies in `View::read_at`/`write_at`.
    pub(crate) access: RwLock<()>,
    // `None` for zero-length files, which are never handed to the OS.
    raw: Option<RawMapping>,
}

impl Inner {
    /// The mapped region as `(base, len)`, covering exactly `[0, size)`.
    ///
    /// # Panics
    ///
    /// Panics if the region has been released while still reachable, which
    /// would be a bug in this crate.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn memory(&self) -> (NonNull<u8>, usize) {
        let len = self.size as usize;
        match &self.raw {
            Some(raw) => {
                let base = NonNull::new(raw.base());
                assert!(base.is_some() || len == 0, "mapping accessed after release");
                (base.unwrap_or(NonNull::dangling()), len)
            }
            None => {
                assert!(len == 0, "mapping accessed after release");
                (NonNull::dangling(), 0)
            }
        }
    }

    pub(crate) fn raw(&self) -> Option<&RawMapping> {
        self.raw.as_ref()
    }

    fn flush(&self) -> Result<()> {
        match &self.raw {
            Some(raw) if self.mode.is_writable() => raw.flush(),
            _ => Ok(()),
        }
    }

    fn release(&mut self) -> Result<()> {
        match self.raw.take() {
            Some(mut raw) => {
                debug!("releasing {:?} mapping of {} bytes", self.mode, self.size);
                raw.unmap()
            }
            None => Ok(()),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("unmapping {} bytes failed: {e}", self.size);
        }
    }
}

/// A file mapped into memory, and the sole owner of that mapping.
///
/// `Mapping` is move-only. Hand out shared access with [`Mapping::view`]; each
/// [`View`] keeps the mapped region alive, so the region is released only once
/// the `Mapping` and every view of it have been dropped.
///
/// # Examples
///
/// ```no_run
/// use std::fs::OpenOptions;
/// use mmap_view::{Mapping, MmapMode, UnmapLock};
///
/// let lock = UnmapLock::new();
/// let file = OpenOptions::new().read(true).write(true).open("piece.dat")?;
/// let mapping = Mapping::builder(file, &lock)
///     .mode(MmapMode::ReadWrite)
///     .random_access(true)
///     .map()?;
///
/// let view = mapping.view();
/// view.write_at(0, b"hello")?;
/// view.page_out(0..5)?;
/// mapping.flush()?;
/// # Ok::<(), mmap_view::MmapViewError>(())
/// ```
pub struct Mapping {
    inner: Arc<Inner>,
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("mode", &self.inner.mode)
            .field("len", &self.inner.size)
            .field("views", &self.view_count())
            .finish()
    }
}

impl Mapping {
    /// Map the first `size` bytes of `file`.
    ///
    /// `file` must be open with permissions matching `mode`. A `size` of zero
    /// yields an empty mapping without any OS call. `unmap_lock` must be the
    /// lock shared by every mapping of the same underlying file.
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::TooLarge` if `size` does not fit the address space.
    /// Returns `MmapViewError::Mapping` if the OS rejects the mapping.
    pub fn new(file: File, mode: MmapMode, size: u64, unmap_lock: &UnmapLock) -> Result<Self> {
        Self::map_with(file, mode, size, false, unmap_lock)
    }

    /// Start building a mapping of `file` with non-default options.
    pub fn builder(file: File, unmap_lock: &UnmapLock) -> MappingBuilder {
        MappingBuilder {
            file,
            unmap_lock: unmap_lock.clone(),
            mode: MmapMode::ReadOnly,
            size: None,
            random_access: false,
        }
    }

    fn map_with(
        file: File,
        mode: MmapMode,
        size: u64,
        random_access: bool,
        unmap_lock: &UnmapLock,
    ) -> Result<Self> {
        let len = usize::try_from(size).map_err(|_| MmapViewError::TooLarge { size })?;
        let raw = if len == 0 {
            None
        } else {
            Some(RawMapping::new(file, mode, len, random_access, unmap_lock)?)
        };
        debug!("mapped {size} bytes {mode:?}");
        Ok(Self {
            inner: Arc::new(Inner {
                size,
                mode,
                access: RwLock::new(()),
                raw,
            }),
        })
    }

    /// A new shared view of this mapping.
    #[must_use]
    pub fn view(&self) -> View {
        View::new(Arc::clone(&self.inner))
    }

    /// Size of the mapping in bytes, fixed at construction.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.inner.size
    }

    /// Whether the mapping is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.size == 0
    }

    /// Return the mapping mode.
    #[must_use]
    pub fn mode(&self) -> MmapMode {
        self.inner.mode
    }

    /// Number of views currently alive.
    #[must_use]
    pub fn view_count(&self) -> usize {
        Arc::strong_count(&self.inner) - 1
    }

    /// Write outstanding changes in the mapped region to the file, synchronously.
    /// Read-only and empty mappings have nothing to flush.
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::FlushFailed` if the OS call fails.
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    /// Give up ownership of the mapping.
    ///
    /// When no view is alive the region is released now and any OS failure is
    /// returned. Otherwise release happens when the last view is dropped.
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::Mapping` if unmapping fails.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => inner.release(),
            Err(shared) => {
                debug!(
                    "deferring release of {} bytes to {} live view(s)",
                    shared.size,
                    Arc::strong_count(&shared) - 1
                );
                Ok(())
            }
        }
    }

    pub(crate) fn inner(&self) -> &Inner {
        &self.inner
    }
}

#[cfg(feature = "async")]
impl Mapping {
    /// Flush on Tokio's blocking pool so async callers are not stalled by `msync`.
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::FlushFailed` if the OS call fails or the
    /// blocking task could not complete.
    pub async fn flush_async(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.flush())
            .await
            .map_err(|e| MmapViewError::FlushFailed(std::io::Error::other(e)))?
    }
}

/// Options for creating a [`Mapping`].
///
/// Created by [`Mapping::builder`]. Defaults to a read-only mapping of the
/// whole file with sequential access.
#[derive(Debug)]
pub struct MappingBuilder {
    file: File,
    unmap_lock: UnmapLock,
    mode: MmapMode,
    size: Option<u64>,
    random_access: bool,
}

impl MappingBuilder {
    /// Set the access mode.
    #[must_use]
    pub fn mode(mut self, mode: MmapMode) -> Self {
        self.mode = mode;
        self
    }

    /// Map exactly `size` bytes instead of the file's current length.
    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Tell the kernel not to expect sequential reads.
    #[must_use]
    pub fn random_access(mut self, random_access: bool) -> Self {
        self.random_access = random_access;
        self
    }

    /// Create the mapping.
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::Io` if the file length cannot be read.
    /// Returns `MmapViewError::TooLarge` or `MmapViewError::Mapping` as for [`Mapping::new`].
    pub fn map(self) -> Result<Mapping> {
        let size = match self.size {
            Some(size) => size,
            None => self.file.metadata()?.len(),
        };
        Mapping::map_with(
            self.file,
            self.mode,
            size,
            self.random_access,
            &self.unmap_lock,
        )
    }
}
