//! Shared, reference-counted access to a mapped region.

use std::fmt;
use std::ops::Range;
use std::ptr;
use std::slice;
use std::sync::Arc;

use crate::advise::Hint;
use crate::errors::{MmapViewError, Result};
use crate::mmap::{Inner, MmapMode};
use crate::utils::slice_range;

/// A handle to the bytes of a [`Mapping`](crate::Mapping).
///
/// Views are minted only by [`Mapping::view`](crate::Mapping::view). Each one
/// holds a strong reference, so the region stays mapped while any view exists,
/// even after the `Mapping` itself is gone. Cloning is cheap and every clone
/// sees the same memory.
///
/// Views can be used from many threads at once. Read-only mappings hand out
/// plain slices through [`View::range`]. Read-write mappings are accessed
/// through [`View::read_at`] and [`View::write_at`], which copy under a
/// per-mapping reader/writer lock, or through the unchecked
/// [`View::range_mut`].
///
/// # Examples
///
/// ```no_run
/// use std::fs::OpenOptions;
/// use mmap_view::{Mapping, MmapMode, UnmapLock};
///
/// let file = OpenOptions::new().read(true).write(true).open("data.bin")?;
/// let len = file.metadata()?.len();
/// let mapping = Mapping::new(file, MmapMode::ReadWrite, len, &UnmapLock::new())?;
///
/// let writer = mapping.view();
/// let reader = writer.clone();
/// drop(mapping);
///
/// writer.write_at(0, b"abc")?;
/// let mut buf = [0u8; 3];
/// reader.read_at(0, &mut buf)?;
/// assert_eq!(&buf, b"abc");
/// # Ok::<(), mmap_view::MmapViewError>(())
/// ```
#[derive(Clone)]
pub struct View {
    mapping: Arc<Inner>,
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("mode", &self.mapping.mode)
            .field("len", &self.mapping.size)
            .finish()
    }
}

impl View {
    pub(crate) fn new(mapping: Arc<Inner>) -> Self {
        Self { mapping }
    }

    /// The whole mapped region of a read-only mapping.
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::InvalidMode` for read-write mappings, whose
    /// bytes any clone of this view may change. Use [`View::read_at`] there.
    pub fn range(&self) -> Result<&[u8]> {
        if self.mapping.mode.is_writable() {
            return Err(MmapViewError::InvalidMode("use read_at for read-write mappings"));
        }
        let (base, len) = self.mapping.memory();
        // SAFETY: `memory` returns a live region of `len` bytes (or a dangling
        // pointer with len 0) that stays mapped while `self` holds its Arc.
        // Nothing in this crate writes to a read-only mapping.
        Ok(unsafe { slice::from_raw_parts(base.as_ptr(), len) })
    }

    /// The whole mapped region, writable.
    ///
    /// # Safety
    ///
    /// Every clone of this view, and every other view of the same mapping,
    /// aliases these bytes, and [`View::read_at`]/[`View::write_at`] do not
    /// coordinate with the returned slice. The caller must ensure no other
    /// access to an overlapping range happens while the slice is alive.
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::InvalidMode` for read-only mappings.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn range_mut(&self) -> Result<&mut [u8]> {
        self.ensure_writable()?;
        let (base, len) = self.mapping.memory();
        // SAFETY: the region is live while `self` holds its Arc; exclusivity is
        // the caller's obligation.
        Ok(unsafe { slice::from_raw_parts_mut(base.as_ptr(), len) })
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    ///
    /// Never observes a partially applied [`View::write_at`].
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::OutOfBounds` if the range exceeds the mapping.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let (start, _) = slice_range(offset, buf.len() as u64, self.mapping.size)?;
        let _guard = self.mapping.access.read();
        let (base, _) = self.mapping.memory();
        // SAFETY: `start + buf.len()` is within the live region; `buf` is a
        // distinct allocation owned by the caller. Safe writers are excluded by
        // the guard.
        unsafe {
            ptr::copy_nonoverlapping(base.as_ptr().add(start), buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    /// Copy `data` into the mapping starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::InvalidMode` for read-only mappings.
    /// Returns `MmapViewError::OutOfBounds` if the range exceeds the mapping.
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.ensure_writable()?;
        let (start, _) = slice_range(offset, data.len() as u64, self.mapping.size)?;
        let _guard = self.mapping.access.write();
        let (base, _) = self.mapping.memory();
        // SAFETY: `start + data.len()` is within the live, writable region and
        // the guard excludes every other safe reader and writer.
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), base.as_ptr().add(start), data.len());
        }
        Ok(())
    }

    /// Start address of the mapped region; dangling when the mapping is empty.
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.mapping.memory().0.as_ptr().cast_const()
    }

    /// Length of the mapped region in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.mapping.size
    }

    /// Whether the mapped region is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mapping.size == 0
    }

    /// Mode of the underlying mapping.
    #[must_use]
    pub fn mode(&self) -> MmapMode {
        self.mapping.mode
    }

    /// See [`Mapping::dont_need`](crate::Mapping::dont_need).
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::OutOfBounds` if `range` is not within the mapping.
    pub fn dont_need(&self, range: Range<usize>) -> Result<()> {
        self.mapping.hint(range, Hint::DontNeed)
    }

    /// See [`Mapping::page_out`](crate::Mapping::page_out).
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::OutOfBounds` if `range` is not within the mapping.
    pub fn page_out(&self, range: Range<usize>) -> Result<()> {
        self.mapping.hint(range, Hint::PageOut)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.mapping.mode.is_writable() {
            Ok(())
        } else {
            Err(MmapViewError::InvalidMode("write access on a read-only mapping"))
        }
    }
}
