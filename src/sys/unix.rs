//! POSIX backend: a single shared `mmap` over the file.

use std::fs::File;
#[cfg(feature = "advise")]
use std::io;
use std::ptr;

use log::debug;
use memmap2::{Mmap, MmapMut, MmapOptions};

use crate::errors::{MmapViewError, Result};
use crate::lock::UnmapLock;
use crate::mmap::MmapMode;

enum MapVariant {
    Ro(Mmap),
    Rw(MmapMut),
}

pub(crate) struct RawMapping {
    map: Option<MapVariant>,
    base: *mut u8,
    len: usize,
    // Held for the lifetime of the mapping, like the handle-based backend.
    _file: File,
}

// SAFETY: `base` points into the memmap2 region owned by `map`, which is
// itself Send + Sync. Concurrent byte access is governed by `View`'s contract.
unsafe impl Send for RawMapping {}
// SAFETY: see above.
unsafe impl Sync for RawMapping {}

impl RawMapping {
    /// Map `[0, len)` of `file`. Unmapping needs no cross-thread coordination
    /// here, so `_unmap_lock` is not retained.
    pub(crate) fn new(
        file: File,
        mode: MmapMode,
        len: usize,
        random_access: bool,
        _unmap_lock: &UnmapLock,
    ) -> Result<Self> {
        let mut opts = MmapOptions::new();
        opts.len(len);
        // SAFETY: the caller guarantees `file` is open with permissions that
        // match `mode`; memmap2 validates the remaining mmap arguments.
        let mut map = match mode {
            MmapMode::ReadOnly => {
                MapVariant::Ro(unsafe { opts.map(&file) }.map_err(MmapViewError::Mapping)?)
            }
            MmapMode::ReadWrite => {
                MapVariant::Rw(unsafe { opts.map_mut(&file) }.map_err(MmapViewError::Mapping)?)
            }
        };
        let base = match &mut map {
            MapVariant::Ro(m) => m.as_ptr().cast_mut(),
            MapVariant::Rw(m) => m.as_mut_ptr(),
        };

        #[cfg(feature = "advise")]
        initial_advice(base, len, random_access);
        #[cfg(not(feature = "advise"))]
        let _ = random_access;

        Ok(Self {
            map: Some(map),
            base,
            len,
            _file: file,
        })
    }

    pub(crate) fn base(&self) -> *mut u8 {
        self.base
    }

    pub(crate) fn flush(&self) -> Result<()> {
        match &self.map {
            Some(MapVariant::Rw(m)) => m.flush().map_err(MmapViewError::FlushFailed),
            Some(MapVariant::Ro(_)) | None => Ok(()),
        }
    }

    /// Mark the range as cold so its clean pages are reclaimed first.
    #[cfg(feature = "advise")]
    pub(crate) fn dont_need(&self, offset: usize, len: usize) -> io::Result<()> {
        // Linux 5.4+; older kernels reject it with EINVAL, which is ignored.
        #[cfg(any(target_os = "linux", target_os = "android"))]
        let advice = libc::MADV_COLD;
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        let advice = libc::MADV_DONTNEED;
        self.madvise(offset, len, advice)
    }

    /// Ask for dirty pages of the range to be written back now rather than
    /// whenever the kernel gets around to it.
    #[cfg(all(feature = "advise", any(target_os = "linux", target_os = "android")))]
    pub(crate) fn page_out(&self, offset: usize, len: usize) -> io::Result<()> {
        self.madvise(offset, len, libc::MADV_PAGEOUT)
    }

    #[cfg(all(feature = "advise", not(any(target_os = "linux", target_os = "android"))))]
    pub(crate) fn page_out(&self, offset: usize, len: usize) -> io::Result<()> {
        // SAFETY: the caller validated `offset + len <= self.len`.
        let rc = unsafe { libc::msync(self.base.add(offset).cast(), len, libc::MS_ASYNC) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(feature = "advise")]
    fn madvise(&self, offset: usize, len: usize, advice: libc::c_int) -> io::Result<()> {
        // SAFETY: the caller validated `offset + len <= self.len` and `offset`
        // is page aligned.
        let rc = unsafe { libc::madvise(self.base.add(offset).cast(), len, advice) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(crate) fn unmap(&mut self) -> Result<()> {
        if self.map.take().is_some() {
            debug!("munmap {} bytes at {:p}", self.len, self.base);
        }
        self.base = ptr::null_mut();
        Ok(())
    }
}

/// Hints applied once to a fresh mapping. Each advice value is its own
/// `madvise` call since they do not combine as bit flags.
#[cfg(feature = "advise")]
fn initial_advice(base: *mut u8, len: usize, random_access: bool) {
    if !random_access {
        advise_or_log(base, len, libc::MADV_SEQUENTIAL, "MADV_SEQUENTIAL");
    }
    #[cfg(any(target_os = "linux", target_os = "android"))]
    advise_or_log(base, len, libc::MADV_DONTDUMP, "MADV_DONTDUMP");
}

#[cfg(feature = "advise")]
fn advise_or_log(base: *mut u8, len: usize, flag: libc::c_int, name: &str) {
    // SAFETY: `base..base + len` is the region that was just mapped.
    let rc = unsafe { libc::madvise(base.cast(), len, flag) };
    if rc != 0 {
        debug!("madvise({name}) ignored: {}", io::Error::last_os_error());
    }
}
