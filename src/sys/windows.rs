//! Windows backend: a file-mapping object plus one view of it.
//!
//! The mapping object is a resource of its own, distinct from both the file
//! handle and the mapped view. Closing it while another thread creates a new
//! mapping object for the same file can make the new request fail, so both
//! sides take the file's [`UnmapLock`].

use std::ffi::c_void;
use std::fs::File;
use std::io;
use std::os::windows::io::AsRawHandle;
use std::ptr;

use log::{debug, warn};

use crate::errors::{MmapViewError, Result};
use crate::lock::UnmapLock;
use crate::mmap::MmapMode;

type HANDLE = *mut c_void;

const PAGE_READONLY: u32 = 0x02;
const PAGE_READWRITE: u32 = 0x04;
const FILE_MAP_WRITE: u32 = 0x0002;
const FILE_MAP_READ: u32 = 0x0004;

#[allow(non_snake_case)]
extern "system" {
    fn CreateFileMappingW(
        hFile: HANDLE,
        lpFileMappingAttributes: *mut c_void,
        flProtect: u32,
        dwMaximumSizeHigh: u32,
        dwMaximumSizeLow: u32,
        lpName: *const u16,
    ) -> HANDLE;
    fn MapViewOfFile(
        hFileMappingObject: HANDLE,
        dwDesiredAccess: u32,
        dwFileOffsetHigh: u32,
        dwFileOffsetLow: u32,
        dwNumberOfBytesToMap: usize,
    ) -> *mut c_void;
    fn UnmapViewOfFile(lpBaseAddress: *const c_void) -> i32;
    fn FlushViewOfFile(lpBaseAddress: *const c_void, dwNumberOfBytesToFlush: usize) -> i32;
    fn FlushFileBuffers(hFile: HANDLE) -> i32;
    fn CloseHandle(hObject: HANDLE) -> i32;
}

/// Owns the file and the file-mapping object created over it.
pub(crate) struct MappingHandle {
    file: File,
    handle: HANDLE,
}

impl MappingHandle {
    /// Create a mapping object covering `size` bytes of `file`.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn new(file: File, mode: MmapMode, size: u64) -> Result<Self> {
        let protect = match mode {
            MmapMode::ReadOnly => PAGE_READONLY,
            MmapMode::ReadWrite => PAGE_READWRITE,
        };
        // SAFETY: the raw handle is owned by `file`, which outlives this call.
        let handle = unsafe {
            CreateFileMappingW(
                file.as_raw_handle().cast(),
                ptr::null_mut(),
                protect,
                (size >> 32) as u32,
                size as u32,
                ptr::null(),
            )
        };
        if handle.is_null() {
            return Err(MmapViewError::Mapping(io::Error::last_os_error()));
        }
        Ok(Self { file, handle })
    }

    pub(crate) fn handle(&self) -> HANDLE {
        self.handle
    }

    pub(crate) fn file(&self) -> &File {
        &self.file
    }

    /// Close the mapping object. Callers hold the file's unmap lock.
    fn close(&mut self) -> io::Result<()> {
        if self.handle.is_null() {
            return Ok(());
        }
        // SAFETY: `handle` came from CreateFileMappingW and is closed once.
        let rc = unsafe { CloseHandle(self.handle) };
        self.handle = ptr::null_mut();
        if rc == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for MappingHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("closing file mapping object failed: {e}");
        }
    }
}

pub(crate) struct RawMapping {
    handle: Option<MappingHandle>,
    base: *mut u8,
    len: usize,
    mode: MmapMode,
    unmap_lock: UnmapLock,
}

// SAFETY: the view and the mapping object are process-wide resources that may
// be released from any thread; byte access is governed by `View`'s contract.
unsafe impl Send for RawMapping {}
// SAFETY: see above.
unsafe impl Sync for RawMapping {}

impl RawMapping {
    pub(crate) fn new(
        file: File,
        mode: MmapMode,
        len: usize,
        _random_access: bool,
        unmap_lock: &UnmapLock,
    ) -> Result<Self> {
        let access = match mode {
            MmapMode::ReadOnly => FILE_MAP_READ,
            MmapMode::ReadWrite => FILE_MAP_READ | FILE_MAP_WRITE,
        };

        let _guard = unmap_lock.lock();
        let handle = MappingHandle::new(file, mode, len as u64)?;
        // SAFETY: `handle` is a live mapping object sized to at least `len`.
        let base = unsafe { MapViewOfFile(handle.handle(), access, 0, 0, len) };
        if base.is_null() {
            // Capture before `handle` drops and CloseHandle overwrites it.
            let err = io::Error::last_os_error();
            drop(handle);
            return Err(MmapViewError::Mapping(err));
        }

        Ok(Self {
            handle: Some(handle),
            base: base.cast(),
            len,
            mode,
            unmap_lock: unmap_lock.clone(),
        })
    }

    pub(crate) fn base(&self) -> *mut u8 {
        self.base
    }

    pub(crate) fn flush(&self) -> Result<()> {
        if self.base.is_null() {
            return Ok(());
        }
        // SAFETY: `base..base + len` is the live view.
        if unsafe { FlushViewOfFile(self.base.cast_const().cast(), self.len) } == 0 {
            return Err(MmapViewError::FlushFailed(io::Error::last_os_error()));
        }
        if self.mode == MmapMode::ReadWrite {
            if let Some(handle) = &self.handle {
                // SAFETY: the file handle is owned by `handle` and still open.
                if unsafe { FlushFileBuffers(handle.file().as_raw_handle().cast()) } == 0 {
                    return Err(MmapViewError::FlushFailed(io::Error::last_os_error()));
                }
            }
        }
        Ok(())
    }

    /// No equivalent of a cold-page hint exists for file views.
    #[cfg(feature = "advise")]
    pub(crate) fn dont_need(&self, _offset: usize, _len: usize) -> io::Result<()> {
        Ok(())
    }

    /// Start writing dirty pages of the range back to the file.
    #[cfg(feature = "advise")]
    pub(crate) fn page_out(&self, offset: usize, len: usize) -> io::Result<()> {
        // SAFETY: the caller validated `offset + len <= self.len`.
        let addr = unsafe { self.base.add(offset) };
        if unsafe { FlushViewOfFile(addr.cast_const().cast(), len) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Unmap the view, then close the mapping object under the unmap lock.
    /// Safe to call more than once.
    pub(crate) fn unmap(&mut self) -> Result<()> {
        let mut result = Ok(());
        if !self.base.is_null() {
            debug!("UnmapViewOfFile {} bytes at {:p}", self.len, self.base);
            // SAFETY: `base` came from MapViewOfFile and is unmapped once.
            if unsafe { UnmapViewOfFile(self.base.cast_const().cast()) } == 0 {
                result = Err(MmapViewError::Mapping(io::Error::last_os_error()));
            }
            self.base = ptr::null_mut();
        }
        if let Some(mut handle) = self.handle.take() {
            let _guard = self.unmap_lock.lock();
            if let Err(e) = handle.close() {
                if result.is_ok() {
                    result = Err(MmapViewError::Mapping(e));
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_handle_closes_once() {
        let file = tempfile::tempfile().expect("tempfile");
        file.set_len(4096).expect("set_len");
        let mut handle = MappingHandle::new(file, MmapMode::ReadWrite, 4096).expect("create");
        assert!(!handle.handle().is_null());
        assert_eq!(handle.file().metadata().expect("metadata").len(), 4096);

        handle.close().expect("close");
        assert!(handle.handle().is_null());
        // a second close, and the one in Drop, find nothing to do
        handle.close().expect("second close");
    }
}
