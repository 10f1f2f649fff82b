//! Page-size queries and range arithmetic shared by the mapping and hint code.

use std::ops::Range;

use crate::errors::{MmapViewError, Result};

/// Get the system page size in bytes.
#[must_use]
pub fn page_size() -> usize {
    cfg_if::cfg_if! {
        if #[cfg(windows)] {
            windows_page_size()
        } else {
            unix_page_size()
        }
    }
}

#[cfg(windows)]
fn windows_page_size() -> usize {
    use std::mem::MaybeUninit;
    #[allow(non_snake_case)]
    #[repr(C)]
    struct SYSTEM_INFO {
        wProcessorArchitecture: u16,
        wReserved: u16,
        dwPageSize: u32,
        lpMinimumApplicationAddress: *mut core::ffi::c_void,
        lpMaximumApplicationAddress: *mut core::ffi::c_void,
        dwActiveProcessorMask: usize,
        dwNumberOfProcessors: u32,
        dwProcessorType: u32,
        dwAllocationGranularity: u32,
        wProcessorLevel: u16,
        wProcessorRevision: u16,
    }
    extern "system" {
        fn GetSystemInfo(lpSystemInfo: *mut SYSTEM_INFO);
    }
    let mut sysinfo = MaybeUninit::<SYSTEM_INFO>::uninit();
    // SAFETY: GetSystemInfo fully initializes the struct it is handed.
    unsafe {
        GetSystemInfo(sysinfo.as_mut_ptr());
        sysinfo.assume_init().dwPageSize as usize
    }
}

#[cfg(not(windows))]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unix_page_size() -> usize {
    // SAFETY: sysconf with _SC_PAGESIZE is safe to call.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    page_size.max(1) as usize
}

/// Round `value` down to a multiple of `alignment`.
#[must_use]
pub fn align_down(value: usize, alignment: usize) -> usize {
    if alignment == 0 {
        return value;
    }
    if alignment.is_power_of_two() {
        value & !(alignment - 1)
    } else {
        value - value % alignment
    }
}

/// Ensure the requested [offset, offset+len) range is within [0, total).
///
/// # Errors
///
/// Returns `MmapViewError::OutOfBounds` if the range exceeds bounds.
pub fn ensure_in_bounds(offset: u64, len: u64, total: u64) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= total => Ok(()),
        _ => Err(MmapViewError::OutOfBounds { offset, len, total }),
    }
}

/// Compute a byte slice range for a given total length, returning start..end as a usize tuple.
///
/// # Errors
///
/// Returns `MmapViewError::OutOfBounds` if the requested range exceeds the total length.
#[allow(clippy::cast_possible_truncation)]
pub fn slice_range(offset: u64, len: u64, total: u64) -> Result<(usize, usize)> {
    ensure_in_bounds(offset, len, total)?;
    // total describes memory that is already mapped, so it fits in usize.
    Ok((offset as usize, (offset + len) as usize))
}

/// Validate a hint range against a mapping of `total` bytes and widen its
/// start to the enclosing page boundary.
///
/// Returns `(start, len)` of the page-aligned span, or `None` for an empty range.
///
/// # Errors
///
/// Returns `MmapViewError::OutOfBounds` if `range` is reversed or exceeds `total`.
pub fn page_span(range: &Range<usize>, total: usize) -> Result<Option<(usize, usize)>> {
    if range.start > range.end || range.end > total {
        return Err(MmapViewError::OutOfBounds {
            offset: range.start as u64,
            len: range.end.saturating_sub(range.start) as u64,
            total: total as u64,
        });
    }
    if range.is_empty() {
        return Ok(None);
    }
    let start = align_down(range.start, page_size());
    Ok(Some((start, range.end - start)))
}
