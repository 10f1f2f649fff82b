//! Access-pattern hints for mapped ranges.
//!
//! Hints never change what a view reads back; they only influence when the
//! kernel reclaims or writes back pages. Which ranges to hint, and how often,
//! is up to the caller.

use std::ops::Range;

use log::debug;

use crate::errors::Result;
use crate::mmap::{Inner, Mapping};
use crate::utils::page_span;

/// Kinds of hint forwarded to the platform backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hint {
    DontNeed,
    PageOut,
}

impl Inner {
    /// Validate `range`, align it to pages, and pass `hint` to the backend.
    /// Backend failures are logged and otherwise ignored.
    pub(crate) fn hint(&self, range: Range<usize>, hint: Hint) -> Result<()> {
        let (_, total) = self.memory();
        let Some((start, len)) = page_span(&range, total)? else {
            return Ok(());
        };
        let Some(raw) = self.raw() else {
            return Ok(());
        };

        #[cfg(feature = "advise")]
        {
            let outcome = match hint {
                Hint::DontNeed => raw.dont_need(start, len),
                Hint::PageOut => raw.page_out(start, len),
            };
            if let Err(e) = outcome {
                debug!("{hint:?} hint for {len} bytes at offset {start} ignored: {e}");
            }
        }
        #[cfg(not(feature = "advise"))]
        {
            let _ = raw;
            debug!("{hint:?} hint for {len} bytes at offset {start} skipped (advise disabled)");
        }

        Ok(())
    }
}

impl Mapping {
    /// Hint that `range` is unlikely to be accessed soon, so the OS may
    /// reclaim its clean pages early.
    ///
    /// # Platform-specific behavior
    ///
    /// - **Linux**: `madvise(MADV_COLD)`
    /// - **Other Unix**: `madvise(MADV_DONTNEED)`
    /// - **Windows**: no-op
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::OutOfBounds` if `range` is not within `[0, len)`.
    /// OS failures are not reported.
    pub fn dont_need(&self, range: Range<usize>) -> Result<()> {
        self.inner().hint(range, Hint::DontNeed)
    }

    /// Hint that dirty pages in `range` should be written back now, bounding
    /// how much unflushed data the OS accumulates.
    ///
    /// Unlike [`Mapping::flush`] this does not wait for the write.
    ///
    /// # Platform-specific behavior
    ///
    /// - **Linux**: `madvise(MADV_PAGEOUT)`
    /// - **Other Unix**: `msync(MS_ASYNC)`
    /// - **Windows**: `FlushViewOfFile`
    ///
    /// # Errors
    ///
    /// Returns `MmapViewError::OutOfBounds` if `range` is not within `[0, len)`.
    /// OS failures are not reported.
    pub fn page_out(&self, range: Range<usize>) -> Result<()> {
        self.inner().hint(range, Hint::PageOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MmapMode, MmapViewError, UnmapLock};
    use std::fs::{self, OpenOptions};
    use std::path::PathBuf;

    fn tmp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("mmap_view_advise_test_{}_{}", name, std::process::id()));
        p
    }

    fn create_rw(path: &PathBuf, size: u64) -> Mapping {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)
            .expect("open");
        file.set_len(size).expect("set_len");
        Mapping::new(file, MmapMode::ReadWrite, size, &UnmapLock::new()).expect("map")
    }

    #[test]
    fn hints_accept_any_subrange() {
        let path = tmp_path("subranges");
        let _ = fs::remove_file(&path);

        let mapping = create_rw(&path, 3 * 4096);
        mapping.dont_need(0..4096).expect("dont_need first page");
        mapping.dont_need(5000..9000).expect("dont_need unaligned");
        mapping.page_out(1..2).expect("page_out one byte");
        mapping.page_out(0..3 * 4096).expect("page_out whole");

        // empty ranges are no-ops, including at the very end
        mapping.dont_need(0..0).expect("empty");
        mapping.page_out(3 * 4096..3 * 4096).expect("empty at end");

        drop(mapping);
        fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    fn hints_reject_out_of_bounds() {
        let path = tmp_path("out_of_bounds");
        let _ = fs::remove_file(&path);

        let mapping = create_rw(&path, 4096);
        assert!(matches!(
            mapping.dont_need(0..4097),
            Err(MmapViewError::OutOfBounds { total: 4096, .. })
        ));
        assert!(mapping.page_out(4096..4097).is_err());

        drop(mapping);
        fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    fn hints_on_empty_mapping() {
        let path = tmp_path("empty");
        let _ = fs::remove_file(&path);

        let mapping = create_rw(&path, 0);
        mapping.dont_need(0..0).expect("empty dont_need");
        mapping.page_out(0..0).expect("empty page_out");
        assert!(mapping.page_out(0..1).is_err());

        drop(mapping);
        fs::remove_file(&path).expect("cleanup");
    }

    #[cfg(not(feature = "advise"))]
    #[test]
    fn disabled_hints_are_bounds_checked_no_ops() {
        let path = tmp_path("disabled");
        let _ = fs::remove_file(&path);

        let mapping = create_rw(&path, 2 * 4096);
        let view = mapping.view();
        view.write_at(4100, b"kept").expect("write");
        mapping.dont_need(0..2 * 4096).expect("dont_need");
        mapping.page_out(4097..4200).expect("page_out");
        assert!(matches!(
            mapping.dont_need(0..2 * 4096 + 1),
            Err(MmapViewError::OutOfBounds { .. })
        ));
        assert!(view.page_out(8193..9000).is_err());

        let mut buf = [0u8; 4];
        view.read_at(4100, &mut buf).expect("read");
        assert_eq!(&buf, b"kept");

        drop(view);
        drop(mapping);
        fs::remove_file(&path).expect("cleanup");
    }
}
