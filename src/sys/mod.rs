//! Platform mapping resources.
//!
//! Each backend exposes a `RawMapping` with the same crate-private surface:
//! `new`, `base`, `flush` and `unmap`. Zero-length mappings never reach this
//! layer.

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        mod windows;
        pub(crate) use self::windows::RawMapping;
    } else if #[cfg(unix)] {
        mod unix;
        pub(crate) use self::unix::RawMapping;
    } else {
        compile_error!("mmap-view supports unix and windows targets only");
    }
}
