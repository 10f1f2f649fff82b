//! # mmap-view: shared, reference-counted file mappings
//!
//! This crate maps an already-open file into memory and hands out cheap,
//! cloneable views of the mapped bytes. The mapping stays alive as long as the
//! owning [`Mapping`] or any [`View`] of it does; the last one to go releases it.
//!
//! The same interface covers two platform models:
//!
//! - **POSIX**: one shared `mmap`, released with `munmap` from any thread.
//! - **Windows**: a file-mapping object plus a mapped view. Closing the
//!   mapping object is serialized against new mappings of the same file
//!   through a caller-supplied [`UnmapLock`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::fs::OpenOptions;
//! use mmap_view::{Mapping, MmapMode, UnmapLock};
//!
//! // One lock per underlying file, owned by whoever tracks open files.
//! let lock = UnmapLock::new();
//!
//! let file = OpenOptions::new().read(true).write(true).open("data.bin")?;
//! let len = file.metadata()?.len();
//! let mapping = Mapping::new(file, MmapMode::ReadWrite, len, &lock)?;
//!
//! let view = mapping.view();
//! view.write_at(0, &[0xFF])?;
//! view.page_out(0..1)?;
//! mapping.flush()?;
//! # Ok::<(), mmap_view::MmapViewError>(())
//! ```
//!
//! ## Modules
//!
//! - [`errors`]: Error types for mapping operations
//! - [`utils`]: Page size and range helpers
//! - [`mmap`]: The owning [`Mapping`] and its builder
//! - [`view`]: Shared [`View`]s of a mapping
//! - [`lock`]: The per-file [`UnmapLock`]
//!
//! ## Feature Flags
//!
//! - `advise` (default): issue `dont_need`/`page_out` hints to the kernel;
//!   without it hints are bounds-checked no-ops
//! - `async`: `Mapping::flush_async` on Tokio's blocking pool

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(missing_docs)]

pub mod errors;
pub mod lock;
pub mod mmap;
pub mod utils;
pub mod view;

mod advise;
mod sys;

pub use errors::{MmapViewError, Result};
pub use lock::UnmapLock;
pub use mmap::{Mapping, MappingBuilder, MmapMode};
pub use view::View;
