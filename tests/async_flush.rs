#![cfg(feature = "async")]
//! Async flushing tests: flush_async persists writes like flush().

use mmap_view::{Mapping, MmapMode, UnmapLock};
use std::fs;

#[tokio::test(flavor = "multi_thread")]
async fn async_flush_persists_writes() -> anyhow::Result<()> {
    let named = tempfile::NamedTempFile::new()?;
    let file = named.reopen()?;
    file.set_len(4096)?;

    let mapping = Mapping::new(file, MmapMode::ReadWrite, 4096, &UnmapLock::new())?;
    mapping.view().write_at(128, b"ASYNC-FLUSH")?;
    mapping.flush_async().await?;
    mapping.close()?;

    let bytes = fs::read(named.path())?;
    assert_eq!(&bytes[128..139], b"ASYNC-FLUSH");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn async_flush_on_read_only_is_noop() -> anyhow::Result<()> {
    let named = tempfile::NamedTempFile::new()?;
    fs::write(named.path(), b"XYZ")?;

    let file = fs::File::open(named.path())?;
    let mapping = Mapping::builder(file, &UnmapLock::new()).map()?;
    mapping.flush_async().await?;
    assert_eq!(mapping.view().range()?, b"XYZ");
    Ok(())
}
