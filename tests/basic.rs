//! Basic integration tests for mmap-view.

use mmap_view::{Mapping, MmapMode, MmapViewError, UnmapLock};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

fn tmp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("mmap_view_test_{}_{}", name, std::process::id()));
    p
}

fn create_file(path: &Path, size: u64) -> File {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(path)
        .expect("create file");
    file.set_len(size).expect("set_len");
    file
}

#[test]
fn write_page_out_flush_is_visible_on_disk() {
    let path = tmp_path("write_page_out_flush");
    let _ = fs::remove_file(&path);

    let file = create_file(&path, 4096);
    let mapping = Mapping::new(file, MmapMode::ReadWrite, 4096, &UnmapLock::new()).expect("map");
    assert_eq!(mapping.mode(), MmapMode::ReadWrite);
    assert_eq!(mapping.len(), 4096);

    let view = mapping.view();
    view.write_at(0, &[0xFF]).expect("write");
    view.page_out(0..4096).expect("page_out");
    mapping.flush().expect("flush");
    drop(view);
    mapping.close().expect("close");

    let bytes = fs::read(&path).expect("read back");
    assert_eq!(bytes.len(), 4096);
    assert_eq!(bytes[0], 0xFF);
    assert!(bytes[1..].iter().all(|&b| b == 0));

    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn map_existing_contents_read_only() {
    let path = tmp_path("map_existing_ro");
    fs::write(&path, b"hello-mmap-view").expect("seed");

    let file = File::open(&path).expect("open ro");
    let mapping = Mapping::builder(file, &UnmapLock::new())
        .mode(MmapMode::ReadOnly)
        .map()
        .expect("map ro");
    assert_eq!(mapping.len(), 15);

    let view = mapping.view();
    assert_eq!(view.range().expect("ro range"), b"hello-mmap-view");
    // nothing to write back
    mapping.flush().expect("flush ro");

    drop(view);
    drop(mapping);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn builder_size_maps_a_prefix() {
    let path = tmp_path("builder_prefix");
    fs::write(&path, b"0123456789").expect("seed");

    let file = OpenOptions::new().read(true).write(true).open(&path).expect("open");
    let mapping = Mapping::builder(file, &UnmapLock::new())
        .mode(MmapMode::ReadWrite)
        .size(4)
        .random_access(true)
        .map()
        .expect("map prefix");

    let view = mapping.view();
    let mut prefix = [0u8; 4];
    view.read_at(0, &mut prefix).expect("read prefix");
    assert_eq!(&prefix, b"0123");
    assert!(view.write_at(4, b"x").is_err());

    drop(view);
    drop(mapping);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn zero_length_file_maps_empty() {
    let path = tmp_path("zero_length");
    let _ = fs::remove_file(&path);

    let file = create_file(&path, 0);
    let mapping = Mapping::new(file, MmapMode::ReadWrite, 0, &UnmapLock::new()).expect("map empty");
    assert!(mapping.is_empty());

    let view = mapping.view();
    assert!(view.is_empty());
    view.read_at(0, &mut []).expect("empty read");
    view.write_at(0, &[]).expect("empty write");
    assert!(matches!(
        view.write_at(0, b"x"),
        Err(MmapViewError::OutOfBounds { total: 0, .. })
    ));
    mapping.flush().expect("flush empty");

    drop(view);
    mapping.close().expect("close empty");
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn zero_length_skips_the_os_call() {
    // A read-only file cannot be mapped writable; size 0 must not even try.
    let path = tmp_path("zero_length_no_os_call");
    fs::write(&path, b"").expect("seed");

    let file = File::open(&path).expect("open ro");
    let mapping = Mapping::new(file, MmapMode::ReadWrite, 0, &UnmapLock::new())
        .expect("empty mapping needs no OS call");
    assert!(mapping.view().is_empty());

    drop(mapping);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn permission_mismatch_is_a_mapping_error() {
    let path = tmp_path("permission_mismatch");
    fs::write(&path, vec![0u8; 4096]).expect("seed");

    let file = File::open(&path).expect("open ro");
    let result = Mapping::new(file, MmapMode::ReadWrite, 4096, &UnmapLock::new());
    match result {
        Err(err @ MmapViewError::Mapping(_)) => assert!(err.os_code().is_some()),
        other => panic!("expected a mapping error, got {other:?}"),
    }

    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn read_only_views_reject_writes() {
    let path = tmp_path("ro_rejects_writes");
    fs::write(&path, vec![7u8; 128]).expect("seed");

    let file = File::open(&path).expect("open ro");
    let mapping = Mapping::new(file, MmapMode::ReadOnly, 128, &UnmapLock::new()).expect("map");
    let view = mapping.view();

    assert!(matches!(view.write_at(0, b"x"), Err(MmapViewError::InvalidMode(_))));
    // SAFETY: no other reference to the bytes is alive.
    assert!(matches!(unsafe { view.range_mut() }, Err(MmapViewError::InvalidMode(_))));

    let mut buf = [0u8; 4];
    view.read_at(124, &mut buf).expect("read tail");
    assert_eq!(buf, [7; 4]);

    drop(view);
    drop(mapping);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn invalid_offset_access() {
    let path = tmp_path("invalid_offset_access");
    let _ = fs::remove_file(&path);

    let file = create_file(&path, 1024);
    let mapping = Mapping::new(file, MmapMode::ReadWrite, 1024, &UnmapLock::new()).expect("map");
    let view = mapping.view();

    let mut buf = [0u8; 10];
    let result = view.read_at(2048, &mut buf);
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(
            e.to_string(),
            "range out of bounds: offset=2048, len=10, total=1024"
        );
    }
    assert!(view.write_at(1020, b"too long").is_err());
    assert!(view.write_at(u64::MAX, b"x").is_err());

    drop(view);
    drop(mapping);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn range_mut_writes_are_seen_by_read_at() {
    let file = tempfile::tempfile().expect("tempfile");
    file.set_len(64).expect("set_len");
    let mapping = Mapping::new(file, MmapMode::ReadWrite, 64, &UnmapLock::new()).expect("map");
    let view = mapping.view();

    {
        // SAFETY: this is the only access to the mapping in this scope.
        let bytes = unsafe { view.range_mut() }.expect("writable");
        bytes[10..16].copy_from_slice(b"ABCDEF");
        assert_eq!(view.as_ptr(), bytes.as_ptr());
    }
    let mut buf = [0u8; 6];
    view.read_at(10, &mut buf).expect("read");
    assert_eq!(&buf, b"ABCDEF");
}

#[test]
fn moved_mapping_releases_once() {
    let file = tempfile::tempfile().expect("tempfile");
    file.set_len(4096).expect("set_len");
    let mapping = Mapping::new(file, MmapMode::ReadWrite, 4096, &UnmapLock::new()).expect("map");

    // Move through a container and back out; only the final owner releases.
    let mut owners = vec![mapping];
    let moved = owners.pop().expect("owner");
    assert!(owners.is_empty());
    drop(owners);

    let view = moved.view();
    view.write_at(0, b"still mapped").expect("write after move");
    drop(view);
    moved.close().expect("close");
}

#[cfg(target_pointer_width = "32")]
#[test]
fn oversized_mapping_is_rejected() {
    let file = tempfile::tempfile().expect("tempfile");
    let result = Mapping::new(file, MmapMode::ReadOnly, u64::MAX, &UnmapLock::new());
    assert!(matches!(result, Err(MmapViewError::TooLarge { size: u64::MAX })));
}
