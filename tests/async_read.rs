//! Background reads: delivery on the control thread, handle isolation,
//! and outstanding-work accounting.

mod common;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use common::{ZipBuilder, patterned};
use zipfile::codec::CodecError;
use zipfile::{Error, FatalError, Host, HostConfig, ZipFile};

type Delivered = Rc<RefCell<Vec<(String, zipfile::Result<Vec<u8>>)>>>;

fn host() -> Host {
    Host::with_config(HostConfig::default().worker_threads(4)).unwrap()
}

fn sample_archive(dir: &tempfile::TempDir) -> PathBuf {
    ZipBuilder::new()
        .stored("hello.txt", b"hello world")
        .deflated("lorem.txt", "lorem ipsum dolor sit amet ".repeat(500).as_bytes())
        .deflated("blob.bin", &patterned(3, 64 * 1024))
        .stored("empty", b"")
        .write(dir.path(), "sample.zip")
}

/// Schedule a read whose result is pushed onto `delivered`.
fn read_into(archive: &ZipFile, name: &str, delivered: &Delivered) -> zipfile::Result<()> {
    let delivered = Rc::clone(delivered);
    let owned = name.to_string();
    archive.read_file(name, move |result| {
        delivered.borrow_mut().push((owned, result));
    })
}

#[test]
fn background_reads_match_sync_reads() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let archive = host.open(sample_archive(&dir)).unwrap();
    let delivered: Delivered = Rc::default();

    for name in archive.names() {
        read_into(&archive, name, &delivered).unwrap();
    }
    host.run().unwrap();

    let delivered = delivered.take();
    assert_eq!(delivered.len(), archive.count());
    for (name, result) in delivered {
        let bytes = result.unwrap();
        assert_eq!(bytes, archive.read_file_sync(&name).unwrap(), "{name}");
    }
}

#[test]
fn read_returns_before_completion_and_counts_outstanding_work() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let archive = host.open(sample_archive(&dir)).unwrap();
    let delivered: Delivered = Rc::default();

    read_into(&archive, "hello.txt", &delivered).unwrap();
    read_into(&archive, "lorem.txt", &delivered).unwrap();
    read_into(&archive, "blob.bin", &delivered).unwrap();

    // Callbacks only run from the control loop.
    assert!(delivered.borrow().is_empty());
    assert_eq!(host.pending(), 3);
    assert_eq!(archive.pending_reads(), 3);

    host.run().unwrap();
    assert_eq!(delivered.borrow().len(), 3);
    assert_eq!(host.pending(), 0);
    assert_eq!(archive.pending_reads(), 0);
}

#[test]
fn run_without_pending_work_returns_immediately() {
    let host = host();
    assert!(!host.run_once().unwrap());
    host.run().unwrap();
}

#[test]
fn run_once_delivers_one_completion_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let archive = host.open(sample_archive(&dir)).unwrap();
    let delivered: Delivered = Rc::default();

    read_into(&archive, "hello.txt", &delivered).unwrap();
    read_into(&archive, "empty", &delivered).unwrap();

    assert!(host.run_once().unwrap());
    assert_eq!(delivered.borrow().len(), 1);
    assert!(!host.run_once().unwrap());
    assert_eq!(delivered.borrow().len(), 2);
}

#[test]
fn missing_entry_is_reported_through_the_callback() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let archive = host.open(sample_archive(&dir)).unwrap();
    let delivered: Delivered = Rc::default();

    read_into(&archive, "nonexistent", &delivered).unwrap();
    host.run().unwrap();

    let delivered = delivered.take();
    assert_eq!(delivered.len(), 1);
    match &delivered[0].1 {
        Err(Error::EntryNotFound { name }) => assert_eq!(name, "nonexistent"),
        other => panic!("expected EntryNotFound, got {other:?}"),
    }
    assert_eq!(host.pending(), 0);
}

#[test]
fn entry_shorter_than_declared_fails_in_the_background() {
    let dir = tempfile::tempdir().unwrap();
    let data = "short and sweet ".repeat(8);
    let path = ZipBuilder::new()
        .deflated("short.txt", data.as_bytes())
        .declared_size(data.len() as u32 * 2)
        .write(dir.path(), "short.zip");

    let host = host();
    let archive = host.open(&path).unwrap();
    let delivered: Delivered = Rc::default();

    read_into(&archive, "short.txt", &delivered).unwrap();
    host.run().unwrap();

    let delivered = delivered.take();
    match &delivered[0].1 {
        Err(Error::Read { name, code }) => {
            assert_eq!(name, "short.txt");
            assert_eq!(*code, CodecError::BAD_ZIP_FILE);
        }
        other => panic!("expected Read, got {other:?}"),
    }
    assert_eq!(archive.pending_reads(), 0);
}

#[test]
fn concurrent_reads_of_distinct_entries_do_not_mix() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = ZipBuilder::new();
    let mut expected = HashMap::new();
    for i in 0..32u32 {
        let name = format!("entries/{i:02}.bin");
        let data = patterned(i + 100, 16 * 1024 + i as usize * 97);
        builder = if i % 2 == 0 {
            builder.deflated(&name, &data)
        } else {
            builder.stored(&name, &data)
        };
        expected.insert(name, data);
    }
    let path = builder.write(dir.path(), "many.zip");

    let host = host();
    let archive = host.open(&path).unwrap();
    let delivered: Delivered = Rc::default();
    for name in archive.names() {
        read_into(&archive, name, &delivered).unwrap();
    }
    assert_eq!(host.pending(), 32);
    host.run().unwrap();

    let delivered = delivered.take();
    assert_eq!(delivered.len(), 32);
    for (name, result) in delivered {
        assert_eq!(&result.unwrap(), &expected[&name], "{name}");
    }
}

#[test]
fn sync_reads_interleave_with_background_reads() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let archive = host.open(sample_archive(&dir)).unwrap();
    let delivered: Delivered = Rc::default();

    for _ in 0..4 {
        read_into(&archive, "blob.bin", &delivered).unwrap();
        assert_eq!(archive.read_file_sync("hello.txt").unwrap(), b"hello world");
    }
    host.run().unwrap();

    let expected = patterned(3, 64 * 1024);
    for (_, result) in delivered.take() {
        assert_eq!(result.unwrap(), expected);
    }
}

#[test]
fn boundary_errors_are_returned_synchronously() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let archive = host.open(sample_archive(&dir)).unwrap();
    let called = Rc::new(RefCell::new(false));

    let flag = Rc::clone(&called);
    let err = archive
        .read_file("", move |_| *flag.borrow_mut() = true)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    archive.destroy();
    let flag = Rc::clone(&called);
    let err = archive
        .read_file("hello.txt", move |_| *flag.borrow_mut() = true)
        .unwrap_err();
    assert!(matches!(err, Error::UseAfterDestroy));

    assert_eq!(host.pending(), 0);
    host.run().unwrap();
    assert!(!*called.borrow());
}

#[test]
fn destroy_does_not_disturb_scheduled_reads() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let archive = host.open(sample_archive(&dir)).unwrap();
    let delivered: Delivered = Rc::default();

    read_into(&archive, "hello.txt", &delivered).unwrap();
    archive.destroy();
    archive.destroy();
    assert_eq!(archive.pending_reads(), 1);

    host.run().unwrap();
    let delivered = delivered.take();
    assert_eq!(delivered[0].1.as_deref().unwrap(), b"hello world");
    assert_eq!(archive.pending_reads(), 0);
}

#[test]
fn dropped_archive_stays_alive_until_reads_complete() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let archive = host.open(sample_archive(&dir)).unwrap();
    let delivered: Delivered = Rc::default();

    read_into(&archive, "lorem.txt", &delivered).unwrap();
    drop(archive);
    assert_eq!(host.pending(), 1);

    host.run().unwrap();
    let delivered = delivered.take();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].1.as_ref().unwrap().starts_with(b"lorem ipsum"));
    assert_eq!(host.pending(), 0);
}

#[test]
fn callbacks_may_schedule_further_reads() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let archive = Rc::new(host.open(sample_archive(&dir)).unwrap());
    let delivered: Delivered = Rc::default();

    let chained = Rc::clone(&archive);
    let sink = Rc::clone(&delivered);
    archive
        .read_file("hello.txt", move |first| {
            sink.borrow_mut().push(("hello.txt".into(), first));
            read_into(&chained, "empty", &sink).unwrap();
        })
        .unwrap();

    host.run().unwrap();
    let names: Vec<_> = delivered.take().into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["hello.txt", "empty"]);
    assert_eq!(archive.pending_reads(), 0);
}

#[test]
fn panicking_callback_is_fatal_after_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let archive = host.open(sample_archive(&dir)).unwrap();
    let delivered: Delivered = Rc::default();

    archive
        .read_file("hello.txt", |_| panic!("callback exploded"))
        .unwrap();
    read_into(&archive, "empty", &delivered).unwrap();

    match host.run() {
        Err(FatalError::CallbackPanicked { name, message }) => {
            assert_eq!(name, "hello.txt");
            assert_eq!(message, "callback exploded");
        }
        other => panic!("expected CallbackPanicked, got {other:?}"),
    }

    // The panicking task was torn down before the error surfaced.
    host.run().unwrap();
    assert_eq!(host.pending(), 0);
    assert_eq!(archive.pending_reads(), 0);
    assert_eq!(delivered.borrow().len(), 1);
}

#[cfg(unix)]
#[test]
fn private_handle_open_failure_is_synchronous() {
    let dir = tempfile::tempdir().unwrap();
    let host = host();
    let path = sample_archive(&dir);
    let archive = host.open(&path).unwrap();

    // The archive's own handle stays open; a fresh one cannot be made.
    std::fs::remove_file(&path).unwrap();
    let err = archive.read_file("hello.txt", |_| {}).unwrap_err();
    assert!(matches!(err, Error::Open { .. }), "got {err:?}");
    assert_eq!(host.pending(), 0);

    assert_eq!(archive.read_file_sync("hello.txt").unwrap(), b"hello world");
}
