#![allow(clippy::unwrap_used)]

//! Content paths: create, write, read, truncate, flush.

mod common;

use common::{new_core, MockDrive};
use fuser::FUSE_ROOT_ID;
use godrive_fs::fs::FsError;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_write_flush_read_round_trips() {
    let drive = MockDrive::new();
    drive.add_dir("root", "d1", "work");
    let core = new_core(&drive, "d1");

    let (ino, attr) = core.create(FUSE_ROOT_ID, "hello.txt").await.unwrap();
    assert_eq!(attr.size, 0);

    assert_eq!(core.write(ino, 0, b"hi").await.unwrap(), 2);
    core.flush(ino).await.unwrap();

    core.open(ino).await.unwrap();
    assert_eq!(core.read(ino, 0, 2).await.unwrap(), b"hi");
    assert_eq!(core.getattr(ino).await.unwrap().size, 2);

    // The create pre-materializes an empty buffer, so nothing was ever
    // downloaded on this path.
    assert_eq!(drive.download_count(), 0);
    let uploads = drive.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].1, b"hi");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn read_pulls_content_once_and_windows_it() {
    let drive = MockDrive::new();
    drive.add_dir("root", "d1", "work");
    drive.add_file("d1", "f1", "greeting.txt", b"hello world");
    let core = new_core(&drive, "d1");

    let (ino, _) = core.lookup(FUSE_ROOT_ID, "greeting.txt").await.unwrap();
    core.open(ino).await.unwrap();
    assert_eq!(drive.download_count(), 0, "open must not download");

    assert_eq!(core.read(ino, 0, 5).await.unwrap(), b"hello");
    assert_eq!(core.read(ino, 6, 100).await.unwrap(), b"world");
    // Reads past the end return no bytes rather than an error.
    assert_eq!(core.read(ino, 11, 4).await.unwrap(), b"");
    assert_eq!(core.read(ino, 1000, 4).await.unwrap(), b"");

    assert_eq!(drive.download_count(), 1, "buffer is downloaded once");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_download_reads_as_missing() {
    let drive = MockDrive::new();
    drive.add_dir("root", "d1", "work");
    drive.add_file("d1", "f1", "flaky.bin", b"data");
    drive
        .fail_downloads
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let core = new_core(&drive, "d1");

    let (ino, _) = core.lookup(FUSE_ROOT_ID, "flaky.bin").await.unwrap();
    assert_eq!(core.read(ino, 0, 4).await.unwrap_err(), FsError::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn truncate_to_zero_skips_the_download() {
    let drive = MockDrive::new();
    drive.add_dir("root", "d1", "work");
    drive.add_file("d1", "f1", "big.bin", &vec![7u8; 1_000_000]);
    let core = new_core(&drive, "d1");

    let (ino, attr) = core.lookup(FUSE_ROOT_ID, "big.bin").await.unwrap();
    assert_eq!(attr.size, 1_000_000);

    let attr = core.setattr(ino, Some(0)).await.unwrap();
    assert_eq!(attr.size, 0);
    assert_eq!(drive.download_count(), 0, "resize to zero must not download");

    core.flush(ino).await.unwrap();
    let uploads = drive.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].1.is_empty(), "flush uploads zero bytes");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn truncate_grow_zero_fills_the_tail() {
    let drive = MockDrive::new();
    drive.add_dir("root", "d1", "work");
    drive.add_file("d1", "f1", "short.txt", b"abc");
    let core = new_core(&drive, "d1");

    let (ino, _) = core.lookup(FUSE_ROOT_ID, "short.txt").await.unwrap();
    let attr = core.setattr(ino, Some(10)).await.unwrap();
    assert_eq!(attr.size, 10);

    let content = core.read(ino, 0, 100).await.unwrap();
    assert_eq!(content.len(), 10);
    assert_eq!(&content[..3], b"abc");
    assert!(content[3..].iter().all(|&b| b == 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_past_end_zero_fills_the_gap() {
    let drive = MockDrive::new();
    drive.add_dir("root", "d1", "work");
    drive.add_file("d1", "f1", "sparse.bin", b"");
    let core = new_core(&drive, "d1");

    let (ino, _) = core.lookup(FUSE_ROOT_ID, "sparse.bin").await.unwrap();
    assert_eq!(core.write(ino, 5, b"x").await.unwrap(), 1);

    assert_eq!(core.getattr(ino).await.unwrap().size, 6);
    assert_eq!(core.read(ino, 0, 100).await.unwrap(), b"\0\0\0\0\0x");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_truncates_everything_past_its_offset() {
    let drive = MockDrive::new();
    drive.add_dir("root", "d1", "work");
    drive.add_file("d1", "f1", "notes.txt", b"0123456789");
    let core = new_core(&drive, "d1");

    // A write at offset 4 resizes the buffer to end exactly at the write.
    let (ino, _) = core.lookup(FUSE_ROOT_ID, "notes.txt").await.unwrap();
    assert_eq!(core.write(ino, 4, b"AB").await.unwrap(), 2);

    assert_eq!(core.read(ino, 0, 100).await.unwrap(), b"0123AB");
    assert_eq!(core.getattr(ino).await.unwrap().size, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_flush_uploads_identical_bytes() {
    let drive = MockDrive::new();
    drive.add_dir("root", "d1", "work");
    drive.add_file("d1", "f1", "stable.txt", b"content");
    let core = new_core(&drive, "d1");

    let (ino, _) = core.lookup(FUSE_ROOT_ID, "stable.txt").await.unwrap();
    assert_eq!(core.write(ino, 0, b"fresh").await.unwrap(), 5);
    core.flush(ino).await.unwrap();
    core.flush(ino).await.unwrap();

    let uploads = drive.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].1, uploads[1].1);
    assert_eq!(drive.content("f1").unwrap(), b"fresh");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn flush_without_content_is_a_no_op() {
    let drive = MockDrive::new();
    drive.add_dir("root", "d1", "work");
    drive.add_file("d1", "f1", "untouched.txt", b"remote");
    let core = new_core(&drive, "d1");

    // Open and close without reading or writing: nothing to upload.
    let (ino, _) = core.lookup(FUSE_ROOT_ID, "untouched.txt").await.unwrap();
    core.open(ino).await.unwrap();
    core.flush(ino).await.unwrap();

    assert!(drive.uploads.lock().unwrap().is_empty());
    assert_eq!(drive.content("f1").unwrap(), b"remote");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_inodes_write_in_parallel() {
    let drive = MockDrive::new();
    drive.add_dir("root", "d1", "work");
    drive.add_file("d1", "f1", "a.txt", b"");
    drive.add_file("d1", "f2", "b.txt", b"");
    let core = std::sync::Arc::new(new_core(&drive, "d1"));

    let (ino_a, _) = core.lookup(FUSE_ROOT_ID, "a.txt").await.unwrap();
    let (ino_b, _) = core.lookup(FUSE_ROOT_ID, "b.txt").await.unwrap();

    let core_a = std::sync::Arc::clone(&core);
    let core_b = std::sync::Arc::clone(&core);
    let writer_a = tokio::spawn(async move {
        for i in 0..50u64 {
            core_a.write(ino_a, (i * 2) as i64, b"aa").await.unwrap();
        }
    });
    let writer_b = tokio::spawn(async move {
        for i in 0..50u64 {
            core_b.write(ino_b, (i * 3) as i64, b"bbb").await.unwrap();
        }
    });
    writer_a.await.unwrap();
    writer_b.await.unwrap();

    assert_eq!(core.getattr(ino_a).await.unwrap().size, 100);
    assert_eq!(core.getattr(ino_b).await.unwrap().size, 150);
}
