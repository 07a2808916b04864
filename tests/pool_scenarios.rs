//! End-to-end pool scenarios: a request-scoped pool holding foreign
//! resources that must be released at teardown.

use core::ffi::c_void;
use regionpool::logging::{init_with_config, LogConfig, LogFormat};
use regionpool::{Pool, PoolError};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// Closes the file moved into the cleanup context
unsafe extern "C" fn close_file(data: *mut c_void) {
    drop(Box::from_raw(data.cast::<File>()));
}

#[repr(C)]
struct Request {
    id: u64,
    path_len: usize,
}

#[test]
fn test_small_large_and_cleanup_order() {
    let _ = init_with_config(LogConfig::debug().with_format(LogFormat::Compact));

    let mut pool = Pool::create(512).unwrap();

    let small = pool.alloc(128).unwrap();
    let first = pool.blocks()[0];
    assert!(first.contains(small.as_ptr() as usize));
    assert!(small.as_ptr() as usize + 128 <= first.end);

    // Above max, so served by the system allocator whatever room is left
    let large = pool.alloc(512).unwrap();
    assert!(!pool.contains(large.as_ptr()));
    assert_eq!(pool.blocks().len(), 1);

    let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    for name in ["first", "second"] {
        let order = order.clone();
        pool.on_destroy(move || order.borrow_mut().push(name)).unwrap();
    }

    pool.destroy();
    assert_eq!(*order.borrow(), vec!["second", "first"]);
}

#[test]
fn test_file_closed_by_cleanup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("request.log");

    let mut pool = Pool::create(1024).unwrap();

    let request = pool
        .alloc_value(Request { id: 7, path_len: path.as_os_str().len() })
        .unwrap();
    let name = pool.alloc_str(&path.to_string_lossy()).unwrap();

    let mut file = File::create(&path).unwrap();
    writeln!(file, "request {}", unsafe { request.as_ref() }.id).unwrap();

    let cleanup = pool.add_cleanup(0).unwrap();
    unsafe {
        cleanup.set_data(Box::into_raw(Box::new(file)).cast());
        cleanup.set_handler(close_file);
    }

    assert_eq!(unsafe { name.as_ref() }.len(), unsafe { request.as_ref() }.path_len);
    assert_eq!(PathBuf::from(unsafe { name.as_ref() }), path);

    pool.destroy();
    assert_eq!(fs::read_to_string(&path).unwrap(), "request 7\n");
}

#[test]
fn test_block_exhaustion_and_growth() {
    let mut pool = Pool::create(512).unwrap();
    let size = pool.max() - 1;

    pool.alloc(size).unwrap();
    pool.alloc(size).unwrap();

    let blocks = pool.blocks();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].failed, 1);
    assert_eq!(blocks[1].end - blocks[1].start, pool.block_size());
}

#[test]
fn test_free_large_twice() {
    let mut pool = Pool::create(512).unwrap();
    let p = pool.alloc(10_000).unwrap();

    assert!(pool.free_large(p).is_ok());
    assert!(matches!(pool.free_large(p), Err(PoolError::NotFound { .. })));
}

#[test]
fn test_reset_reuses_blocks() {
    let mut pool = Pool::create(512).unwrap();
    let max = pool.max();

    for _ in 0..3 {
        pool.alloc(max).unwrap();
    }
    pool.alloc(max * 4).unwrap();
    let before = pool.stats().blocks;

    pool.reset();
    pool.reset();

    for _ in 0..3 {
        pool.alloc(max).unwrap();
    }
    assert_eq!(pool.stats().blocks, before);
    assert_eq!(pool.stats().large_live, 0);
}

#[test]
fn test_request_loop_with_reset() {
    let mut pool = Pool::create(4096).unwrap();

    for round in 0..100u64 {
        let request = pool.alloc_value(Request { id: round, path_len: 0 }).unwrap();
        let body = pool.alloc_zeroed(8192).unwrap();
        let header = pool.alloc_bytes(b"GET / HTTP/1.1").unwrap();

        assert_eq!(unsafe { request.as_ref() }.id, round);
        assert_eq!(unsafe { *body.as_ptr() }, 0);
        assert_eq!(unsafe { header.as_ref() }.len(), 14);

        pool.reset();
    }

    assert_eq!(pool.stats().blocks, 1);
}
