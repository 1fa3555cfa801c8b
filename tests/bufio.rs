use std::io::Write;
use std::os::fd::AsRawFd;

use corio::BufIo;

mod util;

use util::{init, pipe, pipe_writer};

#[test]
fn fill_peek_skip_find() {
    init();

    let (rd, wr) = pipe();
    let mut wr = pipe_writer(wr);
    wr.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();

    let mut buf = BufIo::with_capacity(64);
    assert_eq!(buf.fill(rd.as_raw_fd()).unwrap(), 18);

    assert_eq!(buf.find(b"\r\n\r\n"), Some(14));
    assert_eq!(buf.peek(4), b"GET ");
    assert_eq!(buf.len(), 18);

    assert_eq!(buf.skip(14), 14);
    assert_eq!(buf.read(4), b"\r\n\r\n");

    // Drained: both cursors snap back, the whole buffer is room again.
    assert_eq!(buf.len(), 0);
    assert_eq!(buf.room(), buf.capacity());
}

#[test]
fn fill_reports_eof() {
    init();

    let (rd, wr) = pipe();
    let mut wr = pipe_writer(wr);
    wr.write_all(b"last").unwrap();
    drop(wr);

    let mut buf = BufIo::with_capacity(16);
    assert_eq!(buf.fill(rd.as_raw_fd()).unwrap(), 4);
    assert_eq!(buf.fill(rd.as_raw_fd()).unwrap(), 0);
}

#[test]
fn fill_full_buffer_fails() {
    init();

    let (rd, wr) = pipe();
    let mut wr = pipe_writer(wr);
    wr.write_all(b"123456").unwrap();

    let mut buf = BufIo::with_capacity(4);
    assert_eq!(buf.fill(rd.as_raw_fd()).unwrap(), 4);
    let err = buf.fill(rd.as_raw_fd()).unwrap_err();
    assert_eq!(err.to_string(), "buffer is full");
}

#[test]
fn peek_does_not_consume() {
    init();

    let mut buf = BufIo::with_capacity(16);
    buf.tail()[..5].copy_from_slice(b"abcde");
    buf.add(5);

    assert_eq!(buf.peek(3), b"abc");
    assert_eq!(buf.peek(100), b"abcde");
    assert_eq!(buf.len(), 5);

    // A subsequent read returns the same bytes and advances.
    assert_eq!(buf.read(3), b"abc");
    assert_eq!(buf.len(), 2);
}

#[test]
fn index_is_relative_to_the_read_cursor() {
    init();

    let mut buf = BufIo::with_capacity(16);
    buf.tail()[..6].copy_from_slice(b"xxabcx");
    buf.add(6);
    buf.skip(2);

    assert_eq!(buf.index(b'a'), Some(0));
    assert_eq!(buf.index(b'c'), Some(2));
    assert_eq!(buf.index(b'z'), None);
}

#[test]
fn find_locates_needles() {
    init();

    let mut buf = BufIo::with_capacity(32);
    buf.tail()[..10].copy_from_slice(b"abcabcabca");
    buf.add(10);

    assert_eq!(buf.find(b"abc"), Some(0));
    assert_eq!(buf.find(b"cab"), Some(2));
    assert_eq!(buf.find(b"abcd"), None);
    assert_eq!(buf.find(b""), Some(0));

    // find(needle) == k implies peek(k + len)[k..] == needle.
    let k = buf.find(b"cab").unwrap();
    assert_eq!(&buf.peek(k + 3)[k..], b"cab");
}

#[test]
fn slide_compacts_unread_bytes() {
    init();

    let mut buf = BufIo::with_capacity(8);
    buf.tail()[..8].copy_from_slice(b"abcdefgh");
    buf.add(8);
    buf.skip(5);

    assert_eq!(buf.room(), 0);
    buf.slide();
    assert_eq!(buf.len(), 3);
    assert_eq!(buf.room(), 5);
    assert_eq!(buf.peek(3), b"fgh");

    // Sliding an already compact buffer changes nothing.
    buf.slide();
    assert_eq!(buf.len(), 3);
    assert_eq!(buf.peek(3), b"fgh");
}

#[test]
fn read_clamps_and_resets() {
    init();

    let mut buf = BufIo::with_capacity(8);
    buf.tail()[..4].copy_from_slice(b"wxyz");
    buf.add(4);

    assert_eq!(buf.read(2), b"wx");
    assert_eq!(buf.read_all(), b"yz");
    assert_eq!(buf.read(5), b"");
    assert_eq!(buf.room(), buf.capacity());
}
