//! Every call releases what it allocated, on success and on every failure.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

use winargv::{CodePage, parser, tokenize, tokenize_with};

struct Counting;

thread_local! {
    static LIVE: Cell<isize> = const { Cell::new(0) };
}

fn adjust(delta: isize) {
    let _ = LIVE.try_with(|live| live.set(live.get() + delta));
}

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        adjust(layout.size() as isize);
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        adjust(-(layout.size() as isize));
        unsafe { System.dealloc(ptr, layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        adjust(new_size as isize - layout.size() as isize);
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

#[global_allocator]
static ALLOCATOR: Counting = Counting;

fn live() -> isize {
    LIVE.with(Cell::get)
}

/// Runs `f`, drops its result, and returns the change in live bytes.
fn leaked<T>(f: impl FnOnce() -> T) -> isize {
    let before = live();
    drop(f());
    live() - before
}

#[test]
fn no_allocation_outlives_a_call() {
    let lines: [&[u8]; 4] = [b"", b"a b c", br#"p "a b" c\"d"#, b"\xff\xfe p"];

    // First calls may register logging callsites; those live for the process.
    for line in lines {
        let _ = tokenize(Some(line));
        let _ = tokenize_with(Some(line), CodePage::Other(12345));
    }

    for line in lines {
        assert_eq!(leaked(|| tokenize(Some(line))), 0);
        assert_eq!(leaked(|| tokenize_with(Some(line), CodePage::Utf8)), 0);
        assert_eq!(leaked(|| tokenize_with(Some(line), CodePage::Other(12345))), 0);
    }
    assert_eq!(leaked(|| tokenize(None)), 0);

    let line = r#""C:\Program Files\x.exe" -m "a \"quoted\" message" trailing\\"#;
    assert_eq!(leaked(|| parser::split(line)), 0);
    assert_eq!(leaked(|| winargv::join("prog", &["a b", ""])), 0);
    assert_eq!(leaked(|| winargv::join("bad\"name", &["x"])), 0);
}
