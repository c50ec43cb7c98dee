//! The Windows splitter: `MultiByteToWideChar`, `CommandLineToArgvW`, and
//! `WideCharToMultiByte` for each token.
//!
//! Every intermediate buffer is owned by a value whose scope ends with the
//! call, so each failure path releases what was acquired before it.

use std::ptr;
use std::slice;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};
use windows_sys::Win32::Foundation::{GetLastError, LocalFree};
use windows_sys::Win32::Globalization::{MultiByteToWideChar, WideCharToMultiByte};
use windows_sys::Win32::UI::Shell::CommandLineToArgvW;

use crate::error::{Direction, Error, Result};
use crate::{ArgVector, CodePage};

pub(crate) fn tokenize(command_line: &[u8], code_page: CodePage) -> Result<ArgVector> {
    let wide = to_wide(command_line, code_page)?;
    let argv = NativeArgv::split(&wide)?;
    debug!(
        argc = argv.len(),
        input_len = command_line.len(),
        %code_page,
        "native splitter returned"
    );

    argv.iter()
        .map(|token| to_narrow(token, code_page))
        .collect()
}

/// Converts the narrow input to a NUL-terminated wide string.
fn to_wide(narrow: &[u8], code_page: CodePage) -> Result<Vec<u16>> {
    if narrow.is_empty() {
        return Ok(vec![0]);
    }
    let failed = || conversion_error(Direction::NarrowToWide, code_page);
    let len = i32::try_from(narrow.len()).map_err(|_| failed())?;

    // SAFETY: the source pointer and length describe `narrow`; a null
    // destination with zero length asks only for the required size.
    let needed = unsafe {
        MultiByteToWideChar(
            code_page.id(),
            0,
            narrow.as_ptr(),
            len,
            ptr::null_mut(),
            0,
        )
    };
    if needed <= 0 {
        return Err(failed());
    }

    let mut wide = vec![0u16; needed as usize + 1];
    // SAFETY: `wide` holds at least `needed` writable units.
    let written = unsafe {
        MultiByteToWideChar(
            code_page.id(),
            0,
            narrow.as_ptr(),
            len,
            wide.as_mut_ptr(),
            needed,
        )
    };
    if written != needed {
        return Err(failed());
    }
    trace!(wide_len = needed, "converted command line to wide");
    Ok(wide)
}

/// Converts one wide token to the narrow encoding.
fn to_narrow(wide: &[u16], code_page: CodePage) -> Result<Bytes> {
    if wide.is_empty() {
        return Ok(Bytes::new());
    }
    let failed = || conversion_error(Direction::WideToNarrow, code_page);
    let len = i32::try_from(wide.len()).map_err(|_| failed())?;

    // SAFETY: sizing pass; nothing is written through the null destination.
    let needed = unsafe {
        WideCharToMultiByte(
            code_page.id(),
            0,
            wide.as_ptr(),
            len,
            ptr::null_mut(),
            0,
            ptr::null(),
            ptr::null_mut(),
        )
    };
    if needed <= 0 {
        return Err(failed());
    }

    let mut narrow = BytesMut::zeroed(needed as usize);
    // SAFETY: `narrow` is exactly `needed` bytes long.
    let written = unsafe {
        WideCharToMultiByte(
            code_page.id(),
            0,
            wide.as_ptr(),
            len,
            narrow.as_mut_ptr(),
            needed,
            ptr::null(),
            ptr::null_mut(),
        )
    };
    if written != needed {
        return Err(failed());
    }
    Ok(narrow.freeze())
}

fn conversion_error(direction: Direction, code_page: CodePage) -> Error {
    let os_code = last_error();
    warn!(%direction, %code_page, ?os_code, "character conversion failed");
    Error::EncodingConversion {
        direction,
        code_page,
        os_code,
    }
}

fn last_error() -> Option<u32> {
    // SAFETY: reads the calling thread's last-error value.
    match unsafe { GetLastError() } {
        0 => None,
        code => Some(code),
    }
}

/// The array `CommandLineToArgvW` allocates, freed with `LocalFree` on drop.
struct NativeArgv {
    ptr: *mut *mut u16,
    len: usize,
}

impl NativeArgv {
    /// `line` must be NUL-terminated.
    fn split(line: &[u16]) -> Result<Self> {
        debug_assert_eq!(line.last(), Some(&0));
        let mut argc = 0i32;
        // SAFETY: `line` is NUL-terminated and outlives the call.
        let ptr = unsafe { CommandLineToArgvW(line.as_ptr(), &mut argc) };
        // SAFETY: `ptr` is CommandLineToArgvW's result and is not used again.
        unsafe { Self::from_raw(ptr, argc) }
    }

    /// Takes ownership of a `CommandLineToArgvW` result.
    ///
    /// A null array or a count below one is a failure; a non-null array is
    /// freed on that path too.
    ///
    /// # Safety
    /// `ptr` must be null or an array returned by `CommandLineToArgvW` that
    /// nothing else frees, holding at least `argc` strings.
    unsafe fn from_raw(ptr: *mut *mut u16, argc: i32) -> Result<Self> {
        if ptr.is_null() {
            let os_code = last_error();
            warn!(?os_code, "CommandLineToArgvW returned null");
            return Err(Error::TokenizationFailure { os_code });
        }

        let argv = NativeArgv {
            ptr,
            len: usize::try_from(argc).unwrap_or(0),
        };
        if argv.len == 0 {
            warn!(argc, "CommandLineToArgvW reported no arguments");
            return Err(Error::TokenizationFailure { os_code: None });
        }
        Ok(argv)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn iter(&self) -> impl Iterator<Item = &[u16]> + '_ {
        (0..self.len).map(move |i| {
            // SAFETY: the native array holds `len` NUL-terminated strings
            // that live as long as `self`.
            unsafe {
                let token = *self.ptr.add(i);
                let mut n = 0;
                while *token.add(n) != 0 {
                    n += 1;
                }
                slice::from_raw_parts(token, n)
            }
        })
    }
}

impl Drop for NativeArgv {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from CommandLineToArgvW and is freed once.
        unsafe {
            LocalFree(self.ptr.cast());
        }
    }
}
