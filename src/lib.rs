//! Splits a raw Windows command line into the argument vector the process
//! would have received, by handing it to the native `CommandLineToArgvW`.
//!
//! Input and output are in a narrow encoding (the "ANSI" code page unless
//! another [`CodePage`] is chosen); the native splitter only works on wide
//! strings, so each call converts the line to UTF-16 and every token back.
//!
//! Only Windows defines these splitting rules. Elsewhere every call fails
//! with [`Error::UnsupportedPlatform`]; the [`parser`] module models the
//! rules for tests and tooling but is never used in place of the native
//! splitter.

use bytes::Bytes;

pub mod code_page;
#[deny(missing_docs)]
pub mod error;
#[cfg(windows)]
mod native;
pub mod parser;
pub mod quote;

pub use code_page::CodePage;
pub use error::{Direction, Error, Result};
pub use quote::{join, quote_arg};

/// Tokens in the order they appear on the command line; index 0 is the
/// program name.
pub type ArgVector = Vec<Bytes>;

/// Splits `command_line`, given in the ANSI code page.
///
/// `None` is a missing command line and fails with [`Error::NoInput`]; an
/// empty one is split like any other.
pub fn tokenize(command_line: Option<&[u8]>) -> Result<ArgVector> {
    tokenize_with(command_line, CodePage::Ansi)
}

/// Splits `command_line`, given in `code_page`, returning tokens in the same
/// code page.
#[cfg(windows)]
pub fn tokenize_with(command_line: Option<&[u8]>, code_page: CodePage) -> Result<ArgVector> {
    let command_line = command_line.ok_or(Error::NoInput)?;
    native::tokenize(command_line, code_page)
}

/// Splits `command_line`, given in `code_page`, returning tokens in the same
/// code page.
#[cfg(not(windows))]
pub fn tokenize_with(command_line: Option<&[u8]>, code_page: CodePage) -> Result<ArgVector> {
    tracing::debug!(
        has_input = command_line.is_some(),
        %code_page,
        "command-line splitting requested on a non-Windows platform"
    );
    Err(Error::UnsupportedPlatform)
}

/// Splits a UTF-8 command line.
///
/// Unpaired surrogates become U+FFFD when tokens are converted back, so
/// every token is valid UTF-8.
pub fn tokenize_str(command_line: &str) -> Result<Vec<String>> {
    tokenize_with(Some(command_line.as_bytes()), CodePage::Utf8)?
        .into_iter()
        .map(|token| {
            String::from_utf8(token.to_vec()).map_err(|_| Error::EncodingConversion {
                direction: Direction::WideToNarrow,
                code_page: CodePage::Utf8,
                os_code: None,
            })
        })
        .collect()
}
