//! Errors from splitting and quoting command lines.

use std::fmt;

use crate::CodePage;

/// Which side of the narrow/wide round trip a conversion failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Caller's code page to UTF-16, before splitting.
    NarrowToWide,
    /// UTF-16 token back to the caller's code page.
    WideToNarrow,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::NarrowToWide => write!(f, "narrow to wide"),
            Direction::WideToNarrow => write!(f, "wide to narrow"),
        }
    }
}

/// Why a command line could not be split or built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No command line was passed at all (as opposed to an empty one).
    #[error("no command line was provided")]
    NoInput,

    /// A conversion between the narrow and wide encodings failed.
    #[error("{direction} conversion failed for code page {code_page}{}", os_suffix(.os_code))]
    EncodingConversion {
        /// Which way the conversion was going.
        direction: Direction,
        /// Code page the narrow side is in.
        code_page: CodePage,
        /// `GetLastError()` at the failure, when it was set.
        os_code: Option<u32>,
    },

    /// `CommandLineToArgvW` returned no array or no arguments.
    #[error("the native command-line splitter failed{}", os_suffix(.os_code))]
    TokenizationFailure {
        /// `GetLastError()` at the failure, when it was set.
        os_code: Option<u32>,
    },

    /// Splitting was requested on a platform other than Windows.
    #[error("command-line splitting is only supported on Windows")]
    UnsupportedPlatform,

    /// The program name contains a quote, which token 0 cannot express.
    #[error("program name cannot be quoted for a command line: {0}")]
    UnquotableProgram(String),
}

impl Error {
    /// Whether repeating the same call could succeed.
    ///
    /// Only a failure of the native splitter itself is transient (it fails
    /// when it cannot allocate); everything else depends on the input or the
    /// platform.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TokenizationFailure { .. })
    }
}

fn os_suffix(code: &Option<u32>) -> String {
    match code {
        Some(code) => format!(" (os error {})", code),
        None => String::new(),
    }
}

/// Result of the splitting and quoting operations.
pub type Result<T> = std::result::Result<T, Error>;
