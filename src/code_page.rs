use std::fmt;
use std::str::FromStr;

/// The narrow encoding a command line is supplied in and returned in.
///
/// The named variants map onto the Windows code-page identifiers `CP_ACP`,
/// `CP_OEMCP` and `CP_UTF8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CodePage {
    /// The system's active "ANSI" code page.
    #[default]
    Ansi,
    /// The system's OEM (console) code page.
    Oem,
    Utf8,
    /// Any other code-page identifier, passed through as is.
    Other(u32),
}

impl CodePage {
    pub fn id(self) -> u32 {
        match self {
            CodePage::Ansi => 0,
            CodePage::Oem => 1,
            CodePage::Utf8 => 65001,
            CodePage::Other(id) => id,
        }
    }
}

impl From<u32> for CodePage {
    fn from(id: u32) -> Self {
        match id {
            0 => CodePage::Ansi,
            1 => CodePage::Oem,
            65001 => CodePage::Utf8,
            other => CodePage::Other(other),
        }
    }
}

impl FromStr for CodePage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ansi" | "acp" => Ok(CodePage::Ansi),
            "oem" | "oemcp" => Ok(CodePage::Oem),
            "utf8" | "utf-8" => Ok(CodePage::Utf8),
            other => other
                .parse::<u32>()
                .map(CodePage::from)
                .map_err(|_| format!("unknown code page: {}", s)),
        }
    }
}

impl fmt::Display for CodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodePage::Ansi => write!(f, "ansi"),
            CodePage::Oem => write!(f, "oem"),
            CodePage::Utf8 => write!(f, "utf8"),
            CodePage::Other(id) => write!(f, "{}", id),
        }
    }
}
