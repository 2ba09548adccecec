//! Error taxonomy for faultscope.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Unified result type across the library.
pub type ScopeResult<T> = Result<T, ScopeError>;

/// Transcript sections the scraper walks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Locals,
    Globals,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Locals => f.write_str("locals"),
            Section::Globals => f.write_str("globals"),
        }
    }
}

/// Error cases
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("cannot open binary {}: {source}", path.display())]
    BinaryUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a recognised object file: {source}", path.display())]
    ObjectFormat {
        path: PathBuf,
        #[source]
        source: object::Error,
    },

    /// The object file parsed but has no `.debug_info`/`.debug_line` data.
    #[error("{} carries no DWARF debug information", path.display())]
    MissingDebugInfo { path: PathBuf },

    #[error("malformed DWARF: {0}")]
    Dwarf(#[from] gimli::Error),

    #[error("line program row references unknown file index {index}")]
    UnknownFileIndex { index: u64 },

    #[error("invalid breakpoint location `{0}`, expected <file>:<line>")]
    InvalidLocation(String),

    #[error("section marker {0:?} must be a non-empty single line")]
    InvalidMarker(String),

    #[error("cannot quote program arguments: {0}")]
    ProgramArguments(#[from] shlex::QuoteError),

    #[error("failed to launch debugger `{program}`: {source}")]
    DebuggerLaunchFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("debugger exited with {status} without output; stderr: {stderr}")]
    DebuggerExited { status: ExitStatus, stderr: String },

    #[error("marker `{marker}` never appeared in the debugger transcript")]
    SentinelNotFound { marker: String },

    #[error("debugger transcript ended inside the {section} section (last line: {last_line:?})")]
    UnexpectedEndOfTranscript {
        section: Section,
        last_line: Option<String>,
    },
}
