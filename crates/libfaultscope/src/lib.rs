//! Core library for faultscope.
//! Locates line-table rows for a source position and scrapes variable
//! state from a batch-mode debugger run. The CLI front end is a thin
//! wrapper around these modules.

pub mod dwarf;
pub mod errors;
#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;
pub mod lines;
pub mod location;
pub mod process;
pub mod transcript;

pub use dwarf::{DebugBinary, find_matches};
pub use errors::{ScopeError, ScopeResult, Section};
pub use lines::LineEntry;
pub use location::SourceLocation;
pub use process::{Debugger, capture_state};
pub use transcript::{GlobalSymbol, Markers, Snapshot, TranscriptParser, VariableBinding};

/// Exposes the crate version for CLI reporting.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
