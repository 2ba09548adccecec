//! Scraping variable state out of a batch-mode `gdb` transcript.
//!
//! The debugger script prints a marker line before `info locals` and
//! another before `info variables`. Parsing is a single forward pass over
//! the transcript lines.

use std::str::Lines;

use log::{debug, trace, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{ScopeError, ScopeResult, Section};

/// Header that closes the debug-symbol part of `info variables`.
pub const NON_DEBUGGING_TRAILER: &str = "Non-debugging symbols:";

/// `name = value`, split at the first ` = `.
static LOCAL_BINDING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*?) = (.*)$").unwrap());
/// `<line>:<whitespace><declaration>`
static GLOBAL_DECLARATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+):\s+(.*)$").unwrap());
/// `File <path>:` group header.
static FILE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^File (.+):$").unwrap());

/// Marker lines printed by the debugger script around each section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub locals: String,
    pub globals: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            locals: "faultscope:Locals".to_string(),
            globals: "faultscope:Globals".to_string(),
        }
    }
}

/// A local variable and its value exactly as the debugger printed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    pub name: String,
    pub value: String,
}

/// A global variable declaration from `info variables`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSymbol {
    pub declaration: String,
    /// Source line of the declaration.
    pub line: u64,
    /// The `File ...:` group the declaration was listed under.
    pub file: Option<String>,
}

/// Everything scraped from one transcript, in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub locals: Vec<VariableBinding>,
    pub globals: Vec<GlobalSymbol>,
    /// The line that closed the locals section, e.g. `No locals.`.
    pub locals_end: Option<String>,
}

impl Snapshot {
    /// Declarations of the captured globals, in transcript order.
    pub fn global_names(&self) -> impl Iterator<Item = &str> {
        self.globals.iter().map(|global| global.declaration.as_str())
    }
}

/// Forward-only line cursor that remembers the last line it handed out.
struct Cursor<'t> {
    lines: Lines<'t>,
    last: Option<&'t str>,
}

impl<'t> Cursor<'t> {
    fn new(text: &'t str) -> Self {
        Self {
            lines: text.lines(),
            last: None,
        }
    }

    fn advance(&mut self) -> Option<&'t str> {
        let line = self.lines.next()?;
        self.last = Some(line);
        Some(line)
    }

    /// Consume lines up to and including `marker`. False if it never shows.
    fn skip_past(&mut self, marker: &str) -> bool {
        while let Some(line) = self.advance() {
            if line == marker {
                return true;
            }
        }
        false
    }

    fn end_of(&self, section: Section) -> ScopeError {
        ScopeError::UnexpectedEndOfTranscript {
            section,
            last_line: self.last.map(str::to_string),
        }
    }
}

/// Parses transcripts produced by a script using the same [`Markers`].
#[derive(Debug, Clone, Default)]
pub struct TranscriptParser {
    markers: Markers,
}

impl TranscriptParser {
    /// A parser looking for `markers` instead of the defaults.
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }

    /// Markers that open the locals and globals sections.
    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Scrape locals and globals from `transcript`.
    ///
    /// A transcript without the locals marker yields an empty snapshot.
    /// Once the locals marker was seen, the rest of the structure is
    /// mandatory and a truncated transcript is an error.
    pub fn parse(&self, transcript: &str) -> ScopeResult<Snapshot> {
        let mut cursor = Cursor::new(transcript);
        let mut snapshot = Snapshot::default();

        if !cursor.skip_past(&self.markers.locals) {
            warn!("locals marker `{}` not found in transcript", self.markers.locals);
            return Ok(snapshot);
        }

        let closing = loop {
            let line = cursor.advance().ok_or_else(|| cursor.end_of(Section::Locals))?;
            let Some(caps) = LOCAL_BINDING.captures(line) else {
                debug!("locals section closed by {line:?}");
                snapshot.locals_end = Some(line.to_string());
                break line;
            };
            trace!("local {line:?}");
            snapshot.locals.push(VariableBinding {
                name: caps[1].to_string(),
                value: caps[2].to_string(),
            });
        };

        // `info locals` output is usually closed by the globals marker itself.
        if closing != self.markers.globals && !cursor.skip_past(&self.markers.globals) {
            return Err(ScopeError::SentinelNotFound {
                marker: self.markers.globals.clone(),
            });
        }

        let mut file = None;
        loop {
            let line = cursor.advance().ok_or_else(|| cursor.end_of(Section::Globals))?;
            if line == NON_DEBUGGING_TRAILER {
                break;
            }
            if let Some(caps) = FILE_HEADER.captures(line) {
                file = Some(caps[1].to_string());
                continue;
            }
            let Some(caps) = GLOBAL_DECLARATION.captures(line) else {
                trace!("ignoring {line:?}");
                continue;
            };
            let Ok(decl_line) = caps[1].parse() else {
                trace!("ignoring {line:?}: line number out of range");
                continue;
            };
            trace!("global {line:?}");
            snapshot.globals.push(GlobalSymbol {
                declaration: caps[2].to_string(),
                line: decl_line,
                file: file.clone(),
            });
        }

        debug!(
            "scraped {} locals and {} globals",
            snapshot.locals.len(),
            snapshot.globals.len()
        );
        Ok(snapshot)
    }
}
