//! Batch-mode debugger launches and state capture.

use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use log::{debug, error, warn};

use crate::errors::{ScopeError, ScopeResult};
use crate::location::SourceLocation;
use crate::transcript::{Markers, Snapshot, TranscriptParser};

/// Debugger executable used when none is configured.
pub const DEFAULT_DEBUGGER: &str = "gdb";

/// Captured result of one batch run.
#[derive(Debug)]
pub struct BatchOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// A debugger driven non-interactively with a fixed command script.
#[derive(Debug, Clone)]
pub struct Debugger {
    program: PathBuf,
    parser: TranscriptParser,
    program_args: Vec<String>,
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new(DEFAULT_DEBUGGER)
    }
}

impl Debugger {
    /// Drive the debugger executable at `program` (looked up on `PATH`
    /// when it has no directory part).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            parser: TranscriptParser::default(),
            program_args: Vec::new(),
        }
    }

    /// Replace the section markers printed by the script.
    pub fn with_markers(mut self, markers: Markers) -> Self {
        self.parser = TranscriptParser::new(markers);
        self
    }

    /// Arguments handed to the debugged program by the `run` command.
    pub fn with_program_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// The debugger executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The debugger commands, in execution order.
    pub fn script(&self, location: &SourceLocation) -> ScopeResult<Vec<String>> {
        let markers = self.parser.markers();
        let locals = printf_line(&markers.locals)?;
        let globals = printf_line(&markers.globals)?;
        let run = if self.program_args.is_empty() {
            "run".to_string()
        } else {
            format!(
                "run {}",
                shlex::try_join(self.program_args.iter().map(String::as_str))?
            )
        };
        Ok(vec![
            format!("break {location}"),
            run,
            locals,
            "info locals".to_string(),
            globals,
            "info variables".to_string(),
            "delete 1".to_string(),
            "continue".to_string(),
            "quit".to_string(),
        ])
    }

    /// Full argument vector: `-batch`, one `-ex <command>` pair per script
    /// line, then the binary.
    pub fn command_line(
        &self,
        binary: &Path,
        location: &SourceLocation,
    ) -> ScopeResult<Vec<OsString>> {
        let mut args = vec![OsString::from("-batch")];
        for command in self.script(location)? {
            args.push(OsString::from("-ex"));
            args.push(OsString::from(command));
        }
        args.push(binary.as_os_str().to_owned());
        Ok(args)
    }

    /// Run the script against `binary` and wait for the debugger to exit.
    ///
    /// Blocks without a timeout: a breakpoint that is never reached leaves
    /// the debugged program, and therefore this call, running.
    pub fn run(&self, binary: &Path, location: &SourceLocation) -> ScopeResult<BatchOutput> {
        check_readable(binary).map_err(|source| ScopeError::BinaryUnreadable {
            path: binary.to_path_buf(),
            source,
        })?;
        let args = self.command_line(binary, location)?;
        debug!("launching {} {args:?}", self.program.display());

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ScopeError::DebuggerLaunchFailed {
                program: self.program.display().to_string(),
                source,
            })?;
        debug!(
            "debugger exited with {} ({} bytes of output)",
            output.status,
            output.stdout.len()
        );

        Ok(BatchOutput {
            status: output.status,
            stdout: decode("stdout", output.stdout),
            stderr: decode("stderr", output.stderr),
        })
    }

    /// Stop at `location` inside `binary` and scrape locals and globals.
    pub fn capture_state(
        &self,
        binary: impl AsRef<Path>,
        location: &SourceLocation,
    ) -> ScopeResult<Snapshot> {
        let output = self.run(binary.as_ref(), location)?;
        if !output.status.success() {
            if output.stdout.trim().is_empty() {
                return Err(ScopeError::DebuggerExited {
                    status: output.status,
                    stderr: output.stderr.trim().to_string(),
                });
            }
            warn!("debugger exited with {}", output.status);
        }

        self.parser.parse(&output.stdout).inspect_err(|_| {
            if !output.stderr.trim().is_empty() {
                error!("debugger stderr:\n{}", output.stderr.trim_end());
            }
        })
    }
}

/// A gdb `printf` command printing `marker` on a line of its own.
fn printf_line(marker: &str) -> ScopeResult<String> {
    if marker.is_empty() || marker.contains(['\n', '\r']) {
        return Err(ScopeError::InvalidMarker(marker.to_string()));
    }
    let mut command = String::from("printf \"");
    for c in marker.chars() {
        match c {
            '\\' => command.push_str("\\\\"),
            '"' => command.push_str("\\\""),
            '%' => command.push_str("%%"),
            c => command.push(c),
        }
    }
    command.push_str("\\n\"");
    Ok(command)
}

/// Open `binary` for reading and make sure it is a regular file.
fn check_readable(binary: &Path) -> io::Result<()> {
    let file = File::open(binary)?;
    if !file.metadata()?.is_file() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"));
    }
    Ok(())
}

fn decode(stream: &str, bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|err| {
        warn!("debugger {stream} is not valid UTF-8, invalid bytes were replaced");
        String::from_utf8_lossy(err.as_bytes()).into_owned()
    })
}

/// [`Debugger::capture_state`] with the default debugger and markers.
pub fn capture_state(binary: impl AsRef<Path>, location: &SourceLocation) -> ScopeResult<Snapshot> {
    Debugger::default().capture_state(binary, location)
}
