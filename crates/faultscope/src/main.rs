//! Command-line interface for faultscope.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libfaultscope::process::DEFAULT_DEBUGGER;
use libfaultscope::{DebugBinary, Debugger, SourceLocation};
use log::info;

/// Top-level argument parser.
#[derive(Parser, Debug)]
#[command(name = "faultscope", version, about = "Line-table lookups and variable-state capture for compiled binaries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the line-table rows of BINARY that map to FILE:LINE.
    Lines {
        binary: PathBuf,
        file: String,
        line: u64,
    },
    /// Break at LOCATION (file:line) and print locals and globals.
    Capture {
        binary: PathBuf,
        location: SourceLocation,
        /// Debugger executable to drive.
        #[arg(long, default_value = DEFAULT_DEBUGGER)]
        debugger: PathBuf,
        /// Arguments for the debugged program.
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Display version information for diagnostics.
    Version,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Lines { binary, file, line } => list_lines(&binary, &file, line),
        Command::Capture {
            binary,
            location,
            debugger,
            args,
        } => capture(&binary, &location, debugger, args),
        Command::Version => {
            println!("faultscope {}", libfaultscope::version());
            Ok(())
        }
    }
}

fn list_lines(binary: &Path, file: &str, line: u64) -> Result<()> {
    info!("Scanning {} for {file}:{line}", binary.display());
    let binary = DebugBinary::open(binary)?;
    let mut count = 0;
    for entry in binary.find_matches(file, line) {
        let entry = entry.with_context(|| format!("while scanning {}", binary.path().display()))?;
        let path = match &entry.directory {
            Some(dir) => format!("{dir}/{}", entry.file),
            None => entry.file.clone(),
        };
        let column = entry.column.unwrap_or(0);
        println!("{path}:{}:{column} at {:#x}", entry.line, entry.address);
        count += 1;
    }
    info!("{count} matching rows");
    Ok(())
}

fn capture(
    binary: &Path,
    location: &SourceLocation,
    debugger: PathBuf,
    args: Vec<String>,
) -> Result<()> {
    info!("Capturing state of {} at {location}", binary.display());
    let snapshot = Debugger::new(debugger)
        .with_program_args(args)
        .capture_state(binary, location)?;
    for local in &snapshot.locals {
        println!("{} = {}", local.name, local.value);
    }
    for global in &snapshot.globals {
        match &global.file {
            Some(file) => println!("global {} ({file}:{})", global.declaration, global.line),
            None => println!("global {}", global.declaration),
        }
    }
    Ok(())
}
