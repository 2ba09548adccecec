//! Line-program matching: find the rows of every compilation unit's
//! line-number program that map to a given `(file, line)` pair.
//!
//! The matcher is written against two small traits so it does not care
//! where decoded rows come from. [`crate::dwarf`] implements them on top of
//! `gimli`.

use log::{debug, trace};

use crate::errors::{ScopeError, ScopeResult};

/// Machine state of a line-program row, as decoded by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowState {
    pub address: u64,
    /// Index into the program's file table, in the numbering of the
    /// program's DWARF version.
    pub file_index: u64,
    /// `None` when the row is not attributable to any source line.
    pub line: Option<u64>,
    pub column: Option<u64>,
    pub is_stmt: bool,
    pub end_sequence: bool,
}

/// One decoded step of a line-number program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStep {
    /// Housekeeping directive that does not produce a row.
    Directive,
    Row(RowState),
}

/// A file-table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub directory: Option<String>,
}

/// The line-number program owned by one compilation unit.
pub trait ProgramSteps {
    /// Next step in program order, `None` once the program is exhausted.
    fn next_step(&mut self) -> ScopeResult<Option<ProgramStep>>;

    /// Resolve a row's file index against the program's file table.
    fn file(&self, index: u64) -> ScopeResult<Option<SourceFile>>;
}

/// Iterates the line programs of a binary, one per compilation unit.
pub trait LineSource {
    type Program: ProgramSteps;

    /// Next unit's program, `None` once every unit was visited. Units
    /// without a line program are skipped by the implementation.
    fn next_program(&mut self) -> ScopeResult<Option<Self::Program>>;
}

/// A row matching the requested `(file, line)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub file: String,
    pub directory: Option<String>,
    pub line: u64,
    pub column: Option<u64>,
    pub address: u64,
    pub is_stmt: bool,
    pub end_sequence: bool,
}

/// Lazy iterator over every matching row of every unit.
///
/// There is no deduplication and no early exit: all units and all rows are
/// visited. After the first error the iterator is fused.
pub struct LineMatches<S: LineSource> {
    source: S,
    program: Option<S::Program>,
    file: String,
    line: u64,
    done: bool,
}

impl<S: LineSource> LineMatches<S> {
    pub fn new(source: S, file: impl Into<String>, line: u64) -> Self {
        Self {
            source,
            program: None,
            file: file.into(),
            line,
            done: false,
        }
    }

    fn advance(&mut self) -> ScopeResult<Option<LineEntry>> {
        loop {
            let Some(program) = self.program.as_mut() else {
                match self.source.next_program()? {
                    Some(program) => {
                        debug!("entering next line program");
                        self.program = Some(program);
                        continue;
                    }
                    None => return Ok(None),
                }
            };

            let state = match program.next_step()? {
                None => {
                    self.program = None;
                    continue;
                }
                Some(ProgramStep::Directive) => continue,
                Some(ProgramStep::Row(state)) => state,
            };
            if state.end_sequence || state.line != Some(self.line) {
                continue;
            }

            let file = program
                .file(state.file_index)?
                .ok_or(ScopeError::UnknownFileIndex {
                    index: state.file_index,
                })?;
            trace!("row {:#x} -> {}:{}", state.address, file.name, self.line);
            if file.name == self.file {
                return Ok(Some(LineEntry {
                    file: file.name,
                    directory: file.directory,
                    line: self.line,
                    column: state.column,
                    address: state.address,
                    is_stmt: state.is_stmt,
                    end_sequence: false,
                }));
            }
        }
    }
}

impl<S: LineSource> Iterator for LineMatches<S> {
    type Item = ScopeResult<LineEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct FakeProgram {
        files: Vec<&'static str>,
        steps: VecDeque<ScopeResult<ProgramStep>>,
    }

    impl ProgramSteps for FakeProgram {
        fn next_step(&mut self) -> ScopeResult<Option<ProgramStep>> {
            self.steps.pop_front().transpose()
        }

        fn file(&self, index: u64) -> ScopeResult<Option<SourceFile>> {
            // 1-based, like DWARF 2-4 file tables.
            let Some(slot) = index.checked_sub(1) else {
                return Ok(None);
            };
            Ok(self.files.get(slot as usize).map(|name| SourceFile {
                name: (*name).to_string(),
                directory: Some("/src".to_string()),
            }))
        }
    }

    struct FakeSource(VecDeque<FakeProgram>);

    impl LineSource for FakeSource {
        type Program = FakeProgram;

        fn next_program(&mut self) -> ScopeResult<Option<FakeProgram>> {
            Ok(self.0.pop_front())
        }
    }

    fn row(address: u64, file_index: u64, line: u64) -> ScopeResult<ProgramStep> {
        Ok(ProgramStep::Row(RowState {
            address,
            file_index,
            line: Some(line),
            column: None,
            is_stmt: true,
            end_sequence: false,
        }))
    }

    fn end(address: u64, file_index: u64, line: u64) -> ScopeResult<ProgramStep> {
        Ok(ProgramStep::Row(RowState {
            address,
            file_index,
            line: Some(line),
            column: None,
            is_stmt: false,
            end_sequence: true,
        }))
    }

    fn program(files: &[&'static str], steps: Vec<ScopeResult<ProgramStep>>) -> FakeProgram {
        FakeProgram {
            files: files.to_vec(),
            steps: steps.into(),
        }
    }

    fn addresses(source: FakeSource, file: &str, line: u64) -> Vec<u64> {
        LineMatches::new(source, file, line)
            .map(|entry| entry.unwrap().address)
            .collect()
    }

    #[test]
    fn end_sequence_rows_are_never_emitted() {
        let source = FakeSource(
            vec![program(
                &["test.c"],
                vec![row(0x10, 1, 10), end(0x20, 1, 10)],
            )]
            .into(),
        );
        assert_eq!(addresses(source, "test.c", 10), vec![0x10]);
    }

    #[test]
    fn directives_are_skipped() {
        let source = FakeSource(
            vec![program(
                &["test.c"],
                vec![
                    Ok(ProgramStep::Directive),
                    row(0x10, 1, 10),
                    Ok(ProgramStep::Directive),
                ],
            )]
            .into(),
        );
        assert_eq!(addresses(source, "test.c", 10), vec![0x10]);
    }

    #[test]
    fn matches_in_every_unit_are_kept() {
        let source = FakeSource(
            vec![
                program(&["test.c"], vec![row(0x10, 1, 10), end(0x18, 1, 11)]),
                program(&["other.c", "test.c"], vec![row(0x40, 2, 10), end(0x48, 2, 10)]),
            ]
            .into(),
        );
        assert_eq!(addresses(source, "test.c", 10), vec![0x10, 0x40]);
    }

    #[test]
    fn every_row_of_a_line_is_reported() {
        let source = FakeSource(
            vec![program(
                &["test.c"],
                vec![row(0x10, 1, 10), row(0x14, 1, 11), row(0x1c, 1, 10), end(0x20, 1, 10)],
            )]
            .into(),
        );
        assert_eq!(addresses(source, "test.c", 10), vec![0x10, 0x1c]);
    }

    #[test]
    fn file_and_line_must_both_match() {
        let source = FakeSource(
            vec![program(
                &["test.c", "util.h"],
                vec![row(0x10, 2, 10), row(0x14, 1, 9), row(0x18, 1, 10)],
            )]
            .into(),
        );
        let entries: Vec<_> = LineMatches::new(source, "test.c", 10)
            .collect::<ScopeResult<_>>()
            .unwrap();
        assert_eq!(
            entries,
            vec![LineEntry {
                file: "test.c".to_string(),
                directory: Some("/src".to_string()),
                line: 10,
                column: None,
                address: 0x18,
                is_stmt: true,
                end_sequence: false,
            }]
        );
    }

    #[test]
    fn rows_without_a_line_never_match() {
        let source = FakeSource(
            vec![program(
                &["test.c"],
                vec![Ok(ProgramStep::Row(RowState {
                    address: 0x10,
                    file_index: 1,
                    line: None,
                    column: None,
                    is_stmt: true,
                    end_sequence: false,
                }))],
            )]
            .into(),
        );
        assert!(addresses(source, "test.c", 10).is_empty());
    }

    #[test]
    fn repeated_scans_agree() {
        let units = || {
            FakeSource(
                vec![
                    program(&["test.c"], vec![row(0x10, 1, 10), row(0x30, 1, 10)]),
                    program(&["test.c"], vec![row(0x50, 1, 10)]),
                ]
                .into(),
            )
        };
        let first = addresses(units(), "test.c", 10);
        let second = addresses(units(), "test.c", 10);
        assert_eq!(first, vec![0x10, 0x30, 0x50]);
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_file_index_is_an_error() {
        let source = FakeSource(vec![program(&["test.c"], vec![row(0x10, 7, 10)])].into());
        let mut matches = LineMatches::new(source, "test.c", 10);
        assert!(matches!(
            matches.next(),
            Some(Err(ScopeError::UnknownFileIndex { index: 7 }))
        ));
        assert!(matches.next().is_none());
    }

    #[test]
    fn decode_errors_fuse_the_iterator() {
        let source = FakeSource(
            vec![
                program(
                    &["test.c"],
                    vec![row(0x10, 1, 10), Err(gimli::Error::BadUtf8.into())],
                ),
                program(&["test.c"], vec![row(0x40, 1, 10)]),
            ]
            .into(),
        );
        let results: Vec<_> = LineMatches::new(source, "test.c", 10).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Ok(LineEntry { address: 0x10, .. })));
        assert!(matches!(results[1], Err(ScopeError::Dwarf(_))));
    }

    #[test]
    fn no_units_means_no_matches() {
        assert!(addresses(FakeSource(VecDeque::new()), "test.c", 10).is_empty());
    }
}
