//! DWARF access for the line matcher, backed by `object` and `gimli`.

use std::borrow::Cow;
use std::fs;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gimli::{
    AttributeValue, ColumnType, DebugInfoUnitHeadersIter, Dwarf, EndianArcSlice,
    IncompleteLineProgram, LineRows, Reader, RunTimeEndian, SectionId, Unit,
};
use log::debug;
use object::{Object, ObjectSection};

use crate::errors::{ScopeError, ScopeResult};
use crate::lines::{LineMatches, LineSource, ProgramStep, ProgramSteps, RowState, SourceFile};

type ArcReader = EndianArcSlice<RunTimeEndian>;

/// An object file whose DWARF sections have been loaded into memory.
///
/// The file itself is only held open while it is read; the section data
/// stays alive for as long as any iterator created from this handle does.
pub struct DebugBinary {
    path: PathBuf,
    dwarf: Arc<Dwarf<ArcReader>>,
}

impl DebugBinary {
    /// Read and parse the binary at `path`.
    pub fn open(path: impl AsRef<Path>) -> ScopeResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ScopeError::BinaryUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &bytes)
    }

    /// Parse an in-memory object file. `path` is only used in errors.
    pub fn parse(path: impl AsRef<Path>, bytes: &[u8]) -> ScopeResult<Self> {
        let path = path.as_ref();
        let object_error = |source| ScopeError::ObjectFormat {
            path: path.to_path_buf(),
            source,
        };
        let file = object::File::parse(bytes).map_err(object_error)?;
        if file.section_by_name(SectionId::DebugInfo.name()).is_none() {
            return Err(ScopeError::MissingDebugInfo {
                path: path.to_path_buf(),
            });
        }

        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };
        let dwarf = Dwarf::load(|id: SectionId| -> ScopeResult<ArcReader> {
            let data = match file.section_by_name(id.name()) {
                Some(section) => match section.uncompressed_data().map_err(object_error)? {
                    Cow::Borrowed(data) => Arc::<[u8]>::from(data),
                    Cow::Owned(vec) => vec.into(),
                },
                None => Arc::<[u8]>::from(Vec::new()),
            };
            Ok(EndianArcSlice::new(data, endian))
        })?;
        debug!("loaded DWARF sections of {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            dwarf: Arc::new(dwarf),
        })
    }

    /// Path the binary was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line programs of every compilation unit, in `.debug_info` order.
    pub fn line_programs(&self) -> DwarfLines {
        DwarfLines {
            dwarf: Arc::clone(&self.dwarf),
            units: self.dwarf.units(),
        }
    }

    /// Lazily scan every unit for rows at `file:line`.
    pub fn find_matches(&self, file: impl Into<String>, line: u64) -> LineMatches<DwarfLines> {
        LineMatches::new(self.line_programs(), file, line)
    }
}

/// Open `path` and lazily scan it for rows at `file:line`.
///
/// Opening errors are reported up front; decoding errors surface through
/// the returned iterator.
pub fn find_matches(
    path: impl AsRef<Path>,
    file: impl Into<String>,
    line: u64,
) -> ScopeResult<LineMatches<DwarfLines>> {
    Ok(DebugBinary::open(path)?.find_matches(file, line))
}

/// [`LineSource`] over the units of a loaded binary.
pub struct DwarfLines {
    dwarf: Arc<Dwarf<ArcReader>>,
    units: DebugInfoUnitHeadersIter<ArcReader>,
}

impl LineSource for DwarfLines {
    type Program = DwarfProgram;

    fn next_program(&mut self) -> ScopeResult<Option<DwarfProgram>> {
        while let Some(header) = self.units.next()? {
            let unit = self.dwarf.unit(header)?;
            let Some(program) = unit.line_program.clone() else {
                debug!("skipping unit without a line program");
                continue;
            };
            return Ok(Some(DwarfProgram {
                dwarf: Arc::clone(&self.dwarf),
                rows: program.rows(),
                unit,
            }));
        }
        Ok(None)
    }
}

/// Row iterator over one unit's line program.
///
/// `gimli` executes the opcodes itself and only hands out emitted rows, so
/// this never yields [`ProgramStep::Directive`].
pub struct DwarfProgram {
    dwarf: Arc<Dwarf<ArcReader>>,
    unit: Unit<ArcReader>,
    rows: LineRows<ArcReader, IncompleteLineProgram<ArcReader>>,
}

impl DwarfProgram {
    fn text(&self, value: AttributeValue<ArcReader>) -> ScopeResult<String> {
        let raw = self.dwarf.attr_string(&self.unit, value)?;
        Ok(Reader::to_string(&raw)?.into_owned())
    }
}

impl ProgramSteps for DwarfProgram {
    fn next_step(&mut self) -> ScopeResult<Option<ProgramStep>> {
        let Some((_, row)) = self.rows.next_row()? else {
            return Ok(None);
        };
        let column = match row.column() {
            ColumnType::LeftEdge => None,
            ColumnType::Column(column) => Some(column.get()),
        };
        Ok(Some(ProgramStep::Row(RowState {
            address: row.address(),
            file_index: row.file_index(),
            line: row.line().map(NonZeroU64::get),
            column,
            is_stmt: row.is_stmt(),
            end_sequence: row.end_sequence(),
        })))
    }

    fn file(&self, index: u64) -> ScopeResult<Option<SourceFile>> {
        let header = self.rows.header();
        let Some(entry) = header.file(index) else {
            return Ok(None);
        };
        let name = self.text(entry.path_name())?;
        let directory = entry
            .directory(header)
            .map(|dir| self.text(dir))
            .transpose()?;
        Ok(Some(SourceFile { name, directory }))
    }
}
