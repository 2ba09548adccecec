//! Hand-assembled DWARF images for tests.
//!
//! Builds `.debug_abbrev`, `.debug_info` and `.debug_line` bytes for DWARF 4
//! and 5 compile units and wraps them in an ELF object. Only the forms the
//! line matcher reads are emitted.

use object::write::Object;
use object::{Architecture, BinaryFormat, Endianness, SectionKind};

const DW_LNS_COPY: u8 = 0x01;
const DW_LNS_ADVANCE_PC: u8 = 0x02;
const DW_LNS_ADVANCE_LINE: u8 = 0x03;
const DW_LNS_SET_FILE: u8 = 0x04;
const DW_LNS_SET_COLUMN: u8 = 0x05;
const DW_LNE_END_SEQUENCE: u8 = 0x01;
const DW_LNE_SET_ADDRESS: u8 = 0x02;

const DW_LNCT_PATH: u64 = 0x1;
const DW_LNCT_DIRECTORY_INDEX: u64 = 0x2;
const DW_FORM_STRING: u64 = 0x08;
const DW_FORM_UDATA: u64 = 0x0f;
const DW_UT_COMPILE: u8 = 0x01;

/// Abbreviation 1: `DW_TAG_compile_unit` with `DW_AT_name` and
/// `DW_AT_comp_dir` as inline strings and `DW_AT_stmt_list` as a section
/// offset. No children.
const ABBREV: &[u8] = &[1, 0x11, 0, 0x03, 0x08, 0x1b, 0x08, 0x10, 0x17, 0, 0, 0];

fn uleb(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn sleb(out: &mut Vec<u8>, mut value: i64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        out.push(if done { byte } else { byte | 0x80 });
        if done {
            return;
        }
    }
}

fn cstr(out: &mut Vec<u8>, text: &[u8]) {
    out.extend_from_slice(text);
    out.push(0);
}

fn with_length(body: Vec<u8>) -> Vec<u8> {
    let mut out = (body.len() as u32).to_le_bytes().to_vec();
    out.extend(body);
    out
}

/// Line-number program opcodes.
#[derive(Debug, Default, Clone)]
pub struct Ops(Vec<u8>);

impl Ops {
    pub fn set_address(&mut self, address: u64) -> &mut Self {
        self.0.extend([0, 9, DW_LNE_SET_ADDRESS]);
        self.0.extend(address.to_le_bytes());
        self
    }

    pub fn advance_pc(&mut self, delta: u64) -> &mut Self {
        self.0.push(DW_LNS_ADVANCE_PC);
        uleb(&mut self.0, delta);
        self
    }

    pub fn advance_line(&mut self, delta: i64) -> &mut Self {
        self.0.push(DW_LNS_ADVANCE_LINE);
        sleb(&mut self.0, delta);
        self
    }

    pub fn set_file(&mut self, index: u64) -> &mut Self {
        self.0.push(DW_LNS_SET_FILE);
        uleb(&mut self.0, index);
        self
    }

    pub fn set_column(&mut self, column: u64) -> &mut Self {
        self.0.push(DW_LNS_SET_COLUMN);
        uleb(&mut self.0, column);
        self
    }

    /// Emit a row.
    pub fn copy(&mut self) -> &mut Self {
        self.0.push(DW_LNS_COPY);
        self
    }

    pub fn end_sequence(&mut self) -> &mut Self {
        self.0.extend([0, 1, DW_LNE_END_SEQUENCE]);
        self
    }
}

/// One compile unit and its line program.
#[derive(Debug, Clone)]
pub struct CompileUnit {
    pub version: u16,
    pub name: Vec<u8>,
    pub comp_dir: Vec<u8>,
    /// Directory table as stored in the header. For DWARF 4 this excludes
    /// the compilation directory; for DWARF 5 entry 0 is the compilation
    /// directory.
    pub directories: Vec<Vec<u8>>,
    /// `(name, directory index)` pairs.
    pub files: Vec<(Vec<u8>, u64)>,
    pub ops: Ops,
}

impl CompileUnit {
    fn debug_info(&self, stmt_list: u32) -> Vec<u8> {
        let mut body = self.version.to_le_bytes().to_vec();
        if self.version >= 5 {
            body.extend([DW_UT_COMPILE, 8]);
            body.extend(0u32.to_le_bytes());
        } else {
            body.extend(0u32.to_le_bytes());
            body.push(8);
        }
        body.push(1);
        cstr(&mut body, &self.name);
        cstr(&mut body, &self.comp_dir);
        body.extend(stmt_list.to_le_bytes());
        with_length(body)
    }

    fn debug_line(&self) -> Vec<u8> {
        // min_inst_length, max_ops, default_is_stmt, line_base, line_range,
        // opcode_base, standard_opcode_lengths
        let mut header = vec![1, 1, 1, (-5i8) as u8, 14, 13];
        header.extend([0, 1, 1, 1, 1, 0, 0, 0, 1, 0, 0, 1]);
        if self.version >= 5 {
            header.push(1);
            uleb(&mut header, DW_LNCT_PATH);
            uleb(&mut header, DW_FORM_STRING);
            uleb(&mut header, self.directories.len() as u64);
            for dir in &self.directories {
                cstr(&mut header, dir);
            }
            header.push(2);
            uleb(&mut header, DW_LNCT_PATH);
            uleb(&mut header, DW_FORM_STRING);
            uleb(&mut header, DW_LNCT_DIRECTORY_INDEX);
            uleb(&mut header, DW_FORM_UDATA);
            uleb(&mut header, self.files.len() as u64);
            for (name, dir) in &self.files {
                cstr(&mut header, name);
                uleb(&mut header, *dir);
            }
        } else {
            for dir in &self.directories {
                cstr(&mut header, dir);
            }
            header.push(0);
            for (name, dir) in &self.files {
                cstr(&mut header, name);
                uleb(&mut header, *dir);
                uleb(&mut header, 0);
                uleb(&mut header, 0);
            }
            header.push(0);
        }

        let mut body = self.version.to_le_bytes().to_vec();
        if self.version >= 5 {
            body.extend([8, 0]);
        }
        body.extend((header.len() as u32).to_le_bytes());
        body.extend(header);
        body.extend_from_slice(&self.ops.0);
        with_length(body)
    }
}

/// An x86-64 ELF relocatable with a `.text` byte and the given sections.
pub fn elf(sections: &[(&str, &[u8])]) -> Vec<u8> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let text = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.append_section_data(text, &[0xc3], 1);
    for (name, data) in sections {
        let id = obj.add_section(Vec::new(), name.as_bytes().to_vec(), SectionKind::Debug);
        obj.append_section_data(id, data, 1);
    }
    obj.write().unwrap()
}

/// An ELF image whose DWARF describes `units`, in order.
pub fn dwarf_elf(units: &[CompileUnit]) -> Vec<u8> {
    let mut info = Vec::new();
    let mut line = Vec::new();
    for unit in units {
        info.extend(unit.debug_info(line.len() as u32));
        line.extend(unit.debug_line());
    }
    elf(&[
        (".debug_abbrev", ABBREV),
        (".debug_info", &info[..]),
        (".debug_line", &line[..]),
    ])
}

/// A `test.c` unit compiled in `/src` that also includes `inc/util.h`.
///
/// Rows, in order: `test.c:10:5` at 0x1000, `util.h:10:5` at 0x1004,
/// `test.c:11:5` at 0x1008, `test.c:10` (left edge) at 0x100c, and an
/// end-of-sequence row on `test.c:10` at 0x1010.
pub fn sample_unit(version: u16) -> CompileUnit {
    // DWARF 5 numbers files from 0, earlier versions from 1.
    let (directories, test_c, util_h) = if version >= 5 {
        (vec![b"/src".to_vec(), b"inc".to_vec()], 0, 1)
    } else {
        (vec![b"inc".to_vec()], 1, 2)
    };
    let mut ops = Ops::default();
    ops.set_address(0x1000)
        .set_file(test_c)
        .advance_line(9)
        .set_column(5)
        .copy()
        .advance_pc(4)
        .set_file(util_h)
        .copy()
        .advance_pc(4)
        .set_file(test_c)
        .advance_line(1)
        .copy()
        .advance_pc(4)
        .advance_line(-1)
        .set_column(0)
        .copy()
        .advance_pc(4)
        .end_sequence();

    CompileUnit {
        version,
        name: b"test.c".to_vec(),
        comp_dir: b"/src".to_vec(),
        directories,
        files: vec![(b"test.c".to_vec(), 0), (b"util.h".to_vec(), 1)],
        ops,
    }
}
