//! Two-pass assembler for the wren instruction set
//!
//! Pass one runs the line pipeline (comment stripping, label definitions,
//! mnemonic and operand parsing) and sizes every statement so each label's
//! address is known before anything is emitted. Pass two resolves symbolic
//! targets against the completed table and encodes the flat binary image.
//! Labels may therefore be referenced before they are defined; a label that
//! appears nowhere is still an error.
#![warn(missing_docs)]

mod stmt;

use log::debug;
use thiserror::Error;
use wren_isa::{MEMORY_SIZE, PROGRAM_BASE};

use stmt::{parse_stmt, Stmt};

/// Maximum number of labels in one program
pub const MAX_LABELS: usize = 256;

/// Maximum label name length, in characters
pub const MAX_LABEL_LEN: usize = 63;

/// A defined label
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Label {
    /// Upper-cased name
    pub name: String,
    /// Resolved address: the program base plus the output offset at the
    /// definition point
    pub address: u16,
}

/// Assembly failure, tagged with its 1-based source line
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("line {line}: {kind}")]
pub struct AsmError {
    /// 1-based source line of the failure
    pub line: u32,
    /// What went wrong
    pub kind: AsmErrorKind,
}

/// The ways a line can fail to assemble
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AsmErrorKind {
    /// Mnemonic with no assigned encoding
    #[error("unknown instruction '{0}'")]
    UnknownInstruction(String),

    /// Operand where a register name was required
    #[error("invalid register '{0}'")]
    InvalidRegister(String),

    /// Unparseable numeric literal
    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    /// `[` without a closing `]`
    #[error("missing ']' in memory operand")]
    MalformedMemoryOperand,

    /// Reference to a label that is never defined
    #[error("undefined label '{0}'")]
    UndefinedLabel(String),

    /// Second definition of a label name
    #[error("duplicate label '{0}'")]
    DuplicateLabel(String),

    /// More than [`MAX_LABELS`] definitions
    #[error("label table full")]
    LabelTableFull,

    /// Label name longer than [`MAX_LABEL_LEN`] characters
    #[error("label '{0}' is too long")]
    LabelTooLong(String),

    /// `STORE` destination was not a `[addr]` form
    #[error("STORE requires a [addr] destination")]
    BadStoreShape,

    /// Output would exceed the 64 KiB address space
    #[error("program exceeds 64 KiB")]
    ProgramTooLarge,
}

/// Line-oriented assembler producing a flat binary image
pub struct Assembler {
    output: Vec<u8>,
    labels: Vec<Label>,
    current_line: u32,
    has_errors: bool,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    /// Builds an assembler with an empty image and label table
    pub fn new() -> Self {
        Self {
            output: vec![],
            labels: vec![],
            current_line: 0,
            has_errors: false,
        }
    }

    /// Assembles a complete source text
    ///
    /// The first error aborts assembly and leaves the sticky
    /// [`has_errors`](Self::has_errors) flag set; there is no recovery.
    pub fn assemble_source(&mut self, source: &str) -> Result<(), AsmError> {
        self.try_assemble(source).inspect_err(|_| {
            self.has_errors = true;
        })
    }

    fn try_assemble(&mut self, source: &str) -> Result<(), AsmError> {
        // Pass one: parse every line, sizing statements to place labels.
        let mut stmts: Vec<(u32, Stmt)> = vec![];
        let mut size: u32 = 0;
        for (idx, raw) in source.lines().enumerate() {
            self.current_line = idx as u32 + 1;
            let Some(stmt) = self.scan_line(raw, size as u16)? else {
                continue;
            };
            size += u32::from(stmt.size());
            if size > MEMORY_SIZE as u32 {
                return Err(self.error(AsmErrorKind::ProgramTooLarge));
            }
            stmts.push((self.current_line, stmt));
        }

        // Pass two: the label table is complete, lower and emit.
        for (line, stmt) in stmts {
            self.current_line = line;
            let instr = stmt
                .lower(&|name| self.find_label(name))
                .map_err(|kind| self.error(kind))?;
            instr.encode(&mut self.output);
        }
        Ok(())
    }

    /// Handles one raw source line in pass one
    ///
    /// Returns the parsed statement, or `None` for lines that emit nothing
    /// (blank, comment-only, label-only).
    fn scan_line(&mut self, raw: &str, offset: u16) -> Result<Option<Stmt>, AsmError> {
        // Comments run from ';' or '#' to end of line
        let text = raw[..raw.find([';', '#']).unwrap_or(raw.len())].trim();
        if text.is_empty() {
            return Ok(None);
        }

        // Everything before a ':' is a label definition; the rest of the
        // line may still hold a statement
        let text = if let Some((label, rest)) = text.split_once(':') {
            self.define_label(label.trim(), offset)?;
            rest.trim()
        } else {
            text
        };
        if text.is_empty() {
            return Ok(None);
        }

        match parse_stmt(text, self.current_line) {
            Ok(stmt) => Ok(Some(stmt)),
            Err(kind) => Err(self.error(kind)),
        }
    }

    fn define_label(&mut self, name: &str, offset: u16) -> Result<(), AsmError> {
        let name = name.to_ascii_uppercase();
        if name.len() > MAX_LABEL_LEN {
            return Err(self.error(AsmErrorKind::LabelTooLong(name)));
        }
        if self.labels.len() >= MAX_LABELS {
            return Err(self.error(AsmErrorKind::LabelTableFull));
        }
        if self.labels.iter().any(|l| l.name == name) {
            return Err(self.error(AsmErrorKind::DuplicateLabel(name)));
        }
        let address = PROGRAM_BASE.wrapping_add(offset);
        debug!("label {name} at {address:#06X}");
        self.labels.push(Label { name, address });
        Ok(())
    }

    /// Looks up a defined label, case-insensitively
    pub fn find_label(&self, name: &str) -> Option<u16> {
        self.labels
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
            .map(|l| l.address)
    }

    /// Labels in definition order
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// The assembled image so far
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Consumes the assembler, returning the image
    pub fn into_output(self) -> Vec<u8> {
        self.output
    }

    /// True once any line has failed
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    fn error(&self, kind: AsmErrorKind) -> AsmError {
        AsmError {
            line: self.current_line,
            kind,
        }
    }
}

/// Assembles `source` in one shot, returning the flat image
pub fn assemble(source: &str) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new();
    asm.assemble_source(source)?;
    Ok(asm.into_output())
}
