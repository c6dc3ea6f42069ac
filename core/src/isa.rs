//! Instruction set and program-image format.
//!
//! A program image is a JSON array of addressed records: instruction
//! records `{"opcode", "operand"?, "token"?, "offset"}` and data records
//! `{"word", "offset"}`. The loader places each record at its offset in a
//! flat cell memory; uncovered cells default to the word `0`.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed opcode set. Wire names in the image file are the long symbolic
/// names (`"push"`, `"duplicate"`, `"jump on zero"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    #[serde(rename = "push")]
    Push,
    #[serde(rename = "pop")]
    Pop,
    #[serde(rename = "duplicate")]
    Dup,
    #[serde(rename = "swap")]
    Swap,
    #[serde(rename = "fetch")]
    Fetch,
    #[serde(rename = "store")]
    Store,
    #[serde(rename = "add")]
    Add,
    #[serde(rename = "subtract")]
    Sub,
    #[serde(rename = "multiply")]
    Mul,
    #[serde(rename = "divide")]
    Div,
    #[serde(rename = "modulo")]
    Mod,
    #[serde(rename = "or")]
    Or,
    #[serde(rename = "and")]
    And,
    #[serde(rename = "equal")]
    Equal,
    #[serde(rename = "jump on zero")]
    Jmpz,
    #[serde(rename = "jump")]
    Jmp,
    #[serde(rename = "stash")]
    Stash,
    #[serde(rename = "unstash")]
    Unstash,
    #[serde(rename = "copy stash")]
    Cpstash,
    #[serde(rename = "loop")]
    Loop,
    #[serde(rename = "call")]
    Call,
    #[serde(rename = "return")]
    Ret,
    #[serde(rename = "halt")]
    Halt,
}

impl Opcode {
    /// Mnemonic as shown in journals and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Dup => "DUP",
            Opcode::Swap => "SWAP",
            Opcode::Fetch => "FETCH",
            Opcode::Store => "STORE",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Or => "OR",
            Opcode::And => "AND",
            Opcode::Equal => "EQUAL",
            Opcode::Jmpz => "JMPZ",
            Opcode::Jmp => "JMP",
            Opcode::Stash => "STASH",
            Opcode::Unstash => "UNSTASH",
            Opcode::Cpstash => "CPSTASH",
            Opcode::Loop => "LOOP",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Halt => "HALT",
        }
    }

    /// Whether the opcode carries an operand in its instruction record.
    pub fn has_operand(self) -> bool {
        matches!(
            self,
            Opcode::Push | Opcode::Jmpz | Opcode::Jmp | Opcode::Loop | Opcode::Call
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source location carried along from the translator for journal output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMeta {
    pub val: String,
    pub line: usize,
    pub num: usize,
}

impl fmt::Display for TokenMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'@{}:{}", self.val, self.line, self.num)
    }
}

/// A decoded instruction as it sits in memory and in the IR.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Option<i32>,
    pub token: Option<TokenMeta>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Some(operand) => write!(f, "{} {}", self.opcode, operand),
            None => write!(f, "{}", self.opcode),
        }
    }
}

/// One memory cell: a plain word or an instruction record. Using a cell
/// with the wrong interpretation is a fatal machine fault.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryCell {
    Word(i32),
    Instr(Instruction),
}

impl fmt::Display for MemoryCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryCell::Word(w) => write!(f, "{w}"),
            MemoryCell::Instr(instr) => write!(f, "{instr}"),
        }
    }
}

/// One record of the serialized program image.
///
/// Older images spell an instruction operand as `data`; it is accepted on
/// load and normalized to `operand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRecord {
    Instruction {
        opcode: Opcode,
        #[serde(default, alias = "data", skip_serializing_if = "Option::is_none")]
        operand: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<TokenMeta>,
        offset: i32,
    },
    Data { word: i32, offset: i32 },
}

impl ImageRecord {
    pub fn offset(&self) -> i32 {
        match self {
            ImageRecord::Instruction { offset, .. } | ImageRecord::Data { offset, .. } => *offset,
        }
    }

    pub fn to_cell(&self) -> MemoryCell {
        match self {
            ImageRecord::Instruction {
                opcode,
                operand,
                token,
                ..
            } => MemoryCell::Instr(Instruction {
                opcode: *opcode,
                operand: *operand,
                token: token.clone(),
            }),
            ImageRecord::Data { word, .. } => MemoryCell::Word(*word),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read program image: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed program image: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record offset {0} lies outside memory of {1} cells")]
    OffsetOutOfRange(i32, usize),
}

/// Render the image as a JSON array, one record per line.
pub fn code_to_string(records: &[ImageRecord]) -> String {
    let rows: Vec<String> = records
        .iter()
        .map(|r| serde_json::to_string(r).expect("image records always serialize"))
        .collect();
    format!("[{}]", rows.join(",\n "))
}

/// Write the image to `path` in the one-record-per-line format.
pub fn write_code(path: &Path, records: &[ImageRecord]) -> Result<(), ImageError> {
    std::fs::write(path, code_to_string(records))?;
    Ok(())
}

/// Read an image back from `path`.
pub fn read_code(path: &Path) -> Result<Vec<ImageRecord>, ImageError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Place each record at its offset in a fresh memory of `mem_size` cells.
pub fn load_image(records: &[ImageRecord], mem_size: usize) -> Result<Vec<MemoryCell>, ImageError> {
    let mut mem = vec![MemoryCell::Word(0); mem_size];
    for record in records {
        let offset = record.offset();
        let slot = usize::try_from(offset)
            .ok()
            .filter(|&o| o < mem_size)
            .ok_or(ImageError::OffsetOutOfRange(offset, mem_size))?;
        mem[slot] = record.to_cell();
    }
    Ok(mem)
}
