//! Dual-stack datapath: DS/RS, TOS and ALU registers, N/Z/V flags, IR, PC.
//!
//! The ALU is modeled as an `evaluate(datapath) -> i32` step: a signal
//! carries a pure function over the datapath snapshot, the result is
//! computed in 64 bits, wrap-checked against the signed 32-bit range, and
//! latched together with the flags.

use std::fmt;

use crate::isa::{Instruction, MemoryCell};

use super::error::MachineError;

pub const STACK_CAPACITY: usize = 128;

/// Bounded stack with a single-cell data latch. `pop`/`peek` do not return
/// the value; they expose it through `data()`, the way the hardware's
/// output latch feeds the ALU muxes.
#[derive(Debug, Clone)]
pub struct Stack {
    items: Vec<i32>,
    capacity: usize,
    data: i32,
}

impl Stack {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "stack capacity must be positive");
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
            data: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Last pushed/popped/peeked value.
    pub fn data(&self) -> i32 {
        self.data
    }

    pub fn items(&self) -> &[i32] {
        &self.items
    }

    pub fn push(&mut self, value: i32) -> Result<(), MachineError> {
        if self.items.len() >= self.capacity {
            return Err(MachineError::StackOverflow);
        }
        self.items.push(value);
        self.data = value;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<(), MachineError> {
        self.data = self.items.pop().ok_or(MachineError::StackUnderflow)?;
        Ok(())
    }

    pub fn peek(&mut self) -> Result<(), MachineError> {
        self.data = *self.items.last().ok_or(MachineError::StackUnderflow)?;
        Ok(())
    }
}

/// ALU flag selector for conditional micro-jumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    N,
    Z,
    V,
}

/// TOS input mux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TosSrc {
    Ds,
    Mem,
    Ir,
    Alu,
}

/// PC input mux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcSrc {
    Alu,
    Ir,
    Plus1,
}

/// RS input mux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsSrc {
    Alu,
    Pc,
}

/// A pure ALU computation over the datapath snapshot. Evaluated in 64 bits
/// so 32-bit wrap can be detected explicitly.
pub type AluOp = fn(&Datapath) -> Result<i64, MachineError>;

/// Floor division (quotient rounds toward negative infinity).
pub fn floor_div(a: i64, b: i64) -> Result<i64, MachineError> {
    if b == 0 {
        return Err(MachineError::DivisionByZero);
    }
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// Modulo carrying the sign of the divisor, so that `a == (a div b)*b + (a mod b)`.
pub fn floor_mod(a: i64, b: i64) -> Result<i64, MachineError> {
    if b == 0 {
        return Err(MachineError::DivisionByZero);
    }
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

pub struct Datapath {
    pub ds: Stack,
    pub rs: Stack,
    pub tos: i32,
    pub alu: i32,
    pub n: bool,
    pub z: bool,
    pub v: bool,
    pub ir: Option<Instruction>,
    pub pc: i32,
}

impl Datapath {
    pub fn new(start_adr: i32) -> Self {
        Self {
            ds: Stack::new(STACK_CAPACITY),
            rs: Stack::new(STACK_CAPACITY),
            tos: 0,
            alu: 0,
            n: false,
            z: true,
            v: false,
            ir: None,
            pc: start_adr,
        }
    }

    pub fn flag(&self, flag: Flag) -> bool {
        match flag {
            Flag::N => self.n,
            Flag::Z => self.z,
            Flag::V => self.v,
        }
    }

    /// Evaluate one ALU computation and latch result + flags atomically.
    ///
    /// Overflow is detected by boundary compare against the signed 32-bit
    /// range; on wrap the result is truncated to the low 32 bits and
    /// reinterpreted as signed, with `V` set.
    pub fn alu_evaluate(&mut self, op: AluOp) -> Result<(), MachineError> {
        let wide = op(self)?;
        self.v = wide > i64::from(i32::MAX) || wide < i64::from(i32::MIN);
        let result = wide as i32;
        self.z = result == 0;
        self.n = result < 0;
        self.alu = result;
        Ok(())
    }

    pub fn rs_push(&mut self, src: RsSrc) -> Result<(), MachineError> {
        match src {
            RsSrc::Alu => self.rs.push(self.alu),
            RsSrc::Pc => self.rs.push(self.pc),
        }
    }

    /// Latch TOS from the selected source. Latching an instruction record
    /// out of the memory data latch is a fatal fault.
    pub fn tos_latch(&mut self, src: TosSrc, mem_latch: &MemoryCell) -> Result<(), MachineError> {
        self.tos = match src {
            TosSrc::Ds => self.ds.data(),
            TosSrc::Alu => self.alu,
            TosSrc::Ir => self.ir_operand()?,
            TosSrc::Mem => match mem_latch {
                MemoryCell::Word(w) => *w,
                MemoryCell::Instr(instr) => {
                    return Err(MachineError::InstructionAsData(instr.opcode));
                }
            },
        };
        Ok(())
    }

    pub fn pc_latch(&mut self, src: PcSrc) -> Result<(), MachineError> {
        self.pc = match src {
            PcSrc::Alu => self.alu,
            PcSrc::Ir => self.ir_operand()?,
            PcSrc::Plus1 => self.pc + 1,
        };
        Ok(())
    }

    /// Latch IR from the memory data latch; a data word there is fatal.
    pub fn ir_latch(&mut self, mem_latch: &MemoryCell) -> Result<(), MachineError> {
        match mem_latch {
            MemoryCell::Instr(instr) => {
                self.ir = Some(instr.clone());
                Ok(())
            }
            MemoryCell::Word(w) => Err(MachineError::DataAsInstruction(*w)),
        }
    }

    fn ir_operand(&self) -> Result<i32, MachineError> {
        // An operand-less instruction reaching an IR latch means the image
        // is malformed at the microcode level.
        self.ir
            .as_ref()
            .and_then(|instr| instr.operand)
            .ok_or(MachineError::MicrocodeJumpFail)
    }
}

impl fmt::Display for Datapath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let top = |stack: &Stack| -> Vec<i32> {
            stack.items().iter().rev().take(4).copied().collect()
        };
        writeln!(f, "{:>6} {:5} {:>6} {:5}", "TOS:", self.tos, "ALU:", self.alu)?;
        writeln!(f, "DS (LEN: {}): {:?}...", self.ds.len(), top(&self.ds))?;
        writeln!(f, "RS (LEN: {}): {:?}...", self.rs.len(), top(&self.rs))?;
        match &self.ir {
            Some(instr) => {
                let token = instr
                    .token
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                write!(f, "{:>6} {:5} {:>6} {}\t{}", "PC:", self.pc, "IR:", instr, token)
            }
            None => write!(f, "{:>6} {:5} {:>6} <empty>", "PC:", self.pc, "IR:"),
        }
    }
}
