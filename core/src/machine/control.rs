//! Microprogrammed control unit.
//!
//! The microprogram is a fixed 64-row table: rows 0-2 implement
//! instruction fetch/decode, then one contiguous block per opcode. The
//! row addresses are load-bearing — `Dispatch` and every `Jump` point
//! straight into the table (JMPZ deliberately falls through into the JMP
//! block at row 41 for its taken path).

use std::fmt;

use log::{debug, info, warn};

use crate::isa::Opcode;

use super::datapath::{AluOp, Datapath, Flag, PcSrc, RsSrc, TosSrc, floor_div, floor_mod};
use super::error::MachineError;
use super::memory::{ArSrc, MemoryUnit};

/// Conditional or unconditional micro-jump.
#[derive(Debug, Clone, Copy)]
pub struct MicroJump {
    pub target: usize,
    pub uncond: bool,
    pub flag: Flag,
    pub expected: bool,
}

/// One control signal. Signals within a row never both define and use the
/// same latch output; they are applied in listed order.
#[derive(Clone, Copy)]
pub enum Signal {
    Alu(AluOp),
    DsPush,
    DsPop,
    DsPeek,
    RsPop,
    RsPeek,
    RsPush(RsSrc),
    TosLatch(TosSrc),
    PcLatch(PcSrc),
    ArLatch(ArSrc),
    IrLatch,
    MemRead,
    MemWrite,
    Halt,
    Dispatch,
    Jump(MicroJump),
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The journal prints micro-rows; an ALU op is a function pointer,
        // so it gets a stable name instead of an address.
        match self {
            Signal::Alu(_) => write!(f, "ALUOp"),
            Signal::DsPush => write!(f, "DSPush"),
            Signal::DsPop => write!(f, "DSPop"),
            Signal::DsPeek => write!(f, "DSPeek"),
            Signal::RsPop => write!(f, "RSPop"),
            Signal::RsPeek => write!(f, "RSPeek"),
            Signal::RsPush(src) => write!(f, "RSPush.{src:?}"),
            Signal::TosLatch(src) => write!(f, "TOSLatch.{src:?}"),
            Signal::PcLatch(src) => write!(f, "PCLatch.{src:?}"),
            Signal::ArLatch(src) => write!(f, "ARLatch.{src:?}"),
            Signal::IrLatch => write!(f, "IRLatch"),
            Signal::MemRead => write!(f, "MemRD"),
            Signal::MemWrite => write!(f, "MemWR"),
            Signal::Halt => write!(f, "Halt"),
            Signal::Dispatch => write!(f, "mPCLatch.IR"),
            Signal::Jump(j) => {
                write!(f, "mPCJump({}, {}, {:?}={})", j.target, j.uncond, j.flag, j.expected)
            }
        }
    }
}

const fn jmp0() -> Signal {
    Signal::Jump(MicroJump {
        target: 0,
        uncond: true,
        flag: Flag::Z,
        expected: false,
    })
}

const fn jz(target: usize, expected: bool) -> Signal {
    Signal::Jump(MicroJump {
        target,
        uncond: false,
        flag: Flag::Z,
        expected,
    })
}

pub type MicroInstr = &'static [Signal];

pub static MICROPROGRAM: [MicroInstr; 64] = [
    // 0-2: instruction fetch
    &[Signal::ArLatch(ArSrc::Pc), Signal::MemRead],
    &[Signal::IrLatch, Signal::PcLatch(PcSrc::Plus1)],
    &[Signal::Dispatch],
    // 3-4: PUSH
    &[
        Signal::Alu(|dp| Ok(dp.tos as i64)),
        Signal::DsPush,
        Signal::TosLatch(TosSrc::Ir),
    ],
    &[jmp0()],
    // 5-6: POP
    &[Signal::DsPop, Signal::TosLatch(TosSrc::Ds)],
    &[jmp0()],
    // 7-8: DUP
    &[Signal::Alu(|dp| Ok(dp.tos as i64)), Signal::DsPush],
    &[jmp0()],
    // 9-11: SWAP
    &[
        Signal::Alu(|dp| Ok(dp.tos as i64)),
        Signal::RsPush(RsSrc::Alu),
        Signal::DsPop,
        Signal::TosLatch(TosSrc::Ds),
    ],
    &[
        Signal::RsPop,
        Signal::Alu(|dp| Ok(dp.rs.data() as i64)),
        Signal::DsPush,
    ],
    &[jmp0()],
    // 12-14: FETCH
    &[
        Signal::Alu(|dp| Ok(dp.tos as i64)),
        Signal::ArLatch(ArSrc::Alu),
        Signal::MemRead,
    ],
    &[Signal::TosLatch(TosSrc::Mem)],
    &[jmp0()],
    // 15-18: STORE
    &[Signal::Alu(|dp| Ok(dp.tos as i64)), Signal::ArLatch(ArSrc::Alu)],
    &[
        Signal::DsPop,
        Signal::Alu(|dp| Ok(dp.ds.data() as i64)),
        Signal::MemWrite,
    ],
    &[Signal::DsPop, Signal::TosLatch(TosSrc::Ds)],
    &[jmp0()],
    // 19-20: ADD
    &[
        Signal::DsPop,
        Signal::Alu(|dp| Ok(dp.ds.data() as i64 + dp.tos as i64)),
        Signal::TosLatch(TosSrc::Alu),
    ],
    &[jmp0()],
    // 21-22: SUB
    &[
        Signal::DsPop,
        Signal::Alu(|dp| Ok(dp.ds.data() as i64 - dp.tos as i64)),
        Signal::TosLatch(TosSrc::Alu),
    ],
    &[jmp0()],
    // 23-24: MUL
    &[
        Signal::DsPop,
        Signal::Alu(|dp| Ok(dp.ds.data() as i64 * dp.tos as i64)),
        Signal::TosLatch(TosSrc::Alu),
    ],
    &[jmp0()],
    // 25-26: DIV
    &[
        Signal::DsPop,
        Signal::Alu(|dp| floor_div(dp.ds.data() as i64, dp.tos as i64)),
        Signal::TosLatch(TosSrc::Alu),
    ],
    &[jmp0()],
    // 27-28: MOD
    &[
        Signal::DsPop,
        Signal::Alu(|dp| floor_mod(dp.ds.data() as i64, dp.tos as i64)),
        Signal::TosLatch(TosSrc::Alu),
    ],
    &[jmp0()],
    // 29-30: OR
    &[
        Signal::DsPop,
        Signal::Alu(|dp| Ok((dp.ds.data() | dp.tos) as i64)),
        Signal::TosLatch(TosSrc::Alu),
    ],
    &[jmp0()],
    // 31-32: AND
    &[
        Signal::DsPop,
        Signal::Alu(|dp| Ok((dp.ds.data() & dp.tos) as i64)),
        Signal::TosLatch(TosSrc::Alu),
    ],
    &[jmp0()],
    // 33-38: EQUAL
    &[
        Signal::DsPop,
        Signal::Alu(|dp| Ok(dp.ds.data() as i64 - dp.tos as i64)),
    ],
    &[jz(37, true)],
    &[Signal::Alu(|_| Ok(0)), Signal::TosLatch(TosSrc::Alu)],
    &[jmp0()],
    &[Signal::Alu(|_| Ok(1)), Signal::TosLatch(TosSrc::Alu)],
    &[jmp0()],
    // 39-40: JMPZ (taken path falls through into the JMP block)
    &[
        Signal::Alu(|dp| Ok(dp.tos as i64)),
        Signal::DsPop,
        Signal::TosLatch(TosSrc::Ds),
    ],
    &[jz(42, false)],
    // 41-42: JMP
    &[Signal::PcLatch(PcSrc::Ir)],
    &[jmp0()],
    // 43-44: STASH
    &[
        Signal::Alu(|dp| Ok(dp.tos as i64)),
        Signal::RsPush(RsSrc::Alu),
        Signal::DsPop,
        Signal::TosLatch(TosSrc::Ds),
    ],
    &[jmp0()],
    // 45-47: UNSTASH
    &[Signal::Alu(|dp| Ok(dp.tos as i64)), Signal::DsPush],
    &[
        Signal::RsPop,
        Signal::Alu(|dp| Ok(dp.rs.data() as i64)),
        Signal::TosLatch(TosSrc::Alu),
    ],
    &[jmp0()],
    // 48-50: CPSTASH
    &[Signal::Alu(|dp| Ok(dp.tos as i64)), Signal::DsPush],
    &[
        Signal::RsPeek,
        Signal::Alu(|dp| Ok(dp.rs.data() as i64)),
        Signal::TosLatch(TosSrc::Alu),
    ],
    &[jmp0()],
    // 51-58: LOOP
    &[Signal::Alu(|dp| Ok(dp.tos as i64)), Signal::DsPush],
    &[
        Signal::RsPop,
        Signal::Alu(|dp| Ok(dp.rs.data() as i64)),
        Signal::TosLatch(TosSrc::Alu),
    ],
    &[
        Signal::RsPeek,
        Signal::Alu(|dp| Ok(dp.tos as i64 - dp.rs.data() as i64)),
    ],
    &[jz(57, false)],
    &[Signal::RsPop, Signal::DsPop, Signal::TosLatch(TosSrc::Ds)],
    &[jmp0()],
    // Counter goes back up and the body restarts from IR's operand in the
    // same row; keep the fused form.
    &[
        Signal::Alu(|dp| Ok(dp.tos as i64 + 1)),
        Signal::RsPush(RsSrc::Alu),
        Signal::PcLatch(PcSrc::Ir),
        Signal::DsPop,
        Signal::TosLatch(TosSrc::Ds),
    ],
    &[jmp0()],
    // 59-60: CALL
    &[Signal::RsPush(RsSrc::Pc), Signal::PcLatch(PcSrc::Ir)],
    &[jmp0()],
    // 61-62: RET
    &[
        Signal::RsPop,
        Signal::Alu(|dp| Ok(dp.rs.data() as i64)),
        Signal::PcLatch(PcSrc::Alu),
    ],
    &[jmp0()],
    // 63: HALT
    &[Signal::Halt],
];

/// Per-opcode entry points into `MICROPROGRAM`.
pub fn dispatch(opcode: Opcode) -> usize {
    match opcode {
        Opcode::Push => 3,
        Opcode::Pop => 5,
        Opcode::Dup => 7,
        Opcode::Swap => 9,
        Opcode::Fetch => 12,
        Opcode::Store => 15,
        Opcode::Add => 19,
        Opcode::Sub => 21,
        Opcode::Mul => 23,
        Opcode::Div => 25,
        Opcode::Mod => 27,
        Opcode::Or => 29,
        Opcode::And => 31,
        Opcode::Equal => 33,
        Opcode::Jmpz => 39,
        Opcode::Jmp => 41,
        Opcode::Stash => 43,
        Opcode::Unstash => 45,
        Opcode::Cpstash => 48,
        Opcode::Loop => 51,
        Opcode::Call => 59,
        Opcode::Ret => 61,
        Opcode::Halt => 63,
    }
}

/// How a run came to rest. All three are ordinary terminations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Halted,
    InputExhausted,
    TickLimit,
}

/// Result of a completed simulation.
#[derive(Debug, Clone)]
pub struct Run {
    pub output: String,
    pub output_raw: Vec<i32>,
    pub ticks: u64,
    pub outcome: Outcome,
    pub cache_requests: u64,
    pub cache_hits: u64,
}

impl Run {
    pub fn miss_rate(&self) -> f64 {
        if self.cache_requests == 0 {
            0.0
        } else {
            (self.cache_requests - self.cache_hits) as f64 / self.cache_requests as f64
        }
    }
}

pub struct ControlUnit {
    pub dp: Datapath,
    pub mem: MemoryUnit,
    pub mpc: usize,
    pub ticks: u64,
}

impl ControlUnit {
    pub fn new(dp: Datapath, mem: MemoryUnit) -> Self {
        Self {
            dp,
            mem,
            mpc: 0,
            ticks: 0,
        }
    }

    fn apply_signal(&mut self, signal: &Signal) -> Result<(), MachineError> {
        match *signal {
            Signal::Alu(op) => self.dp.alu_evaluate(op),
            Signal::DsPush => self.dp.ds.push(self.dp.alu),
            Signal::DsPop => self.dp.ds.pop(),
            Signal::DsPeek => self.dp.ds.peek(),
            Signal::RsPop => self.dp.rs.pop(),
            Signal::RsPeek => self.dp.rs.peek(),
            Signal::RsPush(src) => self.dp.rs_push(src),
            Signal::TosLatch(src) => self.dp.tos_latch(src, self.mem.data()),
            Signal::PcLatch(src) => self.dp.pc_latch(src),
            Signal::ArLatch(ArSrc::Pc) => {
                self.mem.ar = self.dp.pc;
                Ok(())
            }
            Signal::ArLatch(ArSrc::Alu) => {
                self.mem.ar = self.dp.alu;
                Ok(())
            }
            Signal::IrLatch => self.dp.ir_latch(self.mem.data()),
            Signal::MemRead => {
                self.ticks += self.mem.read(self.ticks)?;
                Ok(())
            }
            Signal::MemWrite => {
                self.ticks += self.mem.write(self.dp.alu, self.ticks)?;
                Ok(())
            }
            Signal::Halt => Err(MachineError::Halt),
            Signal::Dispatch => {
                let opcode = self
                    .dp
                    .ir
                    .as_ref()
                    .map(|instr| instr.opcode)
                    .ok_or(MachineError::MicrocodeJumpFail)?;
                self.mpc = dispatch(opcode);
                Ok(())
            }
            Signal::Jump(jump) => {
                if jump.uncond || self.dp.flag(jump.flag) == jump.expected {
                    self.mpc = jump.target;
                }
                Ok(())
            }
        }
    }

    /// Run until halt, input exhaustion, or the tick limit. Fatal machine
    /// faults propagate; the three ordinary stops produce a report.
    pub fn simulate(&mut self, tick_limit: u64) -> Result<Run, MachineError> {
        let outcome = 'run: loop {
            if self.ticks >= tick_limit {
                warn!("tick limit exceeded");
                break Outcome::TickLimit;
            }
            debug!("{self}\n{}\n{}\n------------", self.mem, self.dp);
            self.ticks += 1;
            let row = MICROPROGRAM[self.mpc];
            // A micro-jump in this row overwrites the incremented value.
            self.mpc += 1;
            for signal in row {
                match self.apply_signal(signal) {
                    Ok(()) => {}
                    Err(MachineError::Halt) => {
                        warn!("halt");
                        break 'run Outcome::Halted;
                    }
                    Err(MachineError::BufferEmpty) => {
                        warn!("input buffer was empty on fetch");
                        break 'run Outcome::InputExhausted;
                    }
                    Err(fatal) => return Err(fatal),
                }
            }
        };
        let output_raw = self.mem.output().to_vec();
        let output: String = output_raw
            .iter()
            .map(|&v| char::from_u32(v as u32).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        info!("output buffer: {output:?}");
        info!(
            "output buffer (codes): {}",
            output_raw
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(Run {
            output,
            output_raw,
            ticks: self.ticks,
            outcome,
            cache_requests: self.mem.cache.requests,
            cache_hits: self.mem.cache.hits,
        })
    }
}

impl fmt::Display for ControlUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TCK: {:3} mPC: {:3}", self.ticks, self.mpc)?;
        match MICROPROGRAM.get(self.mpc) {
            Some(row) => write!(f, "\n mPROG: {row:?}"),
            None => write!(f, "\n mPROG: -"),
        }
    }
}
