use stackarch_core::isa::{self, ImageRecord, Opcode};
use stackarch_core::machine::{ControlUnit, Datapath, MachineConfig, MemoryUnit};

/// Tiny hand-assembler: lays instructions out contiguously from a start
/// address, data cells wherever asked.
pub struct Asm {
    pub records: Vec<ImageRecord>,
    pc: i32,
}

impl Asm {
    pub fn new(start: i32) -> Self {
        Self {
            records: Vec::new(),
            pc: start,
        }
    }

    /// Address the next instruction will land at.
    pub fn here(&self) -> i32 {
        self.pc
    }

    pub fn op(mut self, opcode: Opcode) -> Self {
        self.records.push(ImageRecord::Instruction {
            opcode,
            operand: None,
            token: None,
            offset: self.pc,
        });
        self.pc += 1;
        self
    }

    pub fn op_with(mut self, opcode: Opcode, operand: i32) -> Self {
        self.records.push(ImageRecord::Instruction {
            opcode,
            operand: Some(operand),
            token: None,
            offset: self.pc,
        });
        self.pc += 1;
        self
    }

    pub fn word_at(mut self, offset: i32, value: i32) -> Self {
        self.records.push(ImageRecord::Data {
            word: value,
            offset,
        });
        self
    }
}

/// Wire a machine around `records` without running it, so tests can poke
/// at datapath and memory state after `simulate`.
pub fn machine_for(records: &[ImageRecord], config: &MachineConfig) -> ControlUnit {
    let mem = isa::load_image(records, config.mem_size).expect("image fits in memory");
    let memory = MemoryUnit::new(config.io_adr, mem, &config.input, config.cache_capacity);
    ControlUnit::new(Datapath::new(config.start_adr), memory)
}

pub fn default_machine(records: &[ImageRecord]) -> ControlUnit {
    machine_for(records, &MachineConfig::default())
}
