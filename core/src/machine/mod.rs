pub mod cache;
pub mod control;
pub mod datapath;
pub mod error;
pub mod memory;

pub use control::{ControlUnit, Outcome, Run};
pub use datapath::Datapath;
pub use error::MachineError;
pub use memory::MemoryUnit;

use crate::isa::{self, ImageRecord};

/// Simulation parameters; defaults mirror the CLI defaults.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub input: String,
    pub tick_limit: u64,
    pub mem_size: usize,
    pub start_adr: i32,
    pub io_adr: i32,
    pub cache_capacity: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            input: String::new(),
            tick_limit: 100_000,
            mem_size: 1024,
            start_adr: 10,
            io_adr: 0,
            cache_capacity: 128,
        }
    }
}

/// Wire a machine around a program image and run it to completion.
pub fn run_image(records: &[ImageRecord], config: &MachineConfig) -> Result<Run, MachineError> {
    let mem = isa::load_image(records, config.mem_size).map_err(|e| match e {
        isa::ImageError::OffsetOutOfRange(offset, _) => MachineError::AddressOutOfRange(offset),
        // load_image performs no I/O or parsing
        _ => MachineError::AddressOutOfRange(config.mem_size as i32),
    })?;
    let memory = MemoryUnit::new(config.io_adr, mem, &config.input, config.cache_capacity);
    let datapath = Datapath::new(config.start_adr);
    let mut control = ControlUnit::new(datapath, memory);
    control.simulate(config.tick_limit)
}
