pub mod isa;
pub mod machine;

pub mod prelude {
    pub use crate::isa::{ImageRecord, Instruction, MemoryCell, Opcode, TokenMeta};
    pub use crate::machine::{ControlUnit, MachineConfig, MachineError, Outcome, Run, run_image};
}
