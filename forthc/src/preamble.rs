//! Compiler-emitted helper routines, installed on first use of `."` / `.`.
//!
//! Both routines are called with `CALL`, expect their argument in TOS,
//! write bytes to the I/O port one `STORE` at a time, and restore the
//! caller's TOS before `RET`.

use stackarch_core::isa::Opcode;

use crate::section::{DraftCell, MemoryAddress, MemorySection};

/// Print a Pascal string; TOS holds the address of its length cell.
///
/// Stashes the count and a running index on the return stack, then walks
/// `base+1 ..= base+count` emitting one code point per `LOOP` turn.
pub fn add_print_string(section: &mut MemorySection, io_adr: i32) -> MemoryAddress {
    let start = section.push_range([
        DraftCell::op(Opcode::Dup),
        DraftCell::op(Opcode::Fetch),
        DraftCell::op(Opcode::Stash),
        DraftCell::op_lit(Opcode::Push, 1),
        DraftCell::op(Opcode::Stash),
    ]);
    let cycle = section.push(DraftCell::op(Opcode::Dup));
    section.push_range([
        DraftCell::op(Opcode::Cpstash),
        DraftCell::op(Opcode::Add),
        DraftCell::op(Opcode::Fetch),
        DraftCell::op_lit(Opcode::Push, io_adr),
        DraftCell::op(Opcode::Store),
        DraftCell::op_addr(Opcode::Loop, cycle),
        DraftCell::op(Opcode::Pop),
        DraftCell::op(Opcode::Ret),
    ]);
    start
}

/// Print the signed decimal rendering of TOS.
///
/// Sign-tests against the high bit, emits `-` and negates, then pushes
/// digits `'0' + n mod 10` onto the return stack (count kept on the data
/// stack) until the quotient is zero, and pops them back out MSD-first.
pub fn add_print_num(section: &mut MemorySection, io_adr: i32) -> MemoryAddress {
    let start = section.push_range([
        DraftCell::op(Opcode::Dup),
        DraftCell::op_lit(Opcode::Push, i32::MIN),
        DraftCell::op(Opcode::And),
    ]);
    let jz_positive = section.next_index();
    section.push(DraftCell::op(Opcode::Jmpz));
    section.push_range([
        DraftCell::op_lit(Opcode::Push, '-' as i32),
        DraftCell::op_lit(Opcode::Push, io_adr),
        DraftCell::op(Opcode::Store),
        DraftCell::op_lit(Opcode::Push, 0),
        DraftCell::op(Opcode::Swap),
        DraftCell::op(Opcode::Sub),
    ]);
    section.patch_operand(jz_positive, section.offset_addr());
    // digit count sits under the working value
    section.push_range([
        DraftCell::op_lit(Opcode::Push, 0),
        DraftCell::op(Opcode::Swap),
    ]);
    let extract = section.offset_addr();
    section.push_range([
        DraftCell::op(Opcode::Dup),
        DraftCell::op_lit(Opcode::Push, 10),
        DraftCell::op(Opcode::Mod),
        DraftCell::op_lit(Opcode::Push, '0' as i32),
        DraftCell::op(Opcode::Add),
        DraftCell::op(Opcode::Stash),
        DraftCell::op(Opcode::Swap),
        DraftCell::op_lit(Opcode::Push, 1),
        DraftCell::op(Opcode::Add),
        DraftCell::op(Opcode::Swap),
        DraftCell::op_lit(Opcode::Push, 10),
        DraftCell::op(Opcode::Div),
        DraftCell::op(Opcode::Dup),
    ]);
    let jz_emit = section.next_index();
    section.push(DraftCell::op(Opcode::Jmpz));
    section.push(DraftCell::op_addr(Opcode::Jmp, extract));
    section.patch_operand(jz_emit, section.offset_addr());
    section.push(DraftCell::op(Opcode::Pop));
    let emit_loop = section.offset_addr();
    section.push(DraftCell::op(Opcode::Dup));
    let jz_done = section.next_index();
    section.push(DraftCell::op(Opcode::Jmpz));
    section.push_range([
        DraftCell::op(Opcode::Unstash),
        DraftCell::op_lit(Opcode::Push, io_adr),
        DraftCell::op(Opcode::Store),
        DraftCell::op_lit(Opcode::Push, 1),
        DraftCell::op(Opcode::Sub),
        DraftCell::op_addr(Opcode::Jmp, emit_loop),
    ]);
    section.patch_operand(jz_done, section.offset_addr());
    section.push_range([DraftCell::op(Opcode::Pop), DraftCell::op(Opcode::Ret)]);
    start
}
