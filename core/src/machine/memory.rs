//! Memory unit: address register, cache front, memory-mapped I/O port.
//!
//! Reads and writes return the extra ticks the access costs beyond the
//! current one (the tick that issued the access is already counted, hence
//! the `- 1` on every path).

use std::collections::VecDeque;
use std::fmt;

use crate::isa::MemoryCell;

use super::cache::{Cache, EMPTY_TAG, ENTRIES_PER_SET, LINE_SIZE, line_base};
use super::error::MachineError;

pub const IO_EXTRA_TICKS: u64 = 10;
pub const MEM_EXTRA_TICKS: u64 = 10;
pub const CACHE_EXTRA_TICKS: u64 = 1;

/// AR input mux.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArSrc {
    Pc,
    Alu,
}

pub struct MemoryUnit {
    pub ar: i32,
    mem: Vec<MemoryCell>,
    io_adr: i32,
    data: MemoryCell,
    read_buffer: VecDeque<i32>,
    write_buffer: Vec<i32>,
    pub cache: Cache,
}

impl MemoryUnit {
    pub fn new(io_adr: i32, mem: Vec<MemoryCell>, input: &str, cache_capacity: usize) -> Self {
        Self {
            ar: 0,
            mem,
            io_adr,
            data: MemoryCell::Word(0),
            read_buffer: input.chars().map(|c| c as i32).collect(),
            write_buffer: Vec::new(),
            cache: Cache::new(cache_capacity),
        }
    }

    /// Memory data latch, read by the TOS/IR latch signals.
    pub fn data(&self) -> &MemoryCell {
        &self.data
    }

    /// Everything the program has written to the I/O port so far.
    pub fn output(&self) -> &[i32] {
        &self.write_buffer
    }

    fn checked_addr(&self) -> Result<usize, MachineError> {
        usize::try_from(self.ar)
            .ok()
            .filter(|&a| a < self.mem.len())
            .ok_or(MachineError::AddressOutOfRange(self.ar))
    }

    /// Read the cell at AR into the data latch; returns extra ticks.
    pub fn read(&mut self, cur_ticks: u64) -> Result<u64, MachineError> {
        if self.ar == self.io_adr {
            let ch = self.read_buffer.pop_front().ok_or(MachineError::BufferEmpty)?;
            self.data = MemoryCell::Word(ch);
            return Ok(IO_EXTRA_TICKS - 1);
        }
        let addr = self.checked_addr()?;
        let wait = self.cache.prefetch_wait(cur_ticks);
        if let Some(cell) = self.cache.read(addr) {
            self.data = cell;
            return Ok(wait + CACHE_EXTRA_TICKS - 1);
        }
        let mut extra = wait + CACHE_EXTRA_TICKS;
        // A line the prefetcher already transferred skips the swap cost;
        // consult before the insert clears the in-flight marker.
        if !self.cache.prefetch_covers(addr) {
            extra += MEM_EXTRA_TICKS;
        }
        if self.fetch_and_insert(addr)? {
            extra += MEM_EXTRA_TICKS;
        }
        self.data = self.mem[addr].clone();
        self.schedule_prefetch(addr, cur_ticks + extra);
        Ok(extra - 1)
    }

    /// Write `value` to the cell at AR; returns extra ticks.
    pub fn write(&mut self, value: i32, cur_ticks: u64) -> Result<u64, MachineError> {
        if self.ar == self.io_adr {
            self.write_buffer.push(value);
            return Ok(IO_EXTRA_TICKS - 1);
        }
        let addr = self.checked_addr()?;
        let wait = self.cache.prefetch_wait(cur_ticks);
        if self.cache.write(addr, MemoryCell::Word(value)) {
            return Ok(wait + CACHE_EXTRA_TICKS - 1);
        }
        // Write-allocate: bring the line in, then store through it.
        let mut extra = wait + CACHE_EXTRA_TICKS;
        if !self.cache.prefetch_covers(addr) {
            extra += MEM_EXTRA_TICKS;
        }
        if self.fetch_and_insert(addr)? {
            extra += MEM_EXTRA_TICKS;
        }
        let stored = self.cache.update(addr, MemoryCell::Word(value));
        debug_assert!(stored, "line must be resident after allocate");
        self.schedule_prefetch(addr, cur_ticks + extra);
        Ok(extra - 1)
    }

    /// Copy the addressed line from backing memory into the cache, writing
    /// a dirty evictee back first. Returns whether the eviction was dirty.
    fn fetch_and_insert(&mut self, addr: usize) -> Result<bool, MachineError> {
        let base = line_base(addr);
        if base + LINE_SIZE > self.mem.len() {
            return Err(MachineError::AddressOutOfRange(self.ar));
        }
        let cells = std::array::from_fn(|i| self.mem[base + i].clone());
        let evicted = self.cache.insert(addr, cells);
        if evicted.tag != EMPTY_TAG && evicted.dirty {
            let slot = (addr / LINE_SIZE) % ENTRIES_PER_SET;
            let victim_base = evicted.tag as usize * LINE_SIZE * ENTRIES_PER_SET + slot * LINE_SIZE;
            for (i, cell) in evicted.line.into_iter().enumerate() {
                self.mem[victim_base + i] = cell;
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// Queue the next sequential line behind the access finishing at `done`.
    fn schedule_prefetch(&mut self, addr: usize, done: u64) {
        let next = line_base(addr) + LINE_SIZE;
        if next + LINE_SIZE > self.mem.len() {
            return;
        }
        if self.cache.contains(next) {
            self.cache.schedule_prefetch(next, done + CACHE_EXTRA_TICKS, false);
        } else {
            self.cache
                .schedule_prefetch(next, done + CACHE_EXTRA_TICKS + MEM_EXTRA_TICKS, true);
        }
    }
}

impl fmt::Display for MemoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " AR: {:3} MEM_OUT: {}", self.ar, self.data)
    }
}
