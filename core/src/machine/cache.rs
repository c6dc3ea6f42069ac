//! Set-associative write-back data cache with one-line sequential prefetch.
//!
//! Geometry: 4-cell lines, 4 entries per set, `capacity / 16` sets. An
//! address decodes as `word = A % 4`, `slot = (A / 4) % 4`,
//! `tag = A / 16`; a hit requires some set to hold the tag at that slot.
//!
//! Replacement is the slot-wise exhaustion scheme: every set carries one
//! recency bit per slot. An access sets the bit in the touched set; once
//! every set's bit for a slot is up, they are all cleared and only the
//! touched set keeps its bit. The victim on a miss is the first set whose
//! bit for the slot is down.

use crate::isa::MemoryCell;

pub const LINE_SIZE: usize = 4;
pub const ENTRIES_PER_SET: usize = 4;
pub const EMPTY_TAG: i32 = -1;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub tag: i32,
    pub line: [MemoryCell; LINE_SIZE],
    pub dirty: bool,
}

impl CacheEntry {
    fn empty() -> Self {
        Self {
            tag: EMPTY_TAG,
            line: std::array::from_fn(|_| MemoryCell::Word(0)),
            dirty: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSet {
    pub entries: [CacheEntry; ENTRIES_PER_SET],
    pub plrum: [bool; ENTRIES_PER_SET],
}

impl CacheSet {
    fn new() -> Self {
        Self {
            entries: std::array::from_fn(|_| CacheEntry::empty()),
            plrum: [false; ENTRIES_PER_SET],
        }
    }
}

fn decode(addr: usize) -> (usize, usize, i32) {
    let word = addr % LINE_SIZE;
    let slot = (addr / LINE_SIZE) % ENTRIES_PER_SET;
    let tag = (addr / (LINE_SIZE * ENTRIES_PER_SET)) as i32;
    (word, slot, tag)
}

pub fn line_base(addr: usize) -> usize {
    addr - addr % LINE_SIZE
}

pub struct Cache {
    pub sets: Vec<CacheSet>,
    pub requests: u64,
    pub hits: u64,
    prefetch_end: u64,
    prefetch_line: Option<usize>,
}

impl Cache {
    /// `capacity` is in cells and must be a power of two strictly larger
    /// than one line per set.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity > LINE_SIZE * ENTRIES_PER_SET,
            "cache capacity must be a power of two larger than {} cells",
            LINE_SIZE * ENTRIES_PER_SET
        );
        let set_count = capacity / (LINE_SIZE * ENTRIES_PER_SET);
        Self {
            sets: vec![CacheSet::new(); set_count],
            requests: 0,
            hits: 0,
            prefetch_end: 0,
            prefetch_line: None,
        }
    }

    fn find(&self, slot: usize, tag: i32) -> Option<usize> {
        self.sets.iter().position(|s| s.entries[slot].tag == tag)
    }

    /// Raise the recency bit for (set, slot); on exhaustion clear the slot
    /// across all sets and keep only the touched one raised.
    fn touch(&mut self, set: usize, slot: usize) {
        self.sets[set].plrum[slot] = true;
        if self.sets.iter().all(|s| s.plrum[slot]) {
            for s in &mut self.sets {
                s.plrum[slot] = false;
            }
            self.sets[set].plrum[slot] = true;
        }
    }

    pub fn read(&mut self, addr: usize) -> Option<MemoryCell> {
        self.requests += 1;
        let (word, slot, tag) = decode(addr);
        let set = self.find(slot, tag)?;
        self.hits += 1;
        self.touch(set, slot);
        Some(self.sets[set].entries[slot].line[word].clone())
    }

    /// Write through the hit path; returns false on a miss (the caller
    /// allocates and retries via `update`).
    pub fn write(&mut self, addr: usize, cell: MemoryCell) -> bool {
        self.requests += 1;
        let (word, slot, tag) = decode(addr);
        match self.find(slot, tag) {
            Some(set) => {
                let entry = &mut self.sets[set].entries[slot];
                entry.line[word] = cell;
                entry.dirty = true;
                self.hits += 1;
                self.touch(set, slot);
                true
            }
            None => false,
        }
    }

    /// Store into a line known to be resident (right after an
    /// allocate-on-write insert). Not counted as a request.
    pub fn update(&mut self, addr: usize, cell: MemoryCell) -> bool {
        let (word, slot, tag) = decode(addr);
        match self.find(slot, tag) {
            Some(set) => {
                let entry = &mut self.sets[set].entries[slot];
                entry.line[word] = cell;
                entry.dirty = true;
                self.touch(set, slot);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, addr: usize) -> bool {
        let (_, slot, tag) = decode(addr);
        self.find(slot, tag).is_some()
    }

    /// Swap a line in, returning whatever the replacement policy evicted.
    pub fn insert(&mut self, addr: usize, cells: [MemoryCell; LINE_SIZE]) -> CacheEntry {
        let (_, slot, tag) = decode(addr);
        // The exhaustion invariant guarantees a down bit somewhere.
        let victim = self
            .sets
            .iter()
            .position(|s| !s.plrum[slot])
            .unwrap_or(0);
        let evicted = std::mem::replace(
            &mut self.sets[victim].entries[slot],
            CacheEntry {
                tag,
                line: cells,
                dirty: false,
            },
        );
        if self.prefetch_line == Some(line_base(addr)) {
            self.prefetch_line = None;
        }
        self.touch(victim, slot);
        evicted
    }

    /// Outstanding portion of a scheduled prefetch, charged to the caller.
    pub fn prefetch_wait(&self, cur_ticks: u64) -> u64 {
        self.prefetch_end.saturating_sub(cur_ticks)
    }

    /// Whether the addressed line is the one in flight from the prefetcher.
    pub fn prefetch_covers(&self, addr: usize) -> bool {
        self.prefetch_line == Some(line_base(addr))
    }

    pub fn schedule_prefetch(&mut self, base: usize, end: u64, in_flight: bool) {
        self.prefetch_end = end;
        self.prefetch_line = in_flight.then_some(base);
    }

    pub fn miss_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            (self.requests - self.hits) as f64 / self.requests as f64
        }
    }
}
