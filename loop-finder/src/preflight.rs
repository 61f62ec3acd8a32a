use std::io::{self, BufRead, BufReader, Read};
use std::mem::size_of;

use loop_crab::helpers::ip::Address;
use sysinfo::System;

use crate::trace_table::{HopVector, TtlRange};

/// Source of the amount of memory the system could still give us.
pub trait MemoryProbe {
    /// `None` if the amount cannot be determined on this system.
    fn available_bytes(&mut self) -> Option<u64>;
}

pub struct SystemMemory {
    system: System,
}

impl SystemMemory {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl MemoryProbe for SystemMemory {
    fn available_bytes(&mut self) -> Option<u64> {
        self.system.refresh_memory();
        match self.system.available_memory() {
            0 => None,
            available => Some(available),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    Sufficient { needed: u64, available: u64 },
    Insufficient { needed: u64, available: u64 },
    Unknown { needed: u64 },
}

/// Counts newline-terminated lines; a trailing unterminated line counts too.
pub fn count_lines<R: Read>(input: R) -> io::Result<u64> {
    let mut reader = BufReader::with_capacity(1 << 16, input);
    let mut lines = 0u64;
    let mut last_byte = None;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        lines += buf.iter().filter(|it| **it == b'\n').count() as u64;
        last_byte = buf.last().copied();
        let consumed = buf.len();
        reader.consume(consumed);
    }
    if matches!(last_byte, Some(it) if it != b'\n') {
        lines += 1;
    }
    Ok(lines)
}

// hashbrown keeps one control byte per bucket and fills at most 7/8 of them
const MAP_CONTROL_BYTES: u64 = 1;
const MAP_LOAD_NUMERATOR: u64 = 8;
const MAP_LOAD_DENOMINATOR: u64 = 7;
// rough per-allocation bookkeeping of the system allocator
const ALLOCATION_OVERHEAD: u64 = 16;

/// Rough upper bound of the trace table size after reading `line_count` lines.
/// Assumes that about half of the hops of each destination respond, once each.
pub fn estimate_table_bytes(range: TtlRange, line_count: u64) -> u64 {
    let hops = range.len() as u64;
    let responses_per_destination = (hops / 2).max(1);
    let destinations = line_count.div_ceil(responses_per_destination);
    if destinations == 0 {
        return 0;
    }

    let buckets = (destinations * MAP_LOAD_NUMERATOR)
        .div_ceil(MAP_LOAD_DENOMINATOR)
        .next_power_of_two();
    let bucket_bytes = (size_of::<(Address, HopVector)>() as u64) + MAP_CONTROL_BYTES;
    let slot_bytes = hops * size_of::<Option<std::num::NonZeroU32>>() as u64 + ALLOCATION_OVERHEAD;

    buckets
        .saturating_mul(bucket_bytes)
        .saturating_add(destinations.saturating_mul(slot_bytes))
}

pub fn check(probe: &mut dyn MemoryProbe, range: TtlRange, line_count: u64) -> Advisory {
    let needed = estimate_table_bytes(range, line_count);
    match probe.available_bytes() {
        Some(available) if needed > available => Advisory::Insufficient { needed, available },
        Some(available) => Advisory::Sufficient { needed, available },
        None => Advisory::Unknown { needed },
    }
}
