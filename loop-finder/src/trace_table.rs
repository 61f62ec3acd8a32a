use std::num::NonZeroU32;

use loop_crab::helpers::ip::Address;
use nohash_hasher::IntMap;

use crate::error::ArgumentError;

/// Inclusive range of hop numbers (sent TTLs) that traces are kept for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlRange {
    min: u8,
    max: u8,
}

impl TtlRange {
    pub fn new(min: u8, max: u8) -> Result<Self, ArgumentError> {
        if min > max {
            return Err(ArgumentError::InvertedTtlRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    /// Number of hop slots per destination; never zero.
    pub fn len(&self) -> usize {
        usize::from(self.max - self.min) + 1
    }

    fn slot_of(&self, hop: i64) -> Option<usize> {
        if hop < i64::from(self.min) || hop > i64::from(self.max) {
            return None;
        }
        usize::try_from(hop - i64::from(self.min)).ok()
    }
}

/// Responders seen for a single destination, one slot per hop of the range.
/// The unspecified address doubles as "no response", so recording `0.0.0.0`
/// leaves the slot empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopVector {
    first_hop: u8,
    slots: Box<[Option<NonZeroU32>]>,
}

impl HopVector {
    pub fn new(range: TtlRange) -> Self {
        Self {
            first_hop: range.min,
            slots: vec![None; range.len()].into_boxed_slice(),
        }
    }

    fn range(&self) -> TtlRange {
        TtlRange {
            min: self.first_hop,
            // slot count is derived from a valid range, so this can't overflow
            max: self.first_hop + (self.slots.len() - 1) as u8,
        }
    }

    /// Stores `responder` for `hop`, overwriting earlier responses. Returns false
    /// and leaves the vector untouched if `hop` lies outside of the range.
    pub fn record_hop(&mut self, hop: i64, responder: Address) -> bool {
        match self.range().slot_of(hop) {
            Some(slot) => {
                self.slots[slot] = NonZeroU32::new(responder.raw());
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn get(&self, hop: i64) -> Option<Address> {
        let slot = self.range().slot_of(hop)?;
        self.slots[slot].map(|it| Address::new(it.get()))
    }

    /// All hops in ascending order, including the ones without a response.
    pub fn iter(&self) -> impl Iterator<Item = (u8, Option<Address>)> + '_ {
        (self.first_hop..=self.range().max)
            .zip(self.slots.iter())
            .map(|(hop, slot)| (hop, slot.map(|it| Address::new(it.get()))))
    }

    pub(crate) fn raw_slots(&self) -> &[Option<NonZeroU32>] {
        &self.slots
    }

    #[cfg(test)]
    pub fn responded_hops(&self) -> usize {
        self.slots.iter().filter(|it| it.is_some()).count()
    }
}

/// Per-destination hop vectors, built up during ingestion.
#[derive(Debug)]
pub struct TraceTable {
    range: TtlRange,
    traces: IntMap<Address, HopVector>,
}

impl TraceTable {
    pub fn new(range: TtlRange) -> Self {
        Self {
            range,
            traces: IntMap::default(),
        }
    }

    /// Gets the vector for `dest`, creating an empty one on first sighting.
    pub fn ensure_destination(&mut self, dest: Address) -> &mut HopVector {
        let range = self.range;
        self.traces
            .entry(dest)
            .or_insert_with(|| HopVector::new(range))
    }

    #[cfg(test)]
    pub fn get(&self, dest: Address) -> Option<&HopVector> {
        self.traces.get(&dest)
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Iterates in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (Address, &HopVector)> {
        self.traces.iter().map(|(dest, hops)| (*dest, hops))
    }
}
