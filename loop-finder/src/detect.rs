use std::fmt;
use std::io::{self, Write};

use clap::Args;
use itertools::Itertools;
use log::debug;
use loop_crab::helpers::ip::Address;

use crate::trace_table::{HopVector, TraceTable};

#[derive(Args, Clone, Debug)]
#[group(id = "detect")]
pub struct Params {
    /// Equal responders need to be more than this many hops apart to count as a loop
    #[arg(short = 't', long, env = "LOOP_DELTA", default_value = "2")]
    pub delta: u32,

    /// Print looping destinations in ascending address order instead of table order
    #[arg(long, env = "LOOP_SORTED")]
    pub sorted: bool,
}

/// Whether the same responder shows up at two hops that are more than
/// `delta` apart. Hops without a response never match.
pub fn has_loop(hops: &HopVector, delta: u32) -> bool {
    let slots = hops.raw_slots();
    let min_distance = usize::try_from(delta)
        .unwrap_or(usize::MAX)
        .saturating_add(1);

    slots.iter().enumerate().any(|(idx, responder)| {
        let Some(responder) = responder else {
            return false;
        };
        // pairs are symmetric, so only look ahead
        slots
            .iter()
            .skip(idx.saturating_add(min_distance))
            .any(|other| other.as_ref() == Some(responder))
    })
}

/// Printable hop listing of one looping destination.
pub struct LoopReport<'a> {
    pub dest: Address,
    pub hops: &'a HopVector,
}

impl fmt::Display for LoopReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.dest)?;
        for (hop, responder) in self.hops.iter() {
            match responder {
                Some(responder) => writeln!(f, "{} {}", hop, responder)?,
                None => writeln!(f, "{} *", hop)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DetectionSummary {
    /// Destinations that had at least one TTL exceeded response.
    pub total: usize,
    pub looping: usize,
}

pub struct Detector {
    params: Params,
}

impl Detector {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Writes a report for each looping destination of `table` to `out`.
    pub fn run<W: Write>(&self, table: &TraceTable, out: &mut W) -> io::Result<DetectionSummary> {
        let delta = self.params.delta;
        let looping = table.iter().filter(|(_, hops)| has_loop(hops, delta));

        let mut summary = DetectionSummary {
            total: table.len(),
            looping: 0,
        };
        if self.params.sorted {
            for (dest, hops) in looping.sorted_unstable_by_key(|(dest, _)| *dest) {
                write!(out, "{}", LoopReport { dest, hops })?;
                summary.looping += 1;
            }
        } else {
            for (dest, hops) in looping {
                write!(out, "{}", LoopReport { dest, hops })?;
                summary.looping += 1;
            }
        }
        out.flush()?;

        debug!("Detection finished: {:?}", summary);
        Ok(summary)
    }
}

impl fmt::Display for DetectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Out of {} IPs that have an ICMP Time Exceeded message sent for, \
            you found {} IPs with qualifying routing loops on path",
            self.total, self.looping
        )
    }
}
