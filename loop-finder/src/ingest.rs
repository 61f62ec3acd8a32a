use std::io::{self, BufRead, BufReader, Read};
use std::str;

use clap::Args;
use log::{debug, warn};
use thiserror::Error;

use crate::error::ArgumentError;
use crate::progress::Progress;
use crate::record::{self, ParsedLine, RecordError};
use crate::trace_table::{TraceTable, TtlRange};

/// Only the first few malformed lines are logged individually in lenient mode.
const MAX_LOGGED_MALFORMED: u64 = 10;
/// Lines between two progress updates.
const PROGRESS_STEP: u64 = 4096;

#[derive(Args, Clone, Debug)]
#[group(id = "ingest")]
pub struct Params {
    /// Field delimiter of the input file, a single ASCII character (`\t` for tab)
    #[arg(
        short = 'd',
        long = "delimeter",
        visible_alias = "delimiter",
        env = "LOOP_DELIMITER",
        default_value = " ",
        value_parser = parse_delimiter
    )]
    pub delimiter: u8,

    /// Skip and count malformed lines instead of aborting on the first one
    #[arg(long, env = "LOOP_LENIENT")]
    pub lenient: bool,

    /// Ignore empty lines and lines starting with `#`, which are malformed otherwise
    #[arg(long, env = "LOOP_SKIP_COMMENTS")]
    pub skip_comments: bool,
}

pub fn parse_delimiter(input: &str) -> Result<u8, ArgumentError> {
    match input {
        "\\t" => Ok(b'\t'),
        _ => match input.as_bytes() {
            [single] if single.is_ascii() => Ok(*single),
            _ => Err(ArgumentError::Delimiter(input.to_string())),
        },
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to read input")]
    Read {
        #[from]
        source: io::Error,
    },

    #[error("malformed input on line {line}")]
    Malformed { line: u64, source: RecordError },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines looked at, excluding the ones dropped by `--skip-comments`.
    pub records: u64,
    /// TTL exceeded records stored in the table.
    pub applied: u64,
    /// TTL exceeded records with a hop number outside the TTL range.
    pub out_of_range: u64,
    /// Records with any other ICMP type.
    pub other_types: u64,
    /// Only ever non-zero in lenient mode.
    pub malformed: u64,
}

pub struct Ingested {
    pub table: TraceTable,
    pub stats: IngestStats,
}

/// Single pass over yarrp text output, building one hop vector per destination.
pub struct Ingestor<'a> {
    params: Params,
    range: TtlRange,
    progress: &'a dyn Progress,
}

impl<'a> Ingestor<'a> {
    pub fn new(params: Params, range: TtlRange, progress: &'a dyn Progress) -> Self {
        Self {
            params,
            range,
            progress,
        }
    }

    pub fn ingest<R: Read>(&self, input: R) -> Result<Ingested, IngestError> {
        let mut reader = BufReader::with_capacity(1 << 16, input);
        let delimiter = char::from(self.params.delimiter);

        let mut table = TraceTable::new(self.range);
        let mut stats = IngestStats::default();
        let mut buf = Vec::new();
        let mut line = 0u64;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line += 1;
            if line % PROGRESS_STEP == 0 {
                self.progress.advance_to(line);
            }

            let content = strip_terminator(&buf);
            if self.params.skip_comments && is_comment(content) {
                continue;
            }
            stats.records += 1;

            let parsed = str::from_utf8(content)
                .map_err(RecordError::from)
                .and_then(|text| record::parse(text, delimiter));
            match parsed {
                Ok(ParsedLine::TimeExceeded(response)) => {
                    let hops = table.ensure_destination(response.target);
                    if hops.record_hop(response.sent_ttl, response.actual_from) {
                        stats.applied += 1;
                    } else {
                        stats.out_of_range += 1;
                    }
                }
                Ok(ParsedLine::Other) => stats.other_types += 1,
                Err(source) if self.params.lenient => {
                    self.skip_malformed(&mut stats, line, &source);
                }
                Err(source) => return Err(IngestError::Malformed { line, source }),
            }
        }

        self.progress.finish();
        debug!("Ingestion finished: {:?}", stats);
        Ok(Ingested { table, stats })
    }

    fn skip_malformed(&self, stats: &mut IngestStats, line: u64, cause: &RecordError) {
        stats.malformed += 1;
        if stats.malformed <= MAX_LOGGED_MALFORMED {
            warn!("Skipping malformed line {}: {}", line, cause);
        }
        if stats.malformed == MAX_LOGGED_MALFORMED {
            warn!("Further malformed lines are skipped without notice.");
        }
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn is_comment(line: &[u8]) -> bool {
    line.is_empty() || line.starts_with(b"#")
}
