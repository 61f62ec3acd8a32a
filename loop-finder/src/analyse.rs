use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use log::{info, warn};

use crate::detect::{self, DetectionSummary, Detector};
use crate::ingest::{self, IngestStats, Ingestor};
use crate::preflight::{self, Advisory, MemoryProbe};
use crate::progress::Progress;
use crate::trace_table::TtlRange;

/// Gives the operator a chance to notice the memory warning before the
/// progress bar takes over.
const ADVISORY_PAUSE: Duration = Duration::from_secs(1);

#[derive(Args, Clone, Debug)]
#[group(id = "analyse")]
pub struct Params {
    /// yarrp text output to analyse, possibly several runs concatenated
    #[arg(short = 'f', long, env = "LOOP_FILE")]
    pub file: PathBuf,

    /// Lowest hop number (TTL) to keep
    #[arg(short = 'm', long = "min_ttl", env = "MIN_TTL")]
    pub min_ttl: u8,

    /// Highest hop number (TTL) to keep, at least min_ttl
    #[arg(short = 'l', long = "max_ttl", env = "MAX_TTL")]
    pub max_ttl: u8,

    #[clap(flatten)]
    pub ingest: ingest::Params,

    #[clap(flatten)]
    pub detect: detect::Params,

    /// Don't draw a progress bar while reading the file
    #[arg(long, env = "LOOP_NO_PROGRESS")]
    pub no_progress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub ingest: IngestStats,
    pub detection: DetectionSummary,
}

/// Capabilities that the analysis borrows from its environment.
pub struct Environment<'a, W: Write> {
    pub memory: &'a mut dyn MemoryProbe,
    pub progress: &'a dyn Fn(u64) -> Box<dyn Progress>,
    pub advisory_pause: Duration,
    pub out: W,
}

pub fn handle(params: Params, show_progress: bool) -> Result<()> {
    let show_progress = show_progress && !params.no_progress;
    let make_progress = |total_lines: u64| -> Box<dyn Progress> {
        if show_progress {
            Box::new(crate::progress::line_bar(total_lines))
        } else {
            Box::new(crate::progress::Silent)
        }
    };
    let mut memory = preflight::SystemMemory::new();
    let stdout = io::stdout().lock();
    let env = Environment {
        memory: &mut memory,
        progress: &make_progress,
        advisory_pause: ADVISORY_PAUSE,
        out: BufWriter::new(stdout),
    };

    let outcome = run(params, env)?;
    info!("{}", outcome.detection);
    if outcome.ingest.malformed > 0 {
        warn!(
            "Skipped {} malformed lines out of {} records.",
            outcome.ingest.malformed, outcome.ingest.records
        );
    }
    Ok(())
}

/// Validates the arguments, sizes the file, reads it once and reports loops.
/// Nothing is written to `env.out` unless the whole file was read successfully.
pub fn run<W: Write>(params: Params, mut env: Environment<'_, W>) -> Result<Outcome> {
    let range = TtlRange::new(params.min_ttl, params.max_ttl)?;

    info!("Calculating total length of file to analyse...");
    let line_count = preflight::count_lines(open(&params.file)?)
        .with_context(|| format!("Failed to count lines of {:?}", params.file))?;
    advise(preflight::check(env.memory, range, line_count), env.advisory_pause);
    info!(
        "{} total lines to process, keeping hops {} to {}.",
        line_count,
        range.min(),
        range.max()
    );

    let progress = (env.progress)(line_count);
    let ingested = Ingestor::new(params.ingest, range, progress.as_ref())
        .ingest(open(&params.file)?)
        .with_context(|| format!("Failed to ingest {:?}", params.file))?;

    let detection = Detector::new(params.detect)
        .run(&ingested.table, &mut env.out)
        .context("Failed to write loop report")?;

    Ok(Outcome {
        ingest: ingested.stats,
        detection,
    })
}

fn open(path: &Path) -> Result<File> {
    File::open(path).with_context(|| format!("Failed to open input file {:?}", path))
}

fn advise(advisory: Advisory, pause: Duration) {
    match advisory {
        Advisory::Insufficient { needed, available } => {
            warn!(
                "The system doesn't seem to have sufficient memory to analyse this file \
                (about {} MiB needed, {} MiB available)... Proceeding anyway!",
                needed >> 20,
                available >> 20
            );
            thread::sleep(pause);
        }
        Advisory::Sufficient { needed, available } => info!(
            "Expecting to need about {} MiB of {} MiB available memory.",
            needed >> 20,
            available >> 20
        ),
        Advisory::Unknown { needed } => info!(
            "Expecting to need about {} MiB of memory, available memory unknown.",
            needed >> 20
        ),
    }
}

#[cfg(test)]
mod tests {
    use assertor::*;

    use super::*;
    use crate::error::ArgumentError;
    use crate::ingest::IngestError;
    use crate::progress::Silent;
    use crate::record::RecordError;

    struct NoMemoryInfo;

    impl MemoryProbe for NoMemoryInfo {
        fn available_bytes(&mut self) -> Option<u64> {
            None
        }
    }

    struct TinyMemory;

    impl MemoryProbe for TinyMemory {
        fn available_bytes(&mut self) -> Option<u64> {
            Some(1)
        }
    }

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("testdata")
            .join(name)
    }

    fn params(file: &str, min_ttl: u8, max_ttl: u8) -> Params {
        Params {
            file: testdata(file),
            min_ttl,
            max_ttl,
            ingest: ingest::Params {
                delimiter: b' ',
                lenient: false,
                skip_comments: false,
            },
            detect: detect::Params {
                delta: 2,
                sorted: true,
            },
            no_progress: true,
        }
    }

    /// `mixed.txt` starts with a yarrp comment line.
    fn mixed() -> Params {
        let mut params = params("mixed.txt", 1, 8);
        params.ingest.skip_comments = true;
        params
    }

    fn silent(_total: u64) -> Box<dyn Progress> {
        Box::new(Silent)
    }

    fn run_with(params: Params, memory: &mut dyn MemoryProbe) -> (Result<Outcome>, String) {
        let mut out = vec![];
        let env = Environment {
            memory,
            progress: &silent,
            advisory_pause: Duration::ZERO,
            out: &mut out,
        };
        let res = run(params, env);
        (res, String::from_utf8(out).unwrap())
    }

    #[test]
    fn loop_beyond_delta_is_reported() {
        // given
        let params = params("loop-beyond-delta.txt", 1, 5);
        // when
        let (res, out) = run_with(params, &mut NoMemoryInfo);
        // then
        let outcome = res.unwrap();
        assert_that!(outcome.detection).is_equal_to(DetectionSummary {
            total: 1,
            looping: 1,
        });
        assert_that!(out).is_equal_to("10.0.0.1:\n1 1.1.1.1\n2 *\n3 *\n4 1.1.1.1\n5 *\n".to_string());
    }

    #[test]
    fn loop_within_delta_is_not_reported() {
        // given
        let params = params("loop-within-delta.txt", 1, 5);
        // when
        let (res, out) = run_with(params, &mut NoMemoryInfo);
        // then
        assert_that!(res.unwrap().detection).is_equal_to(DetectionSummary {
            total: 1,
            looping: 0,
        });
        assert_that!(out).is_equal_to(String::new());
    }

    #[test]
    fn malformed_line_aborts_without_report() {
        // given
        let params = params("malformed-field-count.txt", 1, 5);
        // when
        let (res, out) = run_with(params, &mut NoMemoryInfo);
        // then
        let err = res.expect_err("run to fail");
        let cause = err
            .downcast_ref::<IngestError>()
            .expect("cause to be an ingest error");
        assert!(matches!(cause, IngestError::Malformed { line: 2, .. }));
        assert_that!(out).is_equal_to(String::new());
    }

    #[test]
    fn malformed_line_is_skipped_in_lenient_mode() {
        // given
        let mut params = params("malformed-field-count.txt", 1, 5);
        params.ingest.lenient = true;
        // when
        let (res, out) = run_with(params, &mut NoMemoryInfo);
        // then
        let outcome = res.unwrap();
        assert_that!(outcome.ingest.malformed).is_equal_to(1);
        assert_that!(outcome.detection.looping).is_equal_to(1);
        assert_that!(out.starts_with("10.0.0.1:\n")).is_true();
    }

    #[test]
    fn inverted_ttl_range_fails_before_reading() {
        // given
        let params = params("does-not-exist.txt", 5, 1);
        // when
        let (res, out) = run_with(params, &mut NoMemoryInfo);
        // then
        let err = res.expect_err("run to fail");
        assert_that!(err.downcast_ref::<ArgumentError>())
            .is_equal_to(Some(&ArgumentError::InvertedTtlRange { min: 5, max: 1 }));
        assert_that!(out).is_equal_to(String::new());
    }

    #[test]
    fn missing_file_is_an_error() {
        let (res, _) = run_with(params("does-not-exist.txt", 1, 5), &mut NoMemoryInfo);
        assert_that!(res).is_err();
    }

    #[test]
    fn memory_shortage_is_only_advisory() {
        // given
        let params = params("loop-beyond-delta.txt", 1, 5);
        // when
        let (res, out) = run_with(params, &mut TinyMemory);
        // then
        assert_that!(res.unwrap().detection.looping).is_equal_to(1);
        assert_that!(out.is_empty()).is_false();
    }

    #[test]
    fn mixed_file_reports_only_loops() {
        // given
        let params = mixed();
        // when
        let (res, out) = run_with(params, &mut NoMemoryInfo);
        // then
        let outcome = res.unwrap();
        assert_that!(outcome.detection).is_equal_to(DetectionSummary {
            total: 3,
            looping: 2,
        });
        assert_that!(outcome.ingest.other_types).is_equal_to(2);
        assert_that!(outcome.ingest.out_of_range).is_equal_to(1);
        assert_that!(out).is_equal_to(
            "192.0.2.7:\n1 10.0.0.1\n2 10.0.0.2\n3 10.0.0.3\n4 10.0.0.1\n5 *\n6 *\n7 *\n8 *\n\
            198.51.100.3:\n1 *\n2 172.16.0.1\n3 172.16.0.2\n4 172.16.0.3\n5 172.16.0.4\n6 172.16.0.2\n7 *\n8 *\n"
                .to_string(),
        );
    }

    #[test]
    fn comment_line_aborts_strict_run() {
        // given
        let params = params("mixed.txt", 1, 8);
        // when
        let (res, out) = run_with(params, &mut NoMemoryInfo);
        // then
        let err = res.expect_err("run to fail");
        let cause = err
            .downcast_ref::<IngestError>()
            .expect("cause to be an ingest error");
        assert!(matches!(
            cause,
            IngestError::Malformed {
                line: 1,
                source: RecordError::FieldCount(_),
            }
        ));
        assert_that!(out).is_equal_to(String::new());
    }

    #[test]
    fn repeated_runs_give_identical_reports() {
        let (first, first_out) = run_with(mixed(), &mut NoMemoryInfo);
        let (second, second_out) = run_with(mixed(), &mut NoMemoryInfo);

        assert_that!(first.unwrap()).is_equal_to(second.unwrap());
        assert_that!(first_out).is_equal_to(second_out);
    }
}
