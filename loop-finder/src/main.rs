use anyhow::Result;
use clap::Parser;

use loop_crab::helpers::{bootstrap, logging};

/// Drives one run: checks the TTL range, sizes the file, ingests it and reports loops.
mod analyse;
/// Loop predicate and report formatting.
mod detect;
mod error;
/// Streaming construction of the trace table from yarrp text output.
mod ingest;
/// Line counting and memory advisory before the actual read.
mod preflight;
mod progress;
mod record;
mod trace_table;

/// Find routing loops in a single or combined yarrp (.yrp) text file.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[clap(flatten)]
    logging: logging::Params,

    #[clap(flatten)]
    analyse: analyse::Params,
}

fn main() -> Result<()> {
    bootstrap::run(Cli::parse, |cli: &Cli| &cli.logging, do_run)
}

fn do_run(cli: Cli) -> Result<()> {
    let show_progress = cli.logging.shows_info();
    analyse::handle(cli.analyse, show_progress)
}
