use anyhow::{Context, Result};
use clap::Args;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use flexi_logger::{colored_default_format, default_format, Logger, LoggerHandle, WriteMode};
use log::Level;

/// Logging goes to stderr so that stdout carries nothing but the loop reports.
#[derive(Args, Debug)]
#[group(id = "logging")]
pub struct Params {
    #[clap(flatten)]
    verbose: Verbosity<InfoLevel>,

    /// Use a flexi_logger configuration file
    #[arg(long = "log-spec")]
    use_log_spec: bool,

    /// Path to log spec
    #[arg(long, value_name = "TOML FILE", default_value = "logspec.toml")]
    log_spec_file: std::path::PathBuf,

    /// Don't colour log lines, e.g. when stderr is redirected to a file
    #[arg(long, env = "LOG_NO_COLOR")]
    no_color: bool,
}

impl Params {
    /// Whether info-level diagnostics such as progress would be shown at all.
    pub fn shows_info(&self) -> bool {
        self.cli_level() >= Level::Info
    }

    fn cli_level(&self) -> Level {
        // log_level() returns None iff verbosity < 0, i.e. being most quiet seems reasonable
        self.verbose.log_level().unwrap_or(Level::Error)
    }
}

pub fn configure_from(params: &Params) -> Result<LoggerHandle> {
    let log_builder = Logger::try_with_env_or_str(params.cli_level().to_string())
        .context("Failed to parse logger spec from env RUST_LOG or cli level")?
        .log_to_stderr()
        .write_mode(WriteMode::Async);

    let log_builder = if params.no_color {
        log_builder.format_for_stderr(default_format)
    } else {
        log_builder.format_for_stderr(colored_default_format)
    };

    match (&params.use_log_spec, &params.log_spec_file) {
        (true, specfile_path) => log_builder
            .start_with_specfile(specfile_path)
            .with_context(|| format!("Failed to start logger with specfile {:?}", *specfile_path)),
        (false, _) => log_builder
            .start()
            .context("Failed to start logger handle w/o specfile"),
    }
}
