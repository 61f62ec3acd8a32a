use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::debug;

/// Receives the input line number the ingestion has reached.
pub trait Progress {
    fn advance_to(&self, line: u64);

    fn finish(&self);
}

impl Progress for ProgressBar {
    fn advance_to(&self, line: u64) {
        self.set_position(line);
    }

    fn finish(&self) {
        self.finish_and_clear();
    }
}

pub struct Silent;

impl Progress for Silent {
    fn advance_to(&self, _line: u64) {}

    fn finish(&self) {}
}

/// Bar on stderr, which indicatif hides by itself if stderr is not a terminal.
pub fn line_bar(total_lines: u64) -> ProgressBar {
    let bar = ProgressBar::with_draw_target(Some(total_lines), ProgressDrawTarget::stderr());
    match ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {human_pos}/{human_len} lines ({per_sec}, {eta} left)",
    ) {
        Ok(style) => bar.set_style(style.progress_chars("█▓▒░ ")),
        Err(e) => debug!("Falling back to default progress style: {}", e),
    }
    bar
}
