//! Streaming outcome reporting and run-level accounting.

use std::io::Write;

use indicatif::ProgressBar;
use tracing::warn;

use crate::convert::ConversionOutcome;

/// Aggregate counters for one run; the failed count decides exit status.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    pub converted: u64,
    pub removed: u64,
    pub failed: u64,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Consumes outcomes as they arrive and emits the per-file lines.
///
/// The `converted:`/`removed:` pair for one file is always printed together,
/// so lines of different files never interleave. Counters accumulate whether
/// or not verbose output is enabled. Progress is drawn on stderr and hides
/// itself when the stream is not a terminal; the contract lines go to stdout.
pub struct Reporter {
    verbose: bool,
    result: RunResult,
    progress: ProgressBar,
    out: Box<dyn Write + Send>,
}

impl Reporter {
    pub fn new(verbose: bool) -> Self {
        Self::with_output(verbose, Box::new(std::io::stdout()))
    }

    /// Build a reporter writing its contract lines to an explicit sink.
    pub fn with_output(verbose: bool, out: Box<dyn Write + Send>) -> Self {
        let progress = ProgressBar::new_spinner();
        progress.set_message("converting");
        Self {
            verbose,
            result: RunResult::default(),
            progress,
            out,
        }
    }

    pub fn record(&mut self, outcome: &ConversionOutcome) {
        self.progress.inc(1);
        match outcome {
            ConversionOutcome::Converted { source, target } => {
                self.result.converted += 1;
                if self.verbose {
                    let _ = writeln!(
                        self.out,
                        "converted: {} -> {}",
                        source.display(),
                        target.display()
                    );
                }
            }
            ConversionOutcome::ConvertedAndRemoved { source, target } => {
                self.result.converted += 1;
                self.result.removed += 1;
                if self.verbose {
                    let _ = writeln!(
                        self.out,
                        "converted: {} -> {}",
                        source.display(),
                        target.display()
                    );
                    let _ = writeln!(self.out, "removed: {}", source.display());
                }
            }
            ConversionOutcome::Skipped { source, target } => {
                // dryrun: report what would happen, no removed line
                self.result.converted += 1;
                if self.verbose {
                    let _ = writeln!(
                        self.out,
                        "converted: {} -> {}",
                        source.display(),
                        target.display()
                    );
                }
            }
            ConversionOutcome::Failed { source, cause } => {
                self.result.failed += 1;
                if self.verbose {
                    warn!("failed: {}: {}", source.display(), cause);
                }
            }
        }
    }

    pub fn finish(mut self) -> RunResult {
        let _ = self.out.flush();
        self.progress.finish_and_clear();
        self.result
    }
}
