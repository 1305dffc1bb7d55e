use crate::error::{AvifyError, Result};

/// Immutable run-wide configuration, threaded explicitly into the pipeline.
///
/// There is no configuration file and no ambient global state; everything the
/// run needs comes from the command line and is validated before any scanning
/// starts.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    /// AVIF quality (0-100)
    pub quality: u8,
    /// Number of parallel conversion workers
    pub jobs: usize,
    /// Emit per-file converted/removed lines
    pub verbose: bool,
    /// Run all logic but skip target writes and source deletion
    pub dryrun: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            quality: 80,
            jobs: 1,
            verbose: false,
            dryrun: false,
        }
    }
}

impl RunConfig {
    /// Validate the configuration. Invalid values are fatal and abort the run
    /// before any file is scanned.
    pub fn validate(&self) -> Result<()> {
        if self.quality > 100 {
            return Err(AvifyError::Config(format!(
                "quality must be in 0-100, got {}",
                self.quality
            )));
        }
        if self.jobs < 1 {
            return Err(AvifyError::Config(format!(
                "jobs must be at least 1, got {}",
                self.jobs
            )));
        }
        Ok(())
    }
}
