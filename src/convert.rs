//! Per-file conversion state machine.
//!
//! One task walks decode → metadata embed → encode → write → verify →
//! source removal. Dryrun leaves the filesystem untouched entirely; writes
//! go through a temporary file in the target directory so a failed or
//! interrupted write never leaves a truncated target behind. The source is
//! deleted if and only if the target was fully written and verified.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::codec::{ImageCodec, MetadataContainer, container};
use crate::error::{AvifyError, Result};
use crate::metadata;

/// Extension of produced target files.
pub const TARGET_EXTENSION: &str = "avif";

/// One unit of work: a source file and everything needed to convert it.
#[derive(Debug, Clone)]
pub struct ConversionTask {
    pub source: PathBuf,
    pub target: PathBuf,
    pub quality: u8,
    pub dryrun: bool,
}

impl ConversionTask {
    /// Build a task for a source path. The target shares the source's
    /// directory and filename stem.
    pub fn new(source: PathBuf, quality: u8, dryrun: bool) -> Self {
        let target = source.with_extension(TARGET_EXTENSION);
        Self {
            source,
            target,
            quality,
            dryrun,
        }
    }
}

/// Terminal result of one task, produced exactly once.
#[derive(Debug)]
pub enum ConversionOutcome {
    /// Target written and verified, source left in place.
    Converted { source: PathBuf, target: PathBuf },
    /// Target written and verified, source removed.
    ConvertedAndRemoved { source: PathBuf, target: PathBuf },
    /// Dryrun: all logic ran, nothing touched the filesystem.
    Skipped { source: PathBuf, target: PathBuf },
    /// The task failed; the cause says at which stage.
    Failed { source: PathBuf, cause: AvifyError },
}

pub struct ConversionUnit {
    codec: Arc<dyn ImageCodec>,
}

impl ConversionUnit {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self { codec }
    }

    /// Run the state machine for one task.
    ///
    /// Every error is caught at this boundary and becomes a `Failed`
    /// outcome; nothing propagates out of the worker that runs it.
    pub fn run(&self, task: &ConversionTask) -> ConversionOutcome {
        match self.execute(task) {
            Ok(outcome) => outcome,
            Err(cause) => ConversionOutcome::Failed {
                source: task.source.clone(),
                cause,
            },
        }
    }

    fn execute(&self, task: &ConversionTask) -> Result<ConversionOutcome> {
        debug!("decoding {}", task.source.display());
        let decoded = self.codec.decode(&task.source)?;

        debug!("extracting annotation from {}", task.source.display());
        let annotation = metadata::extract_annotation(&task.source)?;
        let mut staged = MetadataContainer::new();
        metadata::embed(&mut staged, annotation.as_deref());

        debug!("encoding {}", task.target.display());
        let encoded = self.codec.encode(&decoded, task.quality)?;
        let target_bytes = container::apply_metadata(&encoded, &staged)?;

        if task.dryrun {
            debug!("dryrun, skipping write of {}", task.target.display());
            return Ok(ConversionOutcome::Skipped {
                source: task.source.clone(),
                target: task.target.clone(),
            });
        }

        self.write_target(task, &target_bytes)?;
        self.verify_target(task)?;

        debug!("removing source {}", task.source.display());
        fs::remove_file(&task.source).map_err(|cause| AvifyError::SourceRemoval {
            source_path: task.source.clone(),
            target: task.target.clone(),
            cause,
        })?;

        Ok(ConversionOutcome::ConvertedAndRemoved {
            source: task.source.clone(),
            target: task.target.clone(),
        })
    }

    /// Write the target bytes through a scoped temporary file, then rename
    /// over the final path. An existing target is overwritten; a failure
    /// part-way leaves no file at the target path.
    fn write_target(&self, task: &ConversionTask, bytes: &[u8]) -> Result<()> {
        let dir = task.target.parent().ok_or_else(|| AvifyError::Write {
            path: task.target.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "target has no parent directory",
            ),
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| AvifyError::Write {
            path: task.target.clone(),
            source,
        })?;
        tmp.write_all(bytes).map_err(|source| AvifyError::Write {
            path: task.target.clone(),
            source,
        })?;
        tmp.flush().map_err(|source| AvifyError::Write {
            path: task.target.clone(),
            source,
        })?;
        tmp.persist(&task.target).map_err(|e| AvifyError::Write {
            path: task.target.clone(),
            source: e.error,
        })?;
        Ok(())
    }

    /// The safety gate before the source may be deleted.
    fn verify_target(&self, task: &ConversionTask) -> Result<()> {
        let info = fs::metadata(&task.target).map_err(|source| AvifyError::Write {
            path: task.target.clone(),
            source,
        })?;
        if info.len() == 0 {
            return Err(AvifyError::Write {
                path: task.target.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, "empty target file"),
            });
        }
        Ok(())
    }
}
