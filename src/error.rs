use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AvifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Converted {} but failed to remove source {}: {cause}", target.display(), source_path.display())]
    SourceRemoval {
        source_path: PathBuf,
        target: PathBuf,
        cause: std::io::Error,
    },
}

impl From<image::ImageError> for AvifyError {
    fn from(err: image::ImageError) -> Self {
        AvifyError::Codec(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AvifyError>;
