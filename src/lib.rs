//! Avify - Bulk PNG to AVIF conversion
//!
//! Recursively converts PNG files to AVIF while carrying the `parameters`
//! text annotation over into the output as a tagged EXIF user comment, and
//! removes each source file only once its replacement is verified on disk.

pub mod cli;
pub mod codec;
pub mod config;
pub mod convert;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod scanner;
