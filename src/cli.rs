use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target directory or PNG file path
    pub target_path: PathBuf,

    /// AVIF quality (0-100)
    #[arg(long, default_value_t = 80)]
    pub quality: u8,

    /// Number of parallel conversion workers
    #[arg(long, default_value_t = 1)]
    pub jobs: usize,

    /// Enable per-file converted/removed logs
    #[arg(long)]
    pub verbose: bool,

    /// Disable AVIF write and PNG deletion while preserving normal flow
    #[arg(long)]
    pub dryrun: bool,
}
