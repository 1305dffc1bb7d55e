use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{AvifyError, Result};

/// Extension of eligible source files, matched case-insensitively.
const SOURCE_EXTENSION: &str = "png";

/// Lazily enumerates eligible source files under a root path.
///
/// The root may be a single PNG file or a directory. Directories are walked
/// depth-first with siblings sorted lexicographically, so discovery order is
/// reproducible within a run. Scanning is sequential and never waits on
/// conversion progress; the iterator is pulled by the pipeline as worker
/// capacity frees up.
pub struct Scanner {
    root: PathBuf,
}

impl Scanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Produce the lazy sequence of source paths.
    ///
    /// Fails with a fatal scan error when the root itself does not exist or
    /// cannot be read. Unreadable entries deeper in the tree are logged and
    /// skipped here; matching files that later turn out to be unreadable are
    /// still yielded and surface as per-file failures when the conversion
    /// opens them.
    pub fn scan(&self) -> Result<Box<dyn Iterator<Item = PathBuf> + Send>> {
        if !self.root.exists() {
            return Err(AvifyError::Scan(format!(
                "target path does not exist: {}",
                self.root.display()
            )));
        }

        if self.root.is_file() {
            fs::File::open(&self.root).map_err(|e| self.unreadable_root(e))?;
            let single = if is_eligible(&self.root) {
                vec![self.root.clone()]
            } else {
                debug!("root file is not a {} file, nothing to scan", SOURCE_EXTENSION);
                Vec::new()
            };
            return Ok(Box::new(single.into_iter()));
        }

        // the root directory itself must be readable before any task runs
        fs::read_dir(&self.root).map_err(|e| self.unreadable_root(e))?;

        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if entry.file_type().is_file() && is_eligible(path) {
                        Some(path.to_path_buf())
                    } else {
                        None
                    }
                }
                Err(e) => {
                    warn!("skipping unreadable entry during scan: {}", e);
                    None
                }
            });

        Ok(Box::new(walker))
    }

    fn unreadable_root(&self, e: std::io::Error) -> AvifyError {
        AvifyError::Scan(format!(
            "cannot read target path {}: {}",
            self.root.display(),
            e
        ))
    }
}

fn is_eligible(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn lock_out(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
    }

    #[cfg(unix)]
    fn unlock(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let scanner = Scanner::new("/nonexistent/path/for/sure");
        assert!(matches!(scanner.scan(), Err(AvifyError::Scan(_))));
    }

    #[test]
    fn test_single_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("one.png");
        fs::write(&png, b"not really a png").unwrap();

        let found: Vec<_> = Scanner::new(&png).scan().unwrap().collect();
        assert_eq!(found, vec![png]);
    }

    #[test]
    fn test_single_non_png_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        fs::write(&txt, b"hello").unwrap();

        let found: Vec<_> = Scanner::new(&txt).scan().unwrap().collect();
        assert!(found.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("a.png"), b"x").unwrap();
        lock_out(&locked);

        // privileged processes can read past the mode bits; nothing to test then
        if fs::read_dir(&locked).is_ok() {
            unlock(&locked);
            return;
        }

        let result = Scanner::new(&locked).scan().map(|_| ());
        unlock(&locked);
        assert!(matches!(result, Err(AvifyError::Scan(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("one.png");
        fs::write(&png, b"x").unwrap();
        lock_out(&png);

        if fs::File::open(&png).is_ok() {
            unlock(&png);
            return;
        }

        let result = Scanner::new(&png).scan().map(|_| ());
        unlock(&png);
        assert!(matches!(result, Err(AvifyError::Scan(_))));
    }

    #[test]
    fn test_directory_walk_is_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("a_sub");
        fs::create_dir(&sub).unwrap();
        fs::write(dir.path().join("b.png"), b"x").unwrap();
        fs::write(dir.path().join("z.PNG"), b"x").unwrap();
        fs::write(dir.path().join("skip.jpg"), b"x").unwrap();
        fs::write(sub.join("a.png"), b"x").unwrap();

        let found: Vec<_> = Scanner::new(dir.path()).scan().unwrap().collect();
        assert_eq!(
            found,
            vec![
                sub.join("a.png"),
                dir.path().join("b.png"),
                dir.path().join("z.PNG"),
            ]
        );
    }
}
