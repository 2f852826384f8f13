//! Size measurement of files and directory trees.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use jwalk::{Parallelism, WalkDir};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use doku_core::ScanError;

/// Entries processed between two throttle sleeps.
pub const THROTTLE_EVERY: u64 = 100;

/// Whether the `du` utility is on `PATH`.
pub fn du_available() -> bool {
    which::which("du").is_ok()
}

/// Measures the logical size of a path.
///
/// A probe is owned by one scan; its throttle counter carries over between
/// the paths measured during that scan.
#[derive(Debug)]
pub struct SizeProbe {
    sleep: Duration,
    use_du: bool,
    processed: u64,
}

impl SizeProbe {
    /// `prefer_du` only takes effect when `du` is installed.
    pub fn new(sleep: Duration, prefer_du: bool) -> Self {
        Self {
            sleep,
            use_du: prefer_du && du_available(),
            processed: 0,
        }
    }

    pub fn uses_du(&self) -> bool {
        self.use_du
    }

    /// Entries processed so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Logical size of `path` in bytes.
    ///
    /// Files report their own length. Directories report the sum over
    /// every file below them; symbolic links count as the link itself and
    /// are never followed. A stop request yields `0` if it arrives before the
    /// measurement starts and a partial sum if it arrives during a walk.
    pub fn size(&mut self, path: &Path, cancel: &CancellationToken) -> Result<u64, ScanError> {
        if cancel.is_cancelled() {
            return Ok(0);
        }

        let metadata = std::fs::symlink_metadata(path).map_err(|e| ScanError::io(path, e))?;
        if !metadata.is_dir() {
            self.throttle();
            return Ok(metadata.len());
        }

        if self.use_du {
            let size = du_size(path);
            self.throttle();
            Ok(size)
        } else {
            self.walk(path, cancel)
        }
    }

    fn walk(&mut self, root: &Path, cancel: &CancellationToken) -> Result<u64, ScanError> {
        let walker = WalkDir::new(root)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .follow_links(false)
            .min_depth(1);

        let mut total = 0;
        for entry in walker {
            if cancel.is_cancelled() {
                debug!(path = %root.display(), partial = total, "walk interrupted");
                break;
            }

            let entry = entry.map_err(|err| ScanError::Walk {
                path: err.path().unwrap_or(root).to_path_buf(),
                message: err.to_string(),
            })?;
            if entry.file_type().is_dir() {
                continue;
            }

            let metadata = entry.metadata().map_err(|err| ScanError::Walk {
                path: entry.path(),
                message: err.to_string(),
            })?;
            total += metadata.len();
            self.throttle();
        }
        Ok(total)
    }

    fn throttle(&mut self) {
        self.processed += 1;
        if self.processed % THROTTLE_EVERY != 0 {
            return;
        }
        if self.sleep.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(self.sleep);
        }
    }
}

/// Apparent size reported by `du -sb`, `0` when `du` fails.
fn du_size(path: &Path) -> u64 {
    let output = match Command::new("du").arg("-sb").arg(path).output() {
        Ok(output) => output,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to run du");
            return 0;
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed = stdout
        .split_whitespace()
        .next()
        .and_then(|field| field.parse::<u64>().ok());

    match parsed {
        Some(size) if output.status.success() => size,
        _ => {
            warn!(
                path = %path.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "du failed"
            );
            0
        }
    }
}
