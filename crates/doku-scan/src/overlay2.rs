//! Sizes of the overlay2 storage driver's layers.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use doku_core::{OverlayLayerRecord, ScanError};
use doku_docker::{ContainerFilter, ContainerInfo, ImageInfo};
use doku_store::{KvStore, TABLE_OVERLAY2};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use crate::context::{ScanContext, Scanner};
use crate::summary::SummaryTracker;
use crate::{Result, ScanSummary, map_host_path};

/// Host directory of the overlay2 storage driver.
pub const OVERLAY2_DIR: &str = "/var/lib/docker/overlay2/";

const OVERLAY2_DRIVER: &str = "overlay2";

/// Measures the `diff` directory of every layer under [`OVERLAY2_DIR`].
pub struct Overlay2Scanner {
    ctx: ScanContext,
}

impl Overlay2Scanner {
    pub fn new(ctx: ScanContext) -> Self {
        Self { ctx }
    }

    /// Layer ids referenced by any container or image.
    pub fn collect_in_use_layers(&self) -> Result<HashSet<String>> {
        let docker = self.ctx.docker();
        let containers = docker.containers(&ContainerFilter::all())?;
        let images = docker.images()?;
        Ok(in_use_layers(&containers, &images))
    }
}

/// Layer ids referenced by the overlay2 graph driver data of containers and images.
///
/// Every value of the driver data is a `:`-separated list of paths; the
/// ones of the form `<OVERLAY2_DIR><id>/diff` name a layer.
pub fn in_use_layers(containers: &[ContainerInfo], images: &[ImageInfo]) -> HashSet<String> {
    let drivers = containers
        .iter()
        .filter_map(|c| c.graph_driver.as_ref())
        .chain(images.iter().filter_map(|i| i.graph_driver.as_ref()));

    drivers
        .filter(|driver| driver.name == OVERLAY2_DRIVER)
        .flat_map(|driver| driver.data.values())
        .flat_map(|value| value.split(':'))
        .filter_map(|path| path.strip_prefix(OVERLAY2_DIR)?.strip_suffix("/diff"))
        .filter(|id| !id.is_empty() && !id.contains('/'))
        .map(str::to_string)
        .collect()
}

/// Where the content of a layer's `diff` directory effectively starts.
///
/// `None` for an empty directory. Several top-level entries are listed as
/// `/a, /b`. Otherwise the single-child chain is followed down to the first
/// level that is not a lone directory, e.g. `/usr/local/lib`.
pub fn diff_root(diff_dir: &Path) -> io::Result<Option<String>> {
    let mut children = sorted_children(diff_dir)?;
    if children.is_empty() {
        return Ok(None);
    }
    if children.len() > 1 {
        let listing = children
            .iter()
            .map(|child| format!("/{}", file_name(child)))
            .join(", ");
        return Ok(Some(listing));
    }

    let mut root = PathBuf::from("/");
    while children.len() == 1 {
        let child = children.remove(0);
        root.push(file_name(&child));
        let is_dir = std::fs::symlink_metadata(&child).is_ok_and(|m| m.is_dir());
        if !is_dir {
            break;
        }
        children = sorted_children(&child)?;
    }
    Ok(Some(root.to_string_lossy().into_owned()))
}

fn sorted_children(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut children = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()?;
    children.sort();
    Ok(children)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(unix)]
fn changed_at(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    DateTime::from_timestamp(metadata.ctime(), 0).unwrap_or_default()
}

#[cfg(not(unix))]
fn changed_at(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    metadata.modified().map(DateTime::from).unwrap_or_default()
}

impl Scanner for Overlay2Scanner {
    fn name(&self) -> &'static str {
        TABLE_OVERLAY2
    }

    fn scan(&self, cancel: &CancellationToken) -> Result<ScanSummary> {
        let Some(root) = self.ctx.resolver().root_mount()? else {
            error!("no root mount found, overlay2 layers will not be scanned");
            return Ok(ScanSummary::skipped());
        };
        let Some(overlay_dir) = map_host_path(&root.source, &root.destination, OVERLAY2_DIR) else {
            error!(mount = %root, "overlay2 directory not reachable through the root mount");
            return Ok(ScanSummary::skipped());
        };

        let mut tracker = SummaryTracker::start();
        self.ctx.clock().mark(TABLE_OVERLAY2)?;

        let layers_in_use = self.collect_in_use_layers()?;
        let layer_dirs =
            sorted_children(&overlay_dir).map_err(|e| ScanError::io(&overlay_dir, e))?;

        let store = KvStore::open(self.ctx.settings().du_db_path())?;
        let table = store.table::<OverlayLayerRecord>(TABLE_OVERLAY2)?;
        table.clear()?;

        let mut probe = self.ctx.size_probe();
        let mut cancelled = false;
        for layer_dir in layer_dirs {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let diff_dir = layer_dir.join("diff");
            if !diff_dir.is_dir() {
                continue;
            }
            let id = file_name(&layer_dir);
            let created = std::fs::metadata(&layer_dir)
                .map(|m| changed_at(&m))
                .unwrap_or_else(|_| Utc::now());
            let in_use = layers_in_use.contains(&id);

            let diff_root = match diff_root(&diff_dir) {
                Ok(Some(diff_root)) => diff_root,
                Ok(None) => {
                    debug!(layer = %id, "empty layer");
                    continue;
                }
                Err(err) => {
                    warn!(layer = %id, error = %err, "failed to read layer");
                    let mut record = OverlayLayerRecord::provisional(&id, created, "/", in_use);
                    record.fail();
                    table.set(&id, &record)?;
                    tracker.record_item();
                    tracker.record_error();
                    continue;
                }
            };

            let mut record = OverlayLayerRecord::provisional(&id, created, diff_root, in_use);
            table.set(&id, &record)?;

            match probe.size(&diff_dir, cancel) {
                Ok(_) if cancel.is_cancelled() => {
                    cancelled = true;
                    break;
                }
                Ok(size) => {
                    record.finish(size);
                    tracker.record(size);
                }
                Err(err) => {
                    warn!(layer = %id, error = %err, "failed to measure layer");
                    record.fail();
                    tracker.record_item();
                    tracker.record_error();
                }
            }
            table.set(&id, &record)?;
            debug!(
                layer = %record.short_id(),
                root = %record.diff_root,
                size = %self.ctx.format_size(record.size),
                in_use,
                "layer measured"
            );
        }

        let summary = tracker.finish(cancelled);
        info!(
            layers = summary.items,
            total = %self.ctx.format_size(summary.total_size),
            elapsed = ?summary.elapsed,
            cancelled,
            "overlay2 layers scanned"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_diff_root_follows_single_child_chain() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("usr/local/lib")).unwrap();
        fs::write(temp.path().join("usr/local/lib/a.so"), b"a").unwrap();
        fs::write(temp.path().join("usr/local/lib/b.so"), b"b").unwrap();

        assert_eq!(
            diff_root(temp.path()).unwrap().as_deref(),
            Some("/usr/local/lib")
        );
    }

    #[test]
    fn test_diff_root_lists_top_level_children() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("etc")).unwrap();
        fs::create_dir(temp.path().join("bin")).unwrap();

        assert_eq!(diff_root(temp.path()).unwrap().as_deref(), Some("/bin, /etc"));
    }

    #[test]
    fn test_diff_root_stops_at_single_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("etc")).unwrap();
        fs::write(temp.path().join("etc/hostname"), b"box").unwrap();

        assert_eq!(
            diff_root(temp.path()).unwrap().as_deref(),
            Some("/etc/hostname")
        );
    }

    #[test]
    fn test_diff_root_stops_at_empty_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("tmp/cache")).unwrap();

        assert_eq!(diff_root(temp.path()).unwrap().as_deref(), Some("/tmp/cache"));
    }

    #[test]
    fn test_diff_root_empty() {
        let temp = TempDir::new().unwrap();
        assert_eq!(diff_root(temp.path()).unwrap(), None);
    }

    #[test]
    fn test_in_use_layers() {
        let containers: Vec<ContainerInfo> = serde_json::from_value(serde_json::json!([{
            "Id": "c1",
            "GraphDriver": {
                "Name": "overlay2",
                "Data": {
                    "LowerDir": "/var/lib/docker/overlay2/l1-init/diff:/var/lib/docker/overlay2/l2/diff",
                    "MergedDir": "/var/lib/docker/overlay2/l1/merged",
                    "UpperDir": "/var/lib/docker/overlay2/l1/diff",
                    "WorkDir": "/var/lib/docker/overlay2/l1/work"
                }
            }
        }]))
        .unwrap();
        let images: Vec<ImageInfo> = serde_json::from_value(serde_json::json!([
            {"Id": "sha256:i1", "GraphDriver": {"Name": "overlay2", "Data": {"UpperDir": "/var/lib/docker/overlay2/l3/diff"}}},
            {"Id": "sha256:i2", "GraphDriver": {"Name": "btrfs", "Data": {"UpperDir": "/var/lib/docker/overlay2/l4/diff"}}},
            {"Id": "sha256:i3", "GraphDriver": null}
        ]))
        .unwrap();

        let layers = in_use_layers(&containers, &images);
        let mut layers: Vec<_> = layers.into_iter().collect();
        layers.sort();
        assert_eq!(layers, vec!["l1", "l1-init", "l2", "l3"]);
    }
}
