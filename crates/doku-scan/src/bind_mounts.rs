//! Sizes of host paths bind-mounted into containers.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use doku_core::{BindMountRecord, Mount};
use doku_docker::ContainerFilter;
use doku_store::{KvStore, TABLE_BINDMOUNTS};

use crate::context::{ScanContext, Scanner};
use crate::summary::SummaryTracker;
use crate::{Result, ScanSummary, SizeProbe, map_host_path, mounts_of};

/// Measures every distinct bind mount source once per scan.
///
/// A record is written with `scan_in_progress` set before its path is
/// measured, then rewritten with the result. A scan stopped in between
/// leaves the provisional record behind.
pub struct BindMountScanner {
    ctx: ScanContext,
}

enum Measured {
    Size(u64),
    Failed,
    Cancelled,
}

impl BindMountScanner {
    pub fn new(ctx: ScanContext) -> Self {
        Self { ctx }
    }

    /// Measure `host_path` through the first scanner mount that reaches it.
    fn measure(
        &self,
        host_path: &str,
        mounts: &[Mount],
        probe: &mut SizeProbe,
        cancel: &CancellationToken,
    ) -> Measured {
        let Some(local) = mounts
            .iter()
            .find_map(|m| map_host_path(&m.source, &m.destination, host_path))
        else {
            error!(path = %host_path, "bind mount not reachable from any scanner mount");
            return Measured::Failed;
        };

        match probe.size(&local, cancel) {
            Ok(_) if cancel.is_cancelled() => Measured::Cancelled,
            Ok(size) => Measured::Size(size),
            Err(err) => {
                warn!(path = %host_path, error = %err, "failed to measure bind mount");
                Measured::Failed
            }
        }
    }
}

impl Scanner for BindMountScanner {
    fn name(&self) -> &'static str {
        TABLE_BINDMOUNTS
    }

    fn scan(&self, cancel: &CancellationToken) -> Result<ScanSummary> {
        let myself = self.ctx.resolver().find_self()?;
        let mounts = myself.as_ref().map(mounts_of).unwrap_or_default();
        if mounts.is_empty() {
            error!("scanner container mounts not found, bind mounts will not be scanned");
            return Ok(ScanSummary::skipped());
        }
        for mount in &mounts {
            debug!(%mount, "scanner mount");
        }

        let ignore = self.ctx.settings().ignore_set()?;
        let mut tracker = SummaryTracker::start();
        self.ctx.clock().mark(TABLE_BINDMOUNTS)?;

        let containers = self.ctx.docker().containers(&ContainerFilter::all())?;
        let store = KvStore::open(self.ctx.settings().du_db_path())?;
        let table = store.table::<BindMountRecord>(TABLE_BINDMOUNTS)?;
        table.clear()?;

        let mut probe = self.ctx.size_probe();
        let mut seen: HashMap<String, BindMountRecord> = HashMap::new();
        let mut cancelled = false;

        let others = containers
            .iter()
            .filter(|c| myself.as_ref().is_none_or(|me| me.id != c.id));
        'containers: for container in others {
            for mount in container.mounts() {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'containers;
                }
                if !mount.is_bind() || mount.is_docker_socket() || mount.is_secret() {
                    continue;
                }
                if ignore.is_match(&mount.source) {
                    debug!(path = %mount.source, "bind mount ignored by pattern");
                    continue;
                }

                if let Some(record) = seen.get_mut(&mount.source) {
                    record.containers.push(container.name().to_string());
                    table.set(&mount.source, record)?;
                    continue;
                }

                let mut record = BindMountRecord::provisional(&mount.source, container.name());
                table.set(&mount.source, &record)?;

                match self.measure(&mount.source, &mounts, &mut probe, cancel) {
                    Measured::Cancelled => {
                        cancelled = true;
                        break 'containers;
                    }
                    Measured::Size(size) => {
                        record.finish(size);
                        tracker.record(size);
                    }
                    Measured::Failed => {
                        record.fail();
                        tracker.record_item();
                        tracker.record_error();
                    }
                }
                table.set(&mount.source, &record)?;
                seen.insert(mount.source.clone(), record);
            }
        }

        let summary = tracker.finish(cancelled);
        info!(
            paths = summary.items,
            errors = summary.errors,
            total = %self.ctx.format_size(summary.total_size),
            elapsed = ?summary.elapsed,
            cancelled,
            "bind mounts scanned"
        );
        Ok(summary)
    }
}
