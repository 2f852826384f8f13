//! Container log file sizes.

use std::collections::HashMap;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use doku_core::LogRecord;
use doku_docker::ContainerFilter;
use doku_store::{KvStore, TABLE_LOGFILES};

use crate::context::{ScanContext, Scanner};
use crate::summary::SummaryTracker;
use crate::{Result, ScanSummary, map_host_path};

/// Measures each container's log file through the root mount.
pub struct LogScanner {
    ctx: ScanContext,
}

impl LogScanner {
    pub fn new(ctx: ScanContext) -> Self {
        Self { ctx }
    }
}

impl Scanner for LogScanner {
    fn name(&self) -> &'static str {
        TABLE_LOGFILES
    }

    fn scan(&self, cancel: &CancellationToken) -> Result<ScanSummary> {
        let Some(root) = self.ctx.resolver().root_mount()? else {
            error!("no root mount found, log files will not be scanned");
            return Ok(ScanSummary::skipped());
        };

        let mut tracker = SummaryTracker::start();
        self.ctx.clock().mark(TABLE_LOGFILES)?;

        let docker = self.ctx.docker();
        let containers = docker.containers(&ContainerFilter::all())?;
        let images: HashMap<String, String> = docker
            .images()?
            .into_iter()
            .map(|image| {
                let reference = image.reference().to_string();
                (image.id, reference)
            })
            .collect();

        let store = KvStore::open(self.ctx.settings().df_db_path())?;
        let table = store.table::<LogRecord>(TABLE_LOGFILES)?;
        table.clear()?;

        let mut cancelled = false;
        for container in &containers {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let Some(log_path) = container.log_path() else {
                debug!(container = %container.name(), "container has no log file");
                continue;
            };
            let Some(local) = map_host_path(&root.source, &root.destination, log_path) else {
                error!(container = %container.name(), path = %log_path, "log file not reachable");
                tracker.record_error();
                continue;
            };
            let size = match std::fs::metadata(&local) {
                Ok(metadata) => metadata.len(),
                Err(err) => {
                    warn!(path = %local.display(), error = %err, "failed to stat log file");
                    tracker.record_error();
                    continue;
                }
            };

            let image = images
                .get(&container.image)
                .cloned()
                .unwrap_or_else(|| doku_core::short_id(&container.image).to_string());
            let record = LogRecord {
                id: container.short_id().to_string(),
                name: container.name().to_string(),
                image,
                path: log_path.to_string(),
                size,
                last_scan: Utc::now(),
            };
            table.set(&record.id, &record)?;
            tracker.record(size);
            debug!(
                container = %record.name,
                size = %self.ctx.format_size(size),
                "log file measured"
            );
        }

        let summary = tracker.finish(cancelled);
        info!(
            files = summary.items,
            total = %self.ctx.format_size(summary.total_size),
            elapsed = ?summary.elapsed,
            cancelled,
            "log files scanned"
        );
        Ok(summary)
    }
}
