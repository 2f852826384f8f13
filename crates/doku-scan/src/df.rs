//! Docker's own disk usage accounting, enriched with container back-references.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use doku_core::{DfEntry, SystemDf};
use doku_docker::{ContainerFilter, ContainerInfo};
use doku_store::{KvStore, StoreError, TABLE_SYSTEM_DF};

use crate::context::{ScanContext, Scanner};
use crate::summary::SummaryTracker;
use crate::{Result, ScanSummary};

/// Persists `docker system df`, the root mount and the daemon version.
pub struct SystemDfScanner {
    ctx: ScanContext,
}

impl SystemDfScanner {
    pub fn new(ctx: ScanContext) -> Self {
        Self { ctx }
    }
}

impl Scanner for SystemDfScanner {
    fn name(&self) -> &'static str {
        TABLE_SYSTEM_DF
    }

    fn scan(&self, _cancel: &CancellationToken) -> Result<ScanSummary> {
        let mut tracker = SummaryTracker::start();
        self.ctx.clock().mark(TABLE_SYSTEM_DF)?;

        debug!("querying docker disk usage");
        let docker = self.ctx.docker();
        let mut df = docker.disk_usage()?;
        let containers = docker.containers(&ContainerFilter::all())?;
        attach_containers(&mut df, &containers);
        let root_mount = self.ctx.resolver().root_mount()?.map(DfEntry::RootMount);
        let version = docker.version()?;

        let entries = vec![
            DfEntry::Images(df.images),
            DfEntry::Containers(df.containers),
            DfEntry::Volumes(df.volumes),
            DfEntry::BuildCache(df.build_cache),
            DfEntry::Version(version),
        ];

        let store = KvStore::open(self.ctx.settings().df_db_path())?;
        store.atomically(|store| -> Result<(), StoreError> {
            let table = store.table::<DfEntry>(TABLE_SYSTEM_DF)?;
            for entry in &entries {
                table.set(entry.key(), entry)?;
            }
            // A root mount that went away must not linger from an older scan.
            match root_mount {
                Some(ref entry) => table.set(entry.key(), entry)?,
                None => {
                    table.remove(DfEntry::ROOT_MOUNT_KEY)?;
                }
            }
            Ok(())
        })?;

        tracker.record_items(entries.len() + usize::from(root_mount.is_some()));
        let summary = tracker.finish(false);
        info!(
            entries = summary.items,
            elapsed = ?summary.elapsed,
            "docker disk usage saved"
        );
        Ok(summary)
    }
}

/// Fill the `containers` lists of images and volumes from the container list.
///
/// Containers referring to an image or volume missing from `df` are skipped.
pub fn attach_containers(df: &mut SystemDf, containers: &[ContainerInfo]) {
    let images: HashMap<String, usize> = df
        .images
        .iter()
        .enumerate()
        .map(|(idx, image)| (image.id.clone(), idx))
        .collect();
    let volumes: HashMap<String, usize> = df
        .volumes
        .iter()
        .enumerate()
        .map(|(idx, volume)| (volume.name.clone(), idx))
        .collect();

    for container in containers {
        let name = container.name();
        if let Some(&idx) = images.get(&container.image) {
            df.images[idx].containers.push(name.to_string());
        }

        for mount in container.mounts().iter().filter(|m| m.is_volume()) {
            if let Some(&idx) = mount.name.as_ref().and_then(|n| volumes.get(n)) {
                df.volumes[idx].containers.push(name.to_string());
            }
        }
    }
}
