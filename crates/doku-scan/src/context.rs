//! Shared scanner plumbing.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use doku_core::ScanSettings;
use doku_docker::DockerApi;
use doku_store::ScanClock;

use crate::{MountResolver, Result, ScanSummary, SizeProbe};

/// One kind of scan, run repeatedly by a [`crate::ScanLoop`].
pub trait Scanner: Send {
    /// Name of the keyspace the scanner owns.
    fn name(&self) -> &'static str;

    /// Run one full scan. A stop request ends the scan early with
    /// [`ScanSummary::cancelled`] set.
    fn scan(&self, cancel: &CancellationToken) -> Result<ScanSummary>;
}

/// Docker access and settings shared by all scanners.
#[derive(Clone)]
pub struct ScanContext {
    docker: Arc<dyn DockerApi>,
    settings: Arc<ScanSettings>,
}

impl ScanContext {
    pub fn new(docker: Arc<dyn DockerApi>, settings: ScanSettings) -> Self {
        Self {
            docker,
            settings: Arc::new(settings),
        }
    }

    pub fn docker(&self) -> &dyn DockerApi {
        self.docker.as_ref()
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn resolver(&self) -> MountResolver<'_> {
        MountResolver::new(self.docker(), &self.settings.identity)
    }

    pub fn clock(&self) -> ScanClock {
        ScanClock::new(&self.settings.db_dir)
    }

    /// A fresh probe for one scan.
    pub fn size_probe(&self) -> SizeProbe {
        SizeProbe::new(self.settings.sleep_duration(), self.settings.use_du)
    }

    /// Human readable size, SI or binary units depending on the settings.
    pub fn format_size(&self, bytes: u64) -> String {
        if self.settings.si {
            humansize::format_size(bytes, humansize::DECIMAL)
        } else {
            humansize::format_size(bytes, humansize::BINARY)
        }
    }
}
