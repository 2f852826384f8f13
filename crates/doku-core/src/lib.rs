//! Core types and settings for doku.
//!
//! This crate provides the data model shared by the scanners, the store
//! and the Docker client: mounts, Docker's own disk usage snapshots,
//! the records each scanner persists, and the scan configuration.

mod config;
mod error;
mod mount;
mod record;
mod usage;
pub mod serde_ext;

pub use config::{ScanIntensity, ScanSettings, ScanSettingsBuilder, SelfIdentity};
pub use error::ScanError;
pub use mount::{DOCKER_SOCKET, Mount, MountType, SECRETS_ROOT};
pub use record::{BindMountRecord, LogRecord, OverlayLayerRecord};
pub use usage::{
    BuildCacheEntry, ContainerUsage, DfEntry, DockerVersion, ImageUsage, SystemDf, VolumeUsage,
    VolumeUsageData,
};

/// Return the 12-character short form of a Docker id, without the `sha256:` prefix.
pub fn short_id(id: &str) -> &str {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    match id.char_indices().nth(12) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}
