//! The Docker operations the scanners depend on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use doku_core::serde_ext::null_as_default;
use doku_core::{DockerVersion, Mount, SystemDf};

use crate::DockerError;

/// Which containers to list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    /// Only containers carrying this label (`key` or `key=value`).
    pub label: Option<String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ContainerFilter {
    /// Every container, including stopped ones.
    pub fn all() -> Self {
        Self {
            label: None,
            all: true,
        }
    }

    /// Running containers carrying the given label.
    pub fn label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            all: false,
        }
    }

    /// Whether `container` passes this filter.
    pub fn accepts(&self, container: &ContainerInfo) -> bool {
        (self.all || container.is_running()) && self.matches(&container.config.labels)
    }

    /// Check a label map against this filter.
    pub fn matches(&self, labels: &HashMap<String, String>) -> bool {
        let Some(ref label) = self.label else {
            return true;
        };
        match label.split_once('=') {
            Some((key, value)) => labels.get(key).is_some_and(|v| v == value),
            None => labels.contains_key(label),
        }
    }
}

/// Storage driver metadata of a container or image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GraphDriver {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: HashMap<String, String>,
}

/// The part of a container's configuration the scanners use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    #[serde(default)]
    pub hostname: String,
    /// Image reference the container was created from.
    #[serde(default)]
    pub image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
}

/// Runtime state of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub running: bool,
}

/// A container as returned by the inspect endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Image id (`sha256:...`).
    #[serde(default)]
    pub image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: ContainerConfig,
    /// Mount objects exactly as sent by the daemon, see [`ContainerInfo::mounts`].
    #[serde(rename = "Mounts", default, deserialize_with = "null_as_default")]
    pub raw_mounts: Vec<serde_json::Value>,
    #[serde(default)]
    pub log_path: String,
    #[serde(default)]
    pub graph_driver: Option<GraphDriver>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: ContainerState,
}

impl ContainerInfo {
    pub fn short_id(&self) -> &str {
        doku_core::short_id(&self.id)
    }

    /// Container name without the leading slash.
    pub fn name(&self) -> &str {
        self.name.trim_start_matches('/')
    }

    /// Host path of the container's log file, if it has one.
    pub fn log_path(&self) -> Option<&str> {
        Some(self.log_path.as_str()).filter(|p| !p.is_empty())
    }

    pub fn hostname(&self) -> &str {
        &self.config.hostname
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Validated mounts; malformed entries are dropped.
    pub fn mounts(&self) -> Vec<Mount> {
        self.raw_mounts
            .iter()
            .filter_map(|raw| match Mount::deserialize(raw) {
                Ok(mount) => Some(mount),
                Err(err) => {
                    trace!(container = %self.name(), error = %err, "skipping malformed mount");
                    None
                }
            })
            .collect()
    }
}

/// An image as returned by the inspect endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageInfo {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repo_tags: Vec<String>,
    #[serde(default)]
    pub graph_driver: Option<GraphDriver>,
}

impl ImageInfo {
    /// First tag, or the short id for untagged images.
    pub fn reference(&self) -> &str {
        self.repo_tags
            .first()
            .map(String::as_str)
            .unwrap_or_else(|| doku_core::short_id(&self.id))
    }
}

/// Access to the Docker daemon.
pub trait DockerApi: Send + Sync {
    /// Inspect every container matching the filter.
    fn containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerInfo>, DockerError>;

    /// Inspect every image.
    fn images(&self) -> Result<Vec<ImageInfo>, DockerError>;

    /// Docker's aggregate disk usage accounting.
    fn disk_usage(&self) -> Result<SystemDf, DockerError>;

    /// Daemon version.
    fn version(&self) -> Result<DockerVersion, DockerError>;
}
