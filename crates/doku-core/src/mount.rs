//! Container mount description as reported by the Docker daemon.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Mount destination of the Docker API socket.
pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Mount root under which Docker exposes secrets.
pub const SECRETS_ROOT: &str = "/run/secrets/";

/// Kind of a container mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "lowercase")]
pub enum MountType {
    Bind,
    Volume,
    Tmpfs,
    Npipe,
    Cluster,
    Image,
    #[default]
    Unknown,
}

impl From<String> for MountType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl From<MountType> for String {
    fn from(value: MountType) -> Self {
        value.to_string()
    }
}

/// A single mount of a container, identified by its (source, destination) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Mount {
    /// Path on the host.
    pub source: String,
    /// Path inside the container.
    pub destination: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub propagation: String,
    #[serde(rename = "RW", default)]
    pub rw: bool,
    #[serde(rename = "Type", default)]
    pub kind: MountType,
    /// Volume name, only set for volume mounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Set when this mount exposes the host's Docker data root.
    #[serde(default)]
    pub root: bool,
}

impl Mount {
    /// Create a bind mount.
    pub fn bind(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            mode: String::new(),
            propagation: String::new(),
            rw: true,
            kind: MountType::Bind,
            name: None,
            root: false,
        }
    }

    pub fn is_bind(&self) -> bool {
        self.kind == MountType::Bind
    }

    pub fn is_volume(&self) -> bool {
        self.kind == MountType::Volume
    }

    /// Whether the mount points at the Docker API socket.
    pub fn is_docker_socket(&self) -> bool {
        self.destination == DOCKER_SOCKET
    }

    /// Whether the mount lives under the secrets root.
    pub fn is_secret(&self) -> bool {
        self.destination.starts_with(SECRETS_ROOT)
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)?;
        if !self.mode.is_empty() {
            write!(f, ":{}", self.mode)?;
        }
        if self.root {
            write!(f, " (root)")?;
        }
        Ok(())
    }
}
