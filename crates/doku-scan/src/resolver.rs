//! Discovery of the scanner's own container and its mounts.

use tracing::{debug, warn};

use doku_core::{Mount, SelfIdentity};
use doku_docker::{ContainerFilter, ContainerInfo, DockerApi, DockerError};

use crate::map_host_path;

/// Finds which host paths the scanner can see.
pub struct MountResolver<'a> {
    docker: &'a dyn DockerApi,
    identity: &'a SelfIdentity,
}

impl<'a> MountResolver<'a> {
    pub fn new(docker: &'a dyn DockerApi, identity: &'a SelfIdentity) -> Self {
        Self { docker, identity }
    }

    /// The container the scanner runs in.
    ///
    /// Outside Docker there is none. Only running containers are
    /// candidates. A single one carrying the identity label is taken
    /// as-is; among several, the one whose configured hostname equals
    /// the local hostname wins.
    pub fn find_self(&self) -> Result<Option<ContainerInfo>, DockerError> {
        if !self.identity.in_docker {
            return Ok(None);
        }

        let mut candidates = self
            .docker
            .containers(&ContainerFilter::label(&self.identity.label))?;
        match candidates.len() {
            0 => {
                debug!(label = %self.identity.label, "no running labelled container");
                return Ok(None);
            }
            1 => return Ok(candidates.pop()),
            _ => {}
        }

        let Some(hostname) = self.identity.hostname.as_deref().filter(|h| !h.is_empty()) else {
            warn!(
                candidates = candidates.len(),
                "cannot identify the scanner container without a hostname"
            );
            return Ok(None);
        };

        let found = candidates.into_iter().find(|c| c.hostname() == hostname);
        if found.is_none() {
            debug!(hostname, "no labelled container matches the local hostname");
        }
        Ok(found)
    }

    /// Mounts of the scanner's container, see [`mounts_of`].
    pub fn list_mounts(&self) -> Result<Vec<Mount>, DockerError> {
        Ok(self
            .find_self()?
            .map(|container| mounts_of(&container))
            .unwrap_or_default())
    }

    /// The mount through which the Docker data root is reachable.
    pub fn root_mount(&self) -> Result<Option<Mount>, DockerError> {
        Ok(self.list_mounts()?.into_iter().find(|m| m.root))
    }
}

/// Mounts of `container` minus the Docker socket.
///
/// A mount is flagged `root` when the container's own log file maps through
/// it to an existing local path; that mount exposes the Docker data root.
pub fn mounts_of(container: &ContainerInfo) -> Vec<Mount> {
    let log_path = container.log_path();
    container
        .mounts()
        .into_iter()
        .filter(|m| !m.is_docker_socket())
        .map(|mut mount| {
            mount.root = log_path
                .is_some_and(|p| map_host_path(&mount.source, &mount.destination, p).is_some());
            mount
        })
        .collect()
}
